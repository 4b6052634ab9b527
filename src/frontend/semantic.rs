//! Semantic Analysis for tacc
//!
//! Performs:
//! - Symbol table management (one flat namespace, scope depth recorded)
//! - Type checking of assignments, conditions and expressions
//! - Literal validation
//!
//! Diagnostics accumulate; every statement is visited.

use std::collections::HashMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

use crate::frontend::ast::*;
use crate::types::{PrimitiveType, ResolvedType};

// ==================== Symbol Table ====================

/// A literal value recorded for a variable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    /// String contents without the surrounding quotes
    String(String),
    Char(char),
    Bool(bool),
}

impl LiteralValue {
    /// Whether this value can be held by a variable of type `ty`
    pub fn storable_in(&self, ty: PrimitiveType) -> bool {
        match self {
            Self::Int(_) => ty.is_numeric(),
            Self::Float(_) => ty.is_float(),
            Self::String(_) => ty == PrimitiveType::String,
            Self::Char(_) => ty == PrimitiveType::Char,
            Self::Bool(_) => ty == PrimitiveType::Bool,
        }
    }
}

/// Symbol information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: PrimitiveType,
    pub initialized: bool,
    pub value: Option<LiteralValue>,
    /// Loop nesting depth of the declaration
    pub scope: usize,
}

/// Declared variables, in first-declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a symbol. Returns false, leaving the table untouched, if the
    /// name is already declared.
    pub fn define(&mut self, symbol: Symbol) -> bool {
        if self.index.contains_key(&symbol.name) {
            return false;
        }
        self.index.insert(symbol.name.clone(), self.symbols.len());
        self.symbols.push(symbol);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.symbols[i])
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.index.get(name).map(|&i| &mut self.symbols[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Serialize for SymbolTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.symbols.len()))?;
        for symbol in &self.symbols {
            map.serialize_entry(&symbol.name, symbol)?;
        }
        map.end()
    }
}

// ==================== Diagnostics ====================

/// A semantic diagnostic. Analysis continues after each one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("Semantic Error: Variable '{name}' is already declared.")]
    AlreadyDeclared { name: String },

    #[error("Semantic Error: Variable '{name}' was not declared before assignment.")]
    UndeclaredAssignment { name: String },

    #[error("Semantic Error: Variable '{name}' used before declaration.")]
    UsedBeforeDeclaration { name: String },

    #[error("Semantic Error: Type mismatch in assignment to '{name}'. Cannot assign '{found}' to '{expected}'.")]
    TypeMismatch {
        name: String,
        expected: PrimitiveType,
        found: PrimitiveType,
    },

    #[error("Semantic Error: Incompatible types in condition ({op}). Cannot compare '{left}' and '{right}' with this operator.")]
    IncompatibleComparison {
        op: RelOp,
        left: PrimitiveType,
        right: PrimitiveType,
    },

    #[error("Semantic Error: Operator '+' cannot be used between '{left}' and '{right}'.")]
    InvalidAddition {
        left: PrimitiveType,
        right: PrimitiveType,
    },

    #[error("Semantic Error: Operator '{op}' requires numeric types, but got '{left}' and '{right}'.")]
    NonNumericOperands {
        op: BinOp,
        left: PrimitiveType,
        right: PrimitiveType,
    },

    #[error("Semantic Error: Division by zero.")]
    DivisionByZero,

    #[error("Semantic Error: Unary operator '-' cannot be applied to type '{operand}'.")]
    InvalidNegation { operand: PrimitiveType },

    #[error("Semantic Error: Unknown escape sequence '\\{escape}' in char literal: {literal}.")]
    UnknownEscape { escape: char, literal: String },

    #[error("Semantic Error: Char literal too long: {literal}. Expected single character or valid escape sequence.")]
    InvalidCharLiteral { literal: String },

    #[error("Semantic Error: Invalid number format '{literal}'.")]
    InvalidNumber { literal: String },
}

// ==================== Literal Helpers ====================

/// Decode a quoted char literal such as `'a'` or `'\n'`
pub fn decode_char(literal: &str) -> Result<char, SemanticError> {
    let invalid = || SemanticError::InvalidCharLiteral { literal: literal.to_string() };
    let inner = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(invalid)?;

    let mut chars = inner.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(c), None, None) => Ok(c),
        (Some('\\'), Some(escape), None) => match escape {
            'n' => Ok('\n'),
            't' => Ok('\t'),
            '\'' | '"' | '\\' => Ok(escape),
            _ => Err(SemanticError::UnknownEscape {
                escape,
                literal: literal.to_string(),
            }),
        },
        _ => Err(invalid()),
    }
}

/// Whether a numeric literal is written in floating-point form
pub fn is_float_literal(text: &str) -> bool {
    text.contains(|c: char| matches!(c, '.' | 'e' | 'E'))
}

/// Parse a numeric literal into its value
pub fn parse_number(text: &str) -> Option<LiteralValue> {
    if is_float_literal(text) {
        text.parse::<f64>().ok().map(LiteralValue::Float)
    } else {
        text.parse::<i64>().ok().map(LiteralValue::Int)
    }
}

/// The value of a literal expression, if it is one
pub fn literal_value(expr: &Expr) -> Option<LiteralValue> {
    match expr {
        Expr::Number { value } => parse_number(value),
        Expr::StringLiteral { value } => Some(LiteralValue::String(strip_quotes(value).to_string())),
        Expr::CharLiteral { value } => decode_char(value).ok().map(LiteralValue::Char),
        Expr::BooleanLiteral { value } => Some(LiteralValue::Bool(*value)),
        _ => None,
    }
}

/// Text between the surrounding quotes of a string literal
pub fn strip_quotes(literal: &str) -> &str {
    literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal)
}

// ==================== Expression Types ====================

/// Infer the type of an expression. Pure; `Unknown` propagates upward.
pub fn expression_type(symbols: &SymbolTable, expr: &Expr) -> ResolvedType {
    match expr {
        Expr::Number { value } => match parse_number(value) {
            Some(LiteralValue::Float(_)) => ResolvedType::DOUBLE,
            Some(_) => ResolvedType::INT,
            None => ResolvedType::Unknown,
        },
        Expr::Variable { name } => symbols
            .lookup(name)
            .map_or(ResolvedType::Unknown, |s| s.ty.into()),
        Expr::StringLiteral { .. } => ResolvedType::STRING,
        Expr::CharLiteral { value } => match decode_char(value) {
            Ok(_) => ResolvedType::CHAR,
            Err(_) => ResolvedType::Unknown,
        },
        Expr::BooleanLiteral { .. } => ResolvedType::BOOL,
        Expr::UnaryExpr { operand, .. } => {
            let ty = expression_type(symbols, operand);
            if ty.is_numeric() {
                ty
            } else {
                ResolvedType::Unknown
            }
        }
        Expr::BinaryExpr { op, left, right } => {
            let (Some(l), Some(r)) = (
                expression_type(symbols, left).primitive(),
                expression_type(symbols, right).primitive(),
            ) else {
                return ResolvedType::Unknown;
            };
            match op {
                BinOp::Add if l == PrimitiveType::String && r == PrimitiveType::String => {
                    ResolvedType::STRING
                }
                _ if !(l.is_numeric() && r.is_numeric()) => ResolvedType::Unknown,
                BinOp::Div => ResolvedType::division(l, r),
                _ => ResolvedType::arithmetic(l, r),
            }
        }
    }
}

// ==================== Semantic Analyzer ====================

/// Semantic analyzer
pub struct SemanticAnalyzer {
    symbols: SymbolTable,
    errors: Vec<SemanticError>,
    /// Current loop nesting depth
    depth: usize,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Analyze a program, returning the symbol table and every diagnostic found
    pub fn analyze(mut self, program: &Program) -> (SymbolTable, Vec<SemanticError>) {
        for stmt in &program.body {
            self.check_stmt(stmt);
        }
        log::debug!(
            "semantic analysis: {} symbol(s), {} diagnostic(s)",
            self.symbols.len(),
            self.errors.len()
        );
        (self.symbols, self.errors)
    }

    fn error(&mut self, err: SemanticError) {
        self.errors.push(err);
    }

    fn type_of(&self, expr: &Expr) -> ResolvedType {
        expression_type(&self.symbols, expr)
    }

    // ==================== Statements ====================

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(decl) => self.check_declaration(decl),
            Stmt::Assignment(assign) => self.check_assignment(&assign.var, &assign.expr),
            Stmt::ForLoop(for_loop) => {
                self.depth += 1;
                self.check_assignment(&for_loop.init.var, &for_loop.init.expr);
                self.check_condition(&for_loop.condition);
                self.check_assignment(&for_loop.update.var, &for_loop.update.expr);
                for stmt in &for_loop.body {
                    self.check_stmt(stmt);
                }
                self.depth -= 1;
            }
        }
    }

    fn check_declaration(&mut self, decl: &Declaration) {
        let fresh = self.symbols.define(Symbol {
            name: decl.var_name.clone(),
            ty: decl.var_type,
            initialized: false,
            value: None,
            scope: self.depth,
        });

        if !fresh {
            self.error(SemanticError::AlreadyDeclared { name: decl.var_name.clone() });
            if let Some(init) = &decl.initializer {
                self.check_expr(init);
            }
            return;
        }

        if let Some(init) = &decl.initializer {
            self.check_assignment(&decl.var_name, init);
        }
    }

    fn check_assignment(&mut self, name: &str, expr: &Expr) {
        let declared = self.symbols.lookup(name).map(|s| s.ty);
        if declared.is_none() {
            self.error(SemanticError::UndeclaredAssignment { name: name.to_string() });
        }
        self.check_expr(expr);

        let Some(declared) = declared else {
            return;
        };

        let value = match self.type_of(expr).primitive() {
            Some(found) => {
                if !declared.accepts(found) {
                    self.error(SemanticError::TypeMismatch {
                        name: name.to_string(),
                        expected: declared,
                        found,
                    });
                }
                literal_value(expr).filter(|v| v.storable_in(declared))
            }
            None => None,
        };

        if let Some(symbol) = self.symbols.lookup_mut(name) {
            symbol.initialized = true;
            symbol.value = value;
        }
    }

    fn check_condition(&mut self, cond: &Condition) {
        self.check_expr(&cond.left);
        self.check_expr(&cond.right);

        let (Some(left), Some(right)) =
            (self.type_of(&cond.left).primitive(), self.type_of(&cond.right).primitive())
        else {
            return;
        };

        let comparable = (left.is_numeric() && right.is_numeric())
            || (left == PrimitiveType::Char && right == PrimitiveType::Char)
            || (left == right
                && matches!(left, PrimitiveType::String | PrimitiveType::Bool)
                && cond.op.is_equality());

        if !comparable {
            self.error(SemanticError::IncompatibleComparison { op: cond.op, left, right });
        }
    }

    // ==================== Expressions ====================

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::BinaryExpr { op, left, right } => {
                self.check_expr(left);
                self.check_expr(right);
                self.check_binary(*op, left, right);
            }
            Expr::UnaryExpr { operand, .. } => {
                self.check_expr(operand);
                if let Some(ty) = self.type_of(operand).primitive() {
                    if !ty.is_numeric() {
                        self.error(SemanticError::InvalidNegation { operand: ty });
                    }
                }
            }
            Expr::Variable { name } => {
                if !self.symbols.contains(name) {
                    self.error(SemanticError::UsedBeforeDeclaration { name: name.clone() });
                }
            }
            Expr::Number { value } => {
                if parse_number(value).is_none() {
                    self.error(SemanticError::InvalidNumber { literal: value.clone() });
                }
            }
            Expr::CharLiteral { value } => {
                if let Err(err) = decode_char(value) {
                    self.error(err);
                }
            }
            Expr::StringLiteral { .. } | Expr::BooleanLiteral { .. } => {}
        }
    }

    fn check_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) {
        let (Some(l), Some(r)) = (self.type_of(left).primitive(), self.type_of(right).primitive())
        else {
            return;
        };
        let numeric = l.is_numeric() && r.is_numeric();

        match op {
            BinOp::Add => {
                let strings = l == PrimitiveType::String && r == PrimitiveType::String;
                if !(strings || numeric) {
                    self.error(SemanticError::InvalidAddition { left: l, right: r });
                }
            }
            BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if !numeric {
                    self.error(SemanticError::NonNumericOperands { op, left: l, right: r });
                }
                if op == BinOp::Div && is_zero_literal(right) {
                    self.error(SemanticError::DivisionByZero);
                }
            }
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_zero_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Number { value } => match parse_number(value) {
            Some(LiteralValue::Int(n)) => n == 0,
            Some(LiteralValue::Float(f)) => f == 0.0,
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::lex;
    use crate::frontend::parser::Parser;
    use pretty_assertions::assert_eq;

    fn analyze(source: &str) -> (SymbolTable, Vec<SemanticError>) {
        let program = Parser::new(lex(source)).unwrap().parse_program().unwrap();
        SemanticAnalyzer::new().analyze(&program)
    }

    fn messages(source: &str) -> Vec<String> {
        analyze(source).1.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_clean_program() {
        let (symbols, errors) = analyze("int x; x = 2 + 3;");
        assert!(errors.is_empty());
        let x = symbols.lookup("x").unwrap();
        assert_eq!(x.ty, PrimitiveType::Int);
        assert!(x.initialized);
        // not a literal
        assert_eq!(x.value, None);
    }

    #[test]
    fn test_redeclaration_keeps_first_type() {
        let (symbols, errors) = analyze("int x; float x;");
        assert_eq!(
            errors,
            vec![SemanticError::AlreadyDeclared { name: "x".to_string() }]
        );
        assert_eq!(symbols.lookup("x").unwrap().ty, PrimitiveType::Int);
        assert_eq!(symbols.len(), 1);
    }

    #[test]
    fn test_redeclaration_inside_loop() {
        let errors = messages("int i; int x; for(i=0;i<3;i=i+1){ int x; }");
        assert_eq!(errors, vec!["Semantic Error: Variable 'x' is already declared."]);
    }

    #[test]
    fn test_use_before_declaration() {
        let errors = messages("x = y; int y; y = 1;");
        assert_eq!(
            errors,
            vec![
                "Semantic Error: Variable 'x' was not declared before assignment.",
                "Semantic Error: Variable 'y' used before declaration.",
            ]
        );
    }

    #[test]
    fn test_declared_variable_never_flagged() {
        assert!(messages("int y; y = 1; y = y + 1; y = y * 2;").is_empty());
    }

    #[test]
    fn test_type_mismatch_and_widening() {
        assert!(messages("double d; d = 1; float f; f = 2.5;").is_empty());
        assert_eq!(
            messages("int i; i = 2.5;"),
            vec!["Semantic Error: Type mismatch in assignment to 'i'. Cannot assign 'double' to 'int'."]
        );
        assert_eq!(
            messages("char c; c = \"s\";"),
            vec!["Semantic Error: Type mismatch in assignment to 'c'. Cannot assign 'string' to 'char'."]
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            messages("float x; x = 1 / 0;"),
            vec!["Semantic Error: Division by zero."]
        );
        assert_eq!(messages("double x; x = 1 / 0.0;").len(), 1);
    }

    #[test]
    fn test_operator_rules() {
        assert_eq!(
            messages("string s; s = \"a\" + 1;"),
            vec!["Semantic Error: Operator '+' cannot be used between 'string' and 'int'."]
        );
        assert_eq!(
            messages("string s; s = \"a\" - \"b\";"),
            vec!["Semantic Error: Operator '-' requires numeric types, but got 'string' and 'string'."]
        );
        assert_eq!(
            messages("bool b; int x; x = -b;"),
            vec!["Semantic Error: Unary operator '-' cannot be applied to type 'bool'."]
        );
        assert!(messages("string s; s = \"a\" + \"b\";").is_empty());
    }

    #[test]
    fn test_unknown_suppresses_cascades() {
        // only the undeclared use is reported, not a mismatch on top
        assert_eq!(
            messages("int x; x = z + 1;"),
            vec!["Semantic Error: Variable 'z' used before declaration."]
        );
    }

    #[test]
    fn test_condition_rules() {
        let ok = "int i; string s; char c; for(i=0;s==\"a\";i=i+1){} for(i=0;c<'z';i=i+1){}";
        assert!(messages(ok).is_empty());
        assert_eq!(
            messages("int i; bool b; for(i=0;b<true;i=i+1){}"),
            vec!["Semantic Error: Incompatible types in condition (<). Cannot compare 'bool' and 'bool' with this operator."]
        );
        assert_eq!(messages("int i; for(i=0;i==\"a\";i=i+1){}").len(), 1);
    }

    #[test]
    fn test_char_literals() {
        assert!(messages("char c; c = '\\n'; c = 'q';").is_empty());
        assert_eq!(
            messages("char c; c = '\\q';"),
            vec!["Semantic Error: Unknown escape sequence '\\q' in char literal: '\\q'."]
        );
        assert_eq!(
            decode_char("'ab'").unwrap_err().to_string(),
            "Semantic Error: Char literal too long: 'ab'. Expected single character or valid escape sequence."
        );
    }

    #[test]
    fn test_recorded_values_and_scope() {
        let source = "int i; string s = \"hi\"; char c; c = '\\t'; float f; f = 3; \
                      for(i=0;i<2;i=i+1){ bool b = true; }";
        let (symbols, errors) = analyze(source);
        assert!(errors.is_empty());
        assert_eq!(symbols.lookup("s").unwrap().value, Some(LiteralValue::String("hi".to_string())));
        assert_eq!(symbols.lookup("c").unwrap().value, Some(LiteralValue::Char('\t')));
        assert_eq!(symbols.lookup("f").unwrap().value, Some(LiteralValue::Int(3)));
        // the update `i = i + 1` is not a literal
        assert_eq!(symbols.lookup("i").unwrap().value, None);
        let b = symbols.lookup("b").unwrap();
        assert_eq!((b.scope, b.value.clone()), (1, Some(LiteralValue::Bool(true))));
    }

    #[test]
    fn test_symbol_table_json() {
        let (symbols, _) = analyze("int x; float y; x = 4;");
        let json = serde_json::to_string(&symbols).unwrap();
        assert_eq!(
            json,
            r#"{"x":{"type":"int","initialized":true,"value":4,"scope":0},"y":{"type":"float","initialized":false,"value":null,"scope":0}}"#
        );
    }

    #[test]
    fn test_expression_type_is_pure() {
        let (symbols, _) = analyze("int i; float f; double d;");
        let expr = Expr::binary(BinOp::Div, Expr::variable("i"), Expr::variable("i"));
        assert_eq!(expression_type(&symbols, &expr), ResolvedType::FLOAT);
        let expr = Expr::binary(BinOp::Mul, Expr::variable("f"), Expr::variable("d"));
        assert_eq!(expression_type(&symbols, &expr), ResolvedType::DOUBLE);
        let expr = Expr::binary(BinOp::Add, Expr::variable("nope"), Expr::number("1"));
        assert_eq!(expression_type(&symbols, &expr), ResolvedType::Unknown);
        assert_eq!(expression_type(&symbols, &Expr::number("1e3")), ResolvedType::DOUBLE);
    }
}
