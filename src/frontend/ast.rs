//! Abstract Syntax Tree definitions for tacc
//!
//! The serde shape is the interchange format: every node is an object
//! with a `type` discriminator.

use std::fmt::{self, Write};

use serde::Serialize;

use crate::types::PrimitiveType;

/// A complete program (compilation unit)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub struct Program {
    pub body: Vec<Stmt>,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Stmt {
    Declaration(Declaration),
    Assignment(Assignment),
    ForLoop(ForLoop),
}

/// `type name [= expr];`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub struct Declaration {
    pub var_type: PrimitiveType,
    pub var_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Expr>,
}

/// `name = expr`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub struct Assignment {
    pub var: String,
    pub expr: Expr,
}

/// `for (init; condition; update) { body }`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub struct ForLoop {
    pub init: Assignment,
    pub condition: Condition,
    pub update: Assignment,
    pub body: Vec<Stmt>,
}

/// `left relop right`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub struct Condition {
    pub left: Expr,
    pub op: RelOp,
    pub right: Expr,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Expr {
    BinaryExpr {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryExpr {
        op: UnOp,
        operand: Box<Expr>,
    },
    Variable {
        name: String,
    },
    /// Numeric literal, kept as written
    Number {
        value: String,
    },
    /// String literal including its quotes
    StringLiteral {
        value: String,
    },
    /// Char literal including its quotes
    CharLiteral {
        value: String,
    },
    BooleanLiteral {
        value: bool,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable { name: name.into() }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Expr::Number { value: value.into() }
    }

    /// Node kind name, as used by the interchange format
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::BinaryExpr { .. } => "BinaryExpr",
            Expr::UnaryExpr { .. } => "UnaryExpr",
            Expr::Variable { .. } => "Variable",
            Expr::Number { .. } => "Number",
            Expr::StringLiteral { .. } => "StringLiteral",
            Expr::CharLiteral { .. } => "CharLiteral",
            Expr::BooleanLiteral { .. } => "BooleanLiteral",
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl BinOp {
    pub fn from_lexeme(s: &str) -> Option<Self> {
        match s {
            "+" => Some(BinOp::Add),
            "-" => Some(BinOp::Sub),
            "*" => Some(BinOp::Mul),
            "/" => Some(BinOp::Div),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnOp {
    /// Negation (-)
    #[serde(rename = "-")]
    Neg,
}

/// Relational operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl RelOp {
    pub fn from_lexeme(s: &str) -> Option<Self> {
        match s {
            "<" => Some(RelOp::Lt),
            ">" => Some(RelOp::Gt),
            "<=" => Some(RelOp::Le),
            ">=" => Some(RelOp::Ge),
            "==" => Some(RelOp::Eq),
            "!=" => Some(RelOp::Ne),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            RelOp::Lt => "<",
            RelOp::Gt => ">",
            RelOp::Le => "<=",
            RelOp::Ge => ">=",
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
        }
    }

    /// Only equality comparisons apply to strings and booleans
    pub fn is_equality(&self) -> bool {
        matches!(self, RelOp::Eq | RelOp::Ne)
    }
}

macro_rules! display_symbol {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.symbol())
            }
        })*
    };
}

display_symbol!(BinOp, RelOp);

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("-")
    }
}

// ==================== Text Dump ====================

/// Indented, human-readable dump of a program tree
pub fn dump(program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Program");
    for stmt in &program.body {
        dump_stmt(&mut out, stmt, 1);
    }
    out
}

fn line(out: &mut String, depth: usize, text: fmt::Arguments<'_>) {
    let _ = writeln!(out, "{}{}", "  ".repeat(depth), text);
}

fn dump_assignment(out: &mut String, assign: &Assignment, depth: usize) {
    line(out, depth, format_args!("Assignment var={}", assign.var));
    dump_expr(out, &assign.expr, depth + 1);
}

fn dump_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match stmt {
        Stmt::Declaration(decl) => {
            line(out, depth, format_args!("Declaration {} {}", decl.var_type, decl.var_name));
            if let Some(init) = &decl.initializer {
                dump_expr(out, init, depth + 1);
            }
        }
        Stmt::Assignment(assign) => dump_assignment(out, assign, depth),
        Stmt::ForLoop(for_loop) => {
            line(out, depth, format_args!("ForLoop"));
            dump_assignment(out, &for_loop.init, depth + 1);
            let cond = &for_loop.condition;
            line(out, depth + 1, format_args!("Condition op={}", cond.op));
            dump_expr(out, &cond.left, depth + 2);
            dump_expr(out, &cond.right, depth + 2);
            dump_assignment(out, &for_loop.update, depth + 1);
            for stmt in &for_loop.body {
                dump_stmt(out, stmt, depth + 1);
            }
        }
    }
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize) {
    match expr {
        Expr::BinaryExpr { op, left, right } => {
            line(out, depth, format_args!("BinaryExpr op={}", op));
            dump_expr(out, left, depth + 1);
            dump_expr(out, right, depth + 1);
        }
        Expr::UnaryExpr { op, operand } => {
            line(out, depth, format_args!("UnaryExpr op={}", op));
            dump_expr(out, operand, depth + 1);
        }
        Expr::Variable { name } => line(out, depth, format_args!("Variable {}", name)),
        Expr::Number { value }
        | Expr::StringLiteral { value }
        | Expr::CharLiteral { value } => {
            line(out, depth, format_args!("{} {}", expr.kind(), value))
        }
        Expr::BooleanLiteral { value } => line(out, depth, format_args!("BooleanLiteral {}", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Program {
        Program {
            body: vec![
                Stmt::Declaration(Declaration {
                    var_type: PrimitiveType::Int,
                    var_name: "x".to_string(),
                    initializer: None,
                }),
                Stmt::Assignment(Assignment {
                    var: "x".to_string(),
                    expr: Expr::binary(BinOp::Add, Expr::number("2"), Expr::number("3")),
                }),
            ],
        }
    }

    #[test]
    fn test_interchange_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "Program",
                "body": [
                    {"type": "Declaration", "var_type": "int", "var_name": "x"},
                    {
                        "type": "Assignment",
                        "var": "x",
                        "expr": {
                            "type": "BinaryExpr",
                            "op": "+",
                            "left": {"type": "Number", "value": "2"},
                            "right": {"type": "Number", "value": "3"}
                        }
                    }
                ]
            })
        );
    }

    #[test]
    fn test_for_loop_shape() {
        let assign = |v: &str| Assignment { var: "i".to_string(), expr: Expr::number(v) };
        let for_loop = Stmt::ForLoop(ForLoop {
            init: assign("0"),
            condition: Condition {
                left: Expr::variable("i"),
                op: RelOp::Lt,
                right: Expr::number("3"),
            },
            update: assign("1"),
            body: vec![],
        });
        let value = serde_json::to_value(&for_loop).unwrap();
        assert_eq!(value["type"], "ForLoop");
        assert_eq!(value["init"]["type"], "Assignment");
        assert_eq!(value["condition"]["type"], "Condition");
        assert_eq!(value["condition"]["op"], "<");
        assert_eq!(value["body"], json!([]));
    }

    #[test]
    fn test_dump() {
        let text = dump(&sample());
        assert_eq!(
            text,
            "Program\n  Declaration int x\n  Assignment var=x\n    BinaryExpr op=+\n      Number 2\n      Number 3\n"
        );
    }
}
