//! Parser for tacc
//!
//! One-token-lookahead recursive descent over the materialized token
//! stream. The first unmet expectation aborts the parse.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::types::PrimitiveType;
use crate::utils::{Error, Result};

/// Deepest grammar nesting accepted before the parse is abandoned
pub const MAX_NESTING_DEPTH: usize = 256;

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Leftmost derivation trace, when enabled
    derivation: Option<Vec<String>>,
    depth: usize,
    warnings: Vec<String>,
}

impl Parser {
    /// Create a new parser from a lexer, materializing all tokens
    pub fn new(mut lexer: Lexer) -> Result<Self> {
        Ok(Self::from_tokens(lexer.tokenize()?))
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            derivation: None,
            depth: 0,
            warnings: Vec::new(),
        }
    }

    /// Record a derivation trace while parsing
    pub fn with_derivation_log(mut self) -> Self {
        self.derivation = Some(Vec::new());
        self
    }

    /// The derivation trace recorded so far, also available after a failed parse
    pub fn derivation(&self) -> Option<&[String]> {
        self.derivation.as_deref()
    }

    /// Non-fatal findings, such as tokens left after the program
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_is(&self, kind: TokenKind, lexeme: Option<&str>) -> bool {
        self.current().map_or(false, |t| t.is(kind, lexeme))
    }

    fn found(&self) -> String {
        self.current()
            .map(Token::describe)
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn log(&mut self, message: impl FnOnce() -> String) {
        if let Some(steps) = self.derivation.as_mut() {
            steps.push(format!("{}{}", "  ".repeat(self.depth), message()));
        }
    }

    /// Run `f` one level deeper in the derivation trace
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            let err = Error::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                position: self.pos,
                span: self.current().map(|t| t.span),
            };
            return Err(self.fail(err));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn fail(&mut self, err: Error) -> Error {
        self.log(|| format!("ERROR: {}", err));
        err
    }

    /// Consume the current token if both kind and (optional) lexeme match
    fn match_token(&mut self, kind: TokenKind, lexeme: Option<&str>) -> Option<Token> {
        if !self.current_is(kind, lexeme) {
            return None;
        }
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        self.log(|| format!("Match terminal: '{}' (Type: {})", token.lexeme, token.kind));
        Some(token)
    }

    /// Consume a matching token or fail
    fn expect(&mut self, kind: TokenKind, lexeme: Option<&str>) -> Result<Token> {
        if let Some(token) = self.match_token(kind, lexeme) {
            return Ok(token);
        }
        let expected = match lexeme {
            Some(l) => format!("'{}' ({})", l, kind),
            None => format!("type '{}'", kind),
        };
        let err = Error::UnexpectedToken {
            expected,
            found: self.found(),
            position: self.pos,
            span: self.current().map(|t| t.span),
        };
        Err(self.fail(err))
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<Token> {
        self.expect(TokenKind::Symbol, Some(symbol))
    }

    fn starts_declaration(&self) -> bool {
        self.current().map_or(false, |t| {
            t.kind == TokenKind::Keyword && PrimitiveType::from_keyword(&t.lexeme).is_some()
        })
    }

    fn can_start_stmt(&self) -> bool {
        self.current_is(TokenKind::Keyword, Some("for"))
            || self.starts_declaration()
            || self.current_is(TokenKind::Id, None)
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        self.log(|| "Start Symbol: <Program>".to_string());
        let body = self.nested(|p| {
            p.log(|| "Applying rule: Program -> StmtList".to_string());
            p.parse_stmt_list()
        })?;

        if self.pos < self.tokens.len() {
            let rest: Vec<String> = self.tokens[self.pos..].iter().map(Token::to_string).collect();
            let warning = format!(
                "Parsing finished but tokens remain at position {}: [{}]",
                self.pos,
                rest.join(", ")
            );
            log::warn!("{}", warning);
            self.log(|| format!("Warning: {}", warning));
            self.warnings.push(warning);
        }

        Ok(Program { body })
    }

    fn parse_stmt_list(&mut self) -> Result<Vec<Stmt>> {
        self.nested(|p| {
            let mut stmts = Vec::new();
            loop {
                let head = if stmts.is_empty() { "StmtList" } else { "StmtList_Tail" };
                if p.current().is_none() {
                    p.log(|| format!("{} -> ε (end of input)", head));
                    break;
                }
                if p.current_is(TokenKind::Symbol, Some("}")) {
                    p.log(|| format!("{} -> ε (found '}}')", head));
                    break;
                }
                if !p.can_start_stmt() {
                    let found = p.found();
                    p.log(|| format!("{} -> ε (token {} cannot start Stmt)", head, found));
                    break;
                }
                p.log(|| format!("{} -> Stmt StmtList_Tail", head));
                stmts.push(p.parse_stmt()?);
            }
            Ok(stmts)
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        self.nested(|p| {
            if p.current_is(TokenKind::Keyword, Some("for")) {
                p.log(|| "Applying rule: Stmt -> ForLoop".to_string());
                Ok(Stmt::ForLoop(p.parse_for_loop()?))
            } else if p.starts_declaration() {
                p.log(|| "Applying rule: Stmt -> Declaration".to_string());
                Ok(Stmt::Declaration(p.parse_declaration()?))
            } else if p.current_is(TokenKind::Id, None) {
                p.log(|| "Applying rule: Stmt -> Assignment ;".to_string());
                let assign = p.parse_assignment()?;
                p.expect_symbol(";")?;
                Ok(Stmt::Assignment(assign))
            } else {
                let err = Error::ExpectedStatement {
                    found: p.found(),
                    position: p.pos,
                    span: p.current().map(|t| t.span),
                };
                Err(p.fail(err))
            }
        })
    }

    fn parse_declaration(&mut self) -> Result<Declaration> {
        self.nested(|p| {
            p.log(|| "Applying rule: Declaration -> Type ID [= Expression] ;".to_string());
            let type_token = p.expect(TokenKind::Keyword, None)?;
            let var_type = match PrimitiveType::from_keyword(&type_token.lexeme) {
                Some(ty) => ty,
                None => {
                    let err = Error::ExpectedType {
                        found: type_token.lexeme,
                        span: Some(type_token.span),
                    };
                    return Err(p.fail(err));
                }
            };
            let var_name = p.expect(TokenKind::Id, None)?.lexeme;

            let initializer = if p.match_token(TokenKind::Assign, Some("=")).is_some() {
                p.log(|| "Detected initializer in declaration.".to_string());
                Some(p.parse_expression()?)
            } else {
                None
            };

            p.expect_symbol(";")?;
            Ok(Declaration { var_type, var_name, initializer })
        })
    }

    fn parse_for_loop(&mut self) -> Result<ForLoop> {
        self.nested(|p| {
            p.log(|| {
                "Applying rule: ForLoop -> 'for' '(' Assignment ';' Condition ';' Assignment ')' '{' StmtList '}'"
                    .to_string()
            });
            p.expect(TokenKind::Keyword, Some("for"))?;
            p.expect_symbol("(")?;
            let init = p.parse_assignment()?;
            p.expect_symbol(";")?;
            let condition = p.parse_condition()?;
            p.expect_symbol(";")?;
            let update = p.parse_assignment()?;
            p.expect_symbol(")")?;
            p.expect_symbol("{")?;
            let body = p.parse_stmt_list()?;
            p.expect_symbol("}")?;
            Ok(ForLoop { init, condition, update, body })
        })
    }

    fn parse_assignment(&mut self) -> Result<Assignment> {
        self.nested(|p| {
            p.log(|| "Applying rule: Assignment -> ID = Expression".to_string());
            let var = p.expect(TokenKind::Id, None)?.lexeme;
            p.expect(TokenKind::Assign, Some("="))?;
            let expr = p.parse_expression()?;
            Ok(Assignment { var, expr })
        })
    }

    fn parse_condition(&mut self) -> Result<Condition> {
        self.nested(|p| {
            p.log(|| "Applying rule: Condition -> Expression RelOp Expression".to_string());
            let left = p.parse_expression()?;
            let op_token = p.expect(TokenKind::RelOp, None)?;
            // the lexer only produces the six relational lexemes
            let op = RelOp::from_lexeme(&op_token.lexeme).unwrap_or(RelOp::Eq);
            let right = p.parse_expression()?;
            Ok(Condition { left, op, right })
        })
    }

    /// Expression -> Term (('+'|'-') Term)*
    fn parse_expression(&mut self) -> Result<Expr> {
        self.nested(|p| {
            p.log(|| "Applying rule: Expression -> Term Expression'".to_string());
            let mut node = p.parse_term()?;
            while let Some(op) = p.binary_operator(&[BinOp::Add, BinOp::Sub]) {
                p.log(|| format!("Applying rule: Expression' -> {} Term Expression'", op));
                let right = p.parse_term()?;
                node = Expr::binary(op, node, right);
            }
            p.log(|| "Applying rule: Expression' -> ε".to_string());
            Ok(node)
        })
    }

    /// Term -> Factor (('*'|'/') Factor)*
    fn parse_term(&mut self) -> Result<Expr> {
        self.nested(|p| {
            p.log(|| "Applying rule: Term -> Factor Term'".to_string());
            let mut node = p.parse_factor()?;
            while let Some(op) = p.binary_operator(&[BinOp::Mul, BinOp::Div]) {
                p.log(|| format!("Applying rule: Term' -> {} Factor Term'", op));
                let right = p.parse_factor()?;
                node = Expr::binary(op, node, right);
            }
            p.log(|| "Applying rule: Term' -> ε".to_string());
            Ok(node)
        })
    }

    /// Consume an OP token if it is one of `allowed`
    fn binary_operator(&mut self, allowed: &[BinOp]) -> Option<BinOp> {
        let op = self
            .current()
            .filter(|t| t.kind == TokenKind::Op)
            .and_then(|t| BinOp::from_lexeme(&t.lexeme))
            .filter(|op| allowed.contains(op))?;
        self.match_token(TokenKind::Op, Some(op.symbol()))?;
        Some(op)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        self.nested(|p| {
            if p.match_token(TokenKind::Op, Some("-")).is_some() {
                p.log(|| "Applying rule: Factor -> - Factor".to_string());
                let operand = p.parse_factor()?;
                return Ok(Expr::UnaryExpr { op: UnOp::Neg, operand: Box::new(operand) });
            }
            if p.match_token(TokenKind::Symbol, Some("(")).is_some() {
                p.log(|| "Applying rule: Factor -> ( Expression )".to_string());
                let expr = p.parse_expression()?;
                p.expect_symbol(")")?;
                return Ok(expr);
            }

            let kind = p.current().map(|t| (t.kind, t.lexeme.clone()));
            match kind {
                Some((TokenKind::Id, _)) => {
                    p.log(|| "Applying rule: Factor -> ID".to_string());
                    let name = p.expect(TokenKind::Id, None)?.lexeme;
                    Ok(Expr::Variable { name })
                }
                Some((TokenKind::Number, _)) => {
                    p.log(|| "Applying rule: Factor -> NUMBER".to_string());
                    let value = p.expect(TokenKind::Number, None)?.lexeme;
                    Ok(Expr::Number { value })
                }
                Some((TokenKind::StringLiteral, _)) => {
                    p.log(|| "Applying rule: Factor -> STRING_LITERAL".to_string());
                    let value = p.expect(TokenKind::StringLiteral, None)?.lexeme;
                    Ok(Expr::StringLiteral { value })
                }
                Some((TokenKind::CharLiteral, _)) => {
                    p.log(|| "Applying rule: Factor -> CHAR_LITERAL".to_string());
                    let value = p.expect(TokenKind::CharLiteral, None)?.lexeme;
                    Ok(Expr::CharLiteral { value })
                }
                Some((TokenKind::Keyword, word)) if word == "true" || word == "false" => {
                    p.log(|| format!("Applying rule: Factor -> {}", word));
                    p.expect(TokenKind::Keyword, Some(word.as_str()))?;
                    Ok(Expr::BooleanLiteral { value: word == "true" })
                }
                _ => {
                    let err = Error::ExpectedFactor {
                        found: p.found(),
                        position: p.pos,
                        span: p.current().map(|t| t.span),
                    };
                    Err(p.fail(err))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::lex;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Result<Program> {
        let mut parser = Parser::new(lex(source))?;
        parser.parse_program()
    }

    #[test]
    fn test_declaration_and_assignment() {
        let program = parse("int x; x = 2 + 3;").unwrap();
        assert_eq!(
            program,
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
        );
    }

    #[test]
    fn test_precedence_and_associativity() {
        let program = parse("x = 1 - 2 - 3 * 4 / 5;").unwrap();
        let Stmt::Assignment(assign) = &program.body[0] else {
            panic!("Expected assignment");
        };
        // (1 - 2) - ((3 * 4) / 5)
        let expected = Expr::binary(
            BinOp::Sub,
            Expr::binary(BinOp::Sub, Expr::number("1"), Expr::number("2")),
            Expr::binary(
                BinOp::Div,
                Expr::binary(BinOp::Mul, Expr::number("3"), Expr::number("4")),
                Expr::number("5"),
            ),
        );
        assert_eq!(assign.expr, expected);
    }

    #[test]
    fn test_unary_and_parentheses() {
        let program = parse("x = -(a + 1) * b;").unwrap();
        let Stmt::Assignment(assign) = &program.body[0] else {
            panic!("Expected assignment");
        };
        let expected = Expr::binary(
            BinOp::Mul,
            Expr::UnaryExpr {
                op: UnOp::Neg,
                operand: Box::new(Expr::binary(BinOp::Add, Expr::variable("a"), Expr::number("1"))),
            },
            Expr::variable("b"),
        );
        assert_eq!(assign.expr, expected);
    }

    #[test]
    fn test_for_loop() {
        let program = parse("for(i=0;i<3;i=i+1){x=x+1;}").unwrap();
        let Stmt::ForLoop(for_loop) = &program.body[0] else {
            panic!("Expected for loop");
        };
        assert_eq!(for_loop.init.var, "i");
        assert_eq!(for_loop.condition.op, RelOp::Lt);
        assert_eq!(for_loop.body.len(), 1);
    }

    #[test]
    fn test_literals_and_initializer() {
        let program = parse("string s = \"hi\"; char c = 'a'; bool b = true; b = false;").unwrap();
        assert_eq!(program.body.len(), 4);
        let Stmt::Declaration(decl) = &program.body[0] else {
            panic!("Expected declaration");
        };
        assert_eq!(decl.initializer, Some(Expr::StringLiteral { value: "\"hi\"".to_string() }));
        let Stmt::Assignment(assign) = &program.body[3] else {
            panic!("Expected assignment");
        };
        assert_eq!(assign.expr, Expr::BooleanLiteral { value: false });
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("int x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected ';' (SYMBOL) but found end of input at position 2"
        );
    }

    #[test]
    fn test_bad_factor() {
        let err = parse("x = ;").unwrap_err();
        assert!(matches!(err, Error::ExpectedFactor { position: 2, .. }));
    }

    #[test]
    fn test_condition_requires_relop() {
        let err = parse("for(i=0;i;i=i+1){}").unwrap_err();
        assert!(err.to_string().starts_with("Expected type 'REL_OP' but found ';' (SYMBOL)"));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let source = format!("x = {}1{};", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse(&source).unwrap_err();
        assert!(matches!(
            err,
            Error::NestingTooDeep { limit: MAX_NESTING_DEPTH, .. }
        ));

        let source = format!("x = {}1{};", "(".repeat(40), ")".repeat(40));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn test_trailing_tokens_warn() {
        let mut parser = Parser::new(lex("int x; } x = 1;")).unwrap();
        let program = parser.parse_program().unwrap();
        assert_eq!(program.body.len(), 1);
        assert_eq!(parser.warnings().len(), 1);
        assert!(parser.warnings()[0].contains("position 3"));
    }

    #[test]
    fn test_derivation_log() {
        let mut parser = Parser::new(lex("x = 1;")).unwrap().with_derivation_log();
        parser.parse_program().unwrap();
        let steps = parser.derivation().unwrap();
        assert_eq!(steps[0], "Start Symbol: <Program>");
        assert!(steps.iter().any(|s| s.trim() == "Applying rule: Stmt -> Assignment ;"));
        assert!(steps.iter().any(|s| s.trim() == "Match terminal: ';' (Type: SYMBOL)"));
    }

    #[test]
    fn test_derivation_log_keeps_error() {
        let mut parser = Parser::new(lex("x = ;")).unwrap().with_derivation_log();
        assert!(parser.parse_program().is_err());
        let steps = parser.derivation().unwrap();
        assert!(steps.last().unwrap().trim_start().starts_with("ERROR:"));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let source = "int i; int x; for(i=0;i<3;i=i+1){x=x+1;}";
        assert_eq!(parse(source).unwrap(), parse(source).unwrap());
    }
}
