//! TAC Generator - AST to three-address code
//!
//! Syntax-directed, bottom-up lowering of a semantically valid program.
//! Temporaries (`tN`) and labels (`LN`) come from monotonic counters owned
//! by one generator. A temporary index is skipped when the program already
//! uses that name, so temporaries never alias program variables.

use std::collections::HashSet;

use crate::frontend::ast::*;
use crate::frontend::semantic::{decode_char, parse_number, strip_quotes, LiteralValue};
use crate::middle::ir::{Operand, Quad, TacOp, TacProgram};

/// TAC generator
pub struct TacGenerator {
    out: TacProgram,
    /// Identifiers the program itself uses
    reserved: HashSet<String>,
    temp_count: usize,
    label_count: usize,
}

impl TacGenerator {
    pub fn new() -> Self {
        Self {
            out: TacProgram::default(),
            reserved: HashSet::new(),
            temp_count: 0,
            label_count: 0,
        }
    }

    /// Lower a program to an instruction sequence plus its string literals
    pub fn generate(mut self, program: &Program) -> TacProgram {
        for stmt in &program.body {
            reserve_stmt(&mut self.reserved, stmt);
        }
        for stmt in &program.body {
            self.gen_stmt(stmt);
        }
        log::debug!(
            "tac generation: {} instruction(s), {} temp(s), {} label(s), {} string(s)",
            self.out.code.len(),
            self.out.temps.len(),
            self.label_count,
            self.out.strings.len()
        );
        self.out
    }

    fn new_temp(&mut self) -> String {
        loop {
            let name = format!("t{}", self.temp_count);
            self.temp_count += 1;
            if !self.reserved.contains(&name) {
                self.out.temps.insert(name.clone());
                return name;
            }
        }
    }

    fn new_label(&mut self) -> String {
        let name = format!("L{}", self.label_count);
        self.label_count += 1;
        name
    }

    fn emit(&mut self, quad: Quad) {
        self.out.code.push(quad);
    }

    // ==================== Statements ====================

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(decl) => {
                if let Some(init) = &decl.initializer {
                    self.gen_assignment(&decl.var_name, init);
                }
            }
            Stmt::Assignment(assign) => self.gen_assignment(&assign.var, &assign.expr),
            Stmt::ForLoop(for_loop) => self.gen_for_loop(for_loop),
        }
    }

    fn gen_assignment(&mut self, var: &str, expr: &Expr) {
        let value = self.gen_expr(expr);
        self.emit(Quad::assign(value, var));
    }

    /// ```text
    /// <init>
    /// LABEL start
    /// <relop> left, right -> tc
    /// IF_FALSE tc -> after
    /// LABEL body
    /// <body>
    /// <update>
    /// GOTO start
    /// LABEL after
    /// ```
    fn gen_for_loop(&mut self, for_loop: &ForLoop) {
        self.gen_assignment(&for_loop.init.var, &for_loop.init.expr);

        let start = self.new_label();
        let body = self.new_label();
        let after = self.new_label();

        self.emit(Quad::label(start.clone()));
        let (left, op, right) = self.gen_condition(&for_loop.condition);
        let cond = self.new_temp();
        self.emit(Quad::binary(op.into(), left, right, cond.clone()));
        self.emit(Quad::if_false(Operand::Name(cond), after.clone()));

        self.emit(Quad::label(body));
        for stmt in &for_loop.body {
            self.gen_stmt(stmt);
        }
        self.gen_assignment(&for_loop.update.var, &for_loop.update.expr);
        self.emit(Quad::goto(start));
        self.emit(Quad::label(after));
    }

    /// Lower both sides; the comparison itself is emitted by the loop
    fn gen_condition(&mut self, cond: &Condition) -> (Operand, RelOp, Operand) {
        let left = self.gen_expr(&cond.left);
        let right = self.gen_expr(&cond.right);
        (left, cond.op, right)
    }

    // ==================== Expressions ====================

    fn gen_expr(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::BinaryExpr { op, left, right } => {
                let left = self.gen_expr(left);
                let right = self.gen_expr(right);
                let dest = self.new_temp();
                let tac_op = match op {
                    BinOp::Add if left.is_string_ref() || right.is_string_ref() => TacOp::Concat,
                    _ => TacOp::from(*op),
                };
                self.emit(Quad::binary(tac_op, left, right, dest.clone()));
                Operand::Name(dest)
            }
            Expr::UnaryExpr { operand, .. } => {
                let operand = self.gen_expr(operand);
                let dest = self.new_temp();
                self.emit(Quad::unary(TacOp::Uminus, operand, dest.clone()));
                Operand::Name(dest)
            }
            Expr::Variable { name } => Operand::Name(name.clone()),
            Expr::Number { value } => match parse_number(value) {
                Some(LiteralValue::Int(n)) => Operand::Int(n),
                Some(LiteralValue::Float(x)) => Operand::Float(x),
                // rejected by the analyzer
                _ => Operand::Name(value.clone()),
            },
            Expr::StringLiteral { value } => Operand::StringRef(self.out.strings.intern(strip_quotes(value))),
            Expr::CharLiteral { value } => match decode_char(value) {
                Ok(c) => Operand::Char(c),
                Err(_) => Operand::Name(value.clone()),
            },
            Expr::BooleanLiteral { value } => Operand::Bool(*value),
        }
    }
}

fn reserve_stmt(names: &mut HashSet<String>, stmt: &Stmt) {
    match stmt {
        Stmt::Declaration(decl) => {
            names.insert(decl.var_name.clone());
            if let Some(init) = &decl.initializer {
                reserve_expr(names, init);
            }
        }
        Stmt::Assignment(assign) => reserve_assignment(names, assign),
        Stmt::ForLoop(for_loop) => {
            reserve_assignment(names, &for_loop.init);
            reserve_expr(names, &for_loop.condition.left);
            reserve_expr(names, &for_loop.condition.right);
            reserve_assignment(names, &for_loop.update);
            for stmt in &for_loop.body {
                reserve_stmt(names, stmt);
            }
        }
    }
}

fn reserve_assignment(names: &mut HashSet<String>, assign: &Assignment) {
    names.insert(assign.var.clone());
    reserve_expr(names, &assign.expr);
}

fn reserve_expr(names: &mut HashSet<String>, expr: &Expr) {
    match expr {
        Expr::BinaryExpr { left, right, .. } => {
            reserve_expr(names, left);
            reserve_expr(names, right);
        }
        Expr::UnaryExpr { operand, .. } => reserve_expr(names, operand),
        Expr::Variable { name } => {
            names.insert(name.clone());
        }
        _ => {}
    }
}

impl Default for TacGenerator {
    fn default() -> Self {
        Self::new()
    }
}
