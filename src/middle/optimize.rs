//! TAC Optimizer for tacc
//!
//! Implements five local passes over the instruction sequence. Each pass
//! runs exactly once, in registration order.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::middle::ir::*;

/// Problems found while optimizing. The affected instruction is left as is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeDiagnostic {
    #[error("Division by zero at instruction {index}: {result} = {dividend} / {divisor}")]
    DivisionByZero {
        index: usize,
        dividend: Operand,
        divisor: Operand,
        result: String,
    },
}

/// Optimization pass trait
pub trait OptimizationPass {
    /// Name of the optimization pass
    fn name(&self) -> &'static str;

    /// Run the pass over the whole sequence, returning whether it changed anything
    fn run(&mut self, code: &mut Vec<Quad>, diagnostics: &mut Vec<OptimizeDiagnostic>) -> bool;
}

/// Result of optimization
#[derive(Debug, Clone, PartialEq)]
pub struct Optimized {
    pub code: Vec<Quad>,
    pub diagnostics: Vec<OptimizeDiagnostic>,
}

/// The optimizer - runs optimization passes
pub struct Optimizer {
    passes: Vec<Box<dyn OptimizationPass>>,
}

impl Optimizer {
    /// The standard pipeline. `temps` are the names the generator introduced;
    /// every other defined name is a program variable and stays live.
    pub fn new(temps: &HashSet<String>) -> Self {
        let mut opt = Self { passes: Vec::new() };
        opt.add_pass(Box::new(ConstantFolding::new()));
        opt.add_pass(Box::new(ConstantPropagation::new()));
        opt.add_pass(Box::new(CommonSubexpressionElimination::new()));
        opt.add_pass(Box::new(StrengthReduction::new()));
        opt.add_pass(Box::new(DeadCodeElimination::new(temps.clone())));
        opt
    }

    /// An optimizer with no passes registered
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    /// Add an optimization pass
    pub fn add_pass(&mut self, pass: Box<dyn OptimizationPass>) {
        self.passes.push(pass);
    }

    /// Run every pass once over a copy of `code`
    pub fn optimize(&mut self, code: &[Quad]) -> Optimized {
        let mut code = code.to_vec();
        let mut diagnostics = Vec::new();

        for pass in &mut self.passes {
            let before = code.len();
            let changed = pass.run(&mut code, &mut diagnostics);
            log::trace!(
                "pass {}: {} -> {} instruction(s){}",
                pass.name(),
                before,
                code.len(),
                if changed { " (changed)" } else { "" }
            );
        }

        for diag in &diagnostics {
            log::warn!("{}", diag);
        }

        Optimized { code, diagnostics }
    }
}

// ==================== Constant Folding ====================

/// Folds arithmetic on two numeric literals into an ASSIGN
pub struct ConstantFolding;

impl ConstantFolding {
    pub fn new() -> Self {
        Self
    }

    /// `None` leaves the instruction unfolded
    fn fold_binop(op: TacOp, left: &Operand, right: &Operand) -> Option<Operand> {
        match (left, right) {
            (Operand::Int(l), Operand::Int(r)) => match op {
                TacOp::Add => l.checked_add(*r).map(Operand::Int),
                TacOp::Sub => l.checked_sub(*r).map(Operand::Int),
                TacOp::Mul => l.checked_mul(*r).map(Operand::Int),
                TacOp::Div if *r != 0 => Some(Operand::Float(*l as f64 / *r as f64)),
                _ => None,
            },
            _ => {
                let (l, r) = (as_f64(left)?, as_f64(right)?);
                let result = match op {
                    TacOp::Add => l + r,
                    TacOp::Sub => l - r,
                    TacOp::Mul => l * r,
                    TacOp::Div if r != 0.0 => l / r,
                    _ => return None,
                };
                Some(Operand::Float(result))
            }
        }
    }
}

fn as_f64(operand: &Operand) -> Option<f64> {
    match operand {
        Operand::Int(n) => Some(*n as f64),
        Operand::Float(x) => Some(*x),
        _ => None,
    }
}

fn is_zero(operand: &Operand) -> bool {
    match operand {
        Operand::Int(n) => *n == 0,
        Operand::Float(x) => *x == 0.0,
        _ => false,
    }
}

impl OptimizationPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, code: &mut Vec<Quad>, diagnostics: &mut Vec<OptimizeDiagnostic>) -> bool {
        let mut changed = false;

        for (index, quad) in code.iter_mut().enumerate() {
            if !quad.op.is_arithmetic() {
                continue;
            }
            let (Some(left), Some(right)) = (&quad.arg1, &quad.arg2) else {
                continue;
            };
            if !(left.is_numeric() && right.is_numeric()) {
                continue;
            }

            if quad.op == TacOp::Div && is_zero(right) {
                diagnostics.push(OptimizeDiagnostic::DivisionByZero {
                    index,
                    dividend: left.clone(),
                    divisor: right.clone(),
                    result: quad.result.clone().unwrap_or_default(),
                });
                continue;
            }

            if let Some(value) = Self::fold_binop(quad.op, left, right) {
                *quad = Quad::new(TacOp::Assign, Some(value), None, quad.result.take());
                changed = true;
            }
        }

        changed
    }
}

// ==================== Constant Propagation ====================

/// Substitutes names defined exactly once by a literal ASSIGN
pub struct ConstantPropagation;

impl ConstantPropagation {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizationPass for ConstantPropagation {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn run(&mut self, code: &mut Vec<Quad>, _diagnostics: &mut Vec<OptimizeDiagnostic>) -> bool {
        let mut definitions: HashMap<String, usize> = HashMap::new();
        for name in code.iter().filter_map(Quad::defines) {
            *definitions.entry(name.to_string()).or_default() += 1;
        }

        let mut constants: HashMap<String, Operand> = HashMap::new();
        let mut changed = false;

        for quad in code.iter_mut() {
            for operand in quad.operands_mut() {
                let value = operand.as_name().and_then(|name| constants.get(name));
                if let Some(value) = value {
                    *operand = value.clone();
                    changed = true;
                }
            }

            if quad.op != TacOp::Assign {
                continue;
            }
            if let (Some(value), Some(dest)) = (&quad.arg1, &quad.result) {
                if value.is_literal() && definitions.get(dest) == Some(&1) {
                    constants.insert(dest.clone(), value.clone());
                }
            }
        }

        changed
    }
}

// ==================== Common Subexpression Elimination ====================

/// Reuses an earlier result for a repeated `(op, arg1, arg2)` within a block
pub struct CommonSubexpressionElimination;

type ExprKey = (TacOp, Operand, Operand);

impl CommonSubexpressionElimination {
    pub fn new() -> Self {
        Self
    }

    /// Drop every entry that reads `name` or is held in `name`
    fn invalidate(available: &mut HashMap<ExprKey, String>, name: &str) {
        available.retain(|(_, a, b), holder| {
            holder.as_str() != name && a.as_name() != Some(name) && b.as_name() != Some(name)
        });
    }
}

impl OptimizationPass for CommonSubexpressionElimination {
    fn name(&self) -> &'static str {
        "common-subexpression-elimination"
    }

    fn run(&mut self, code: &mut Vec<Quad>, _diagnostics: &mut Vec<OptimizeDiagnostic>) -> bool {
        let mut available: HashMap<ExprKey, String> = HashMap::new();
        let mut changed = false;

        for quad in code.iter_mut() {
            if quad.op == TacOp::Label {
                available.clear();
                continue;
            }

            let key = match (&quad.arg1, &quad.arg2) {
                (Some(a), Some(b)) if quad.op.is_arithmetic() => Some((quad.op, a.clone(), b.clone())),
                _ => None,
            };

            if let Some(holder) = key.as_ref().and_then(|k| available.get(k)) {
                *quad = Quad::new(
                    TacOp::Assign,
                    Some(Operand::Name(holder.clone())),
                    None,
                    quad.result.take(),
                );
                changed = true;
                if let Some(dest) = quad.defines() {
                    Self::invalidate(&mut available, dest);
                }
                continue;
            }

            let Some(dest) = quad.defines() else {
                continue;
            };
            Self::invalidate(&mut available, dest);

            if let Some(key) = key {
                let reads_dest = key.1.as_name() == Some(dest) || key.2.as_name() == Some(dest);
                if !reads_dest {
                    available.insert(key, dest.to_string());
                }
            }
        }

        changed
    }
}

// ==================== Strength Reduction ====================

/// Rewrites `MUL x, 2` as `ADD x, x`
pub struct StrengthReduction;

impl StrengthReduction {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizationPass for StrengthReduction {
    fn name(&self) -> &'static str {
        "strength-reduction"
    }

    fn run(&mut self, code: &mut Vec<Quad>, _diagnostics: &mut Vec<OptimizeDiagnostic>) -> bool {
        let mut changed = false;
        for quad in code.iter_mut() {
            let by_two = matches!(quad.arg2, Some(Operand::Int(2)))
                || matches!(quad.arg2, Some(Operand::Float(x)) if x == 2.0);
            if quad.op == TacOp::Mul && by_two {
                quad.op = TacOp::Add;
                quad.arg2 = quad.arg1.clone();
                changed = true;
            }
        }
        changed
    }
}

// ==================== Dead Code Elimination ====================

/// Removes temporaries whose value is never read
pub struct DeadCodeElimination {
    temps: HashSet<String>,
}

impl DeadCodeElimination {
    pub fn new(temps: HashSet<String>) -> Self {
        Self { temps }
    }
}

impl OptimizationPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&mut self, code: &mut Vec<Quad>, _diagnostics: &mut Vec<OptimizeDiagnostic>) -> bool {
        // program variables are live at exit
        let mut used: HashSet<String> = code
            .iter()
            .filter_map(Quad::defines)
            .filter(|name| !self.temps.contains(*name))
            .map(str::to_string)
            .collect();

        let mut keep = vec![false; code.len()];
        for (i, quad) in code.iter().enumerate().rev() {
            let live = quad.op.is_control()
                || quad.result.as_ref().map_or(false, |r| used.contains(r));
            if !live {
                continue;
            }
            keep[i] = true;
            if quad.op.is_control() {
                if let Some(label) = &quad.result {
                    used.insert(label.clone());
                }
            }
            for name in quad.operands().filter_map(Operand::as_name) {
                used.insert(name.to_string());
            }
        }

        let before = code.len();
        let mut flags = keep.into_iter();
        code.retain(|_| flags.next().unwrap_or(true));
        code.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(n: &str) -> Operand {
        Operand::name(n)
    }

    fn temps(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn run_pass(pass: &mut dyn OptimizationPass, code: Vec<Quad>) -> Vec<Quad> {
        let mut code = code;
        let mut diagnostics = Vec::new();
        pass.run(&mut code, &mut diagnostics);
        assert!(diagnostics.is_empty());
        code
    }

    #[test]
    fn test_scenario_reduces_to_single_assign() {
        let code = vec![
            Quad::binary(TacOp::Add, Operand::Int(2), Operand::Int(3), "t0"),
            Quad::assign(name("t0"), "x"),
        ];
        let result = Optimizer::new(&temps(&["t0"])).optimize(&code);
        assert_eq!(result.code, vec![Quad::assign(Operand::Int(5), "x")]);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_constant_folding() {
        let code = vec![
            Quad::binary(TacOp::Mul, Operand::Int(4), Operand::Int(5), "t0"),
            Quad::binary(TacOp::Sub, Operand::Float(1.5), Operand::Int(1), "t1"),
            Quad::binary(TacOp::Div, Operand::Int(7), Operand::Int(2), "t2"),
            Quad::binary(TacOp::Add, Operand::Int(i64::MAX), Operand::Int(1), "t3"),
            Quad::binary(TacOp::Add, name("x"), Operand::Int(1), "t4"),
        ];
        let folded = run_pass(&mut ConstantFolding::new(), code.clone());
        assert_eq!(
            folded,
            vec![
                Quad::assign(Operand::Int(20), "t0"),
                Quad::assign(Operand::Float(0.5), "t1"),
                Quad::assign(Operand::Float(3.5), "t2"),
                code[3].clone(),
                code[4].clone(),
            ]
        );
    }

    #[test]
    fn test_division_by_zero_is_reported() {
        let code = vec![
            Quad::binary(TacOp::Div, Operand::Int(1), Operand::Int(0), "t0"),
            Quad::assign(name("t0"), "x"),
        ];
        let result = Optimizer::new(&temps(&["t0"])).optimize(&code);
        assert_eq!(
            result.diagnostics,
            vec![OptimizeDiagnostic::DivisionByZero {
                index: 0,
                dividend: Operand::Int(1),
                divisor: Operand::Int(0),
                result: "t0".to_string(),
            }]
        );
        assert_eq!(result.code, code);
        assert_eq!(
            result.diagnostics[0].to_string(),
            "Division by zero at instruction 0: t0 = 1 / 0"
        );
    }

    #[test]
    fn test_propagation_requires_single_definition() {
        let code = vec![
            Quad::assign(Operand::Int(1), "a"),
            Quad::assign(Operand::Int(2), "b"),
            Quad::assign(Operand::Int(3), "b"),
            Quad::binary(TacOp::Add, name("a"), name("b"), "t0"),
        ];
        let result = run_pass(&mut ConstantPropagation::new(), code);
        assert_eq!(
            result[3],
            Quad::binary(TacOp::Add, Operand::Int(1), name("b"), "t0")
        );
    }

    #[test]
    fn test_propagation_chains_forward() {
        let code = vec![
            Quad::assign(Operand::Int(5), "t0"),
            Quad::assign(name("t0"), "x"),
            Quad::binary(TacOp::Mul, name("x"), name("y"), "t1"),
        ];
        let result = run_pass(&mut ConstantPropagation::new(), code);
        assert_eq!(result[1], Quad::assign(Operand::Int(5), "x"));
        assert_eq!(result[2], Quad::binary(TacOp::Mul, Operand::Int(5), name("y"), "t1"));
    }

    #[test]
    fn test_cse_reuses_result() {
        let code = vec![
            Quad::binary(TacOp::Add, name("a"), name("b"), "t0"),
            Quad::binary(TacOp::Add, name("a"), name("b"), "t1"),
        ];
        let result = run_pass(&mut CommonSubexpressionElimination::new(), code);
        assert_eq!(result[1], Quad::assign(name("t0"), "t1"));
    }

    #[test]
    fn test_cse_invalidated_by_redefinition() {
        let code = vec![
            Quad::binary(TacOp::Add, name("a"), name("b"), "t0"),
            Quad::assign(name("t0"), "a"),
            Quad::binary(TacOp::Add, name("a"), name("b"), "t1"),
            Quad::binary(TacOp::Add, name("x"), Operand::Int(1), "x"),
            Quad::binary(TacOp::Add, name("x"), Operand::Int(1), "t2"),
        ];
        let result = run_pass(&mut CommonSubexpressionElimination::new(), code.clone());
        assert_eq!(result, code);
    }

    #[test]
    fn test_cse_cleared_at_label() {
        let code = vec![
            Quad::binary(TacOp::Mul, name("i"), name("i"), "t0"),
            Quad::label("L0"),
            Quad::binary(TacOp::Mul, name("i"), name("i"), "t1"),
        ];
        let result = run_pass(&mut CommonSubexpressionElimination::new(), code.clone());
        assert_eq!(result, code);
    }

    #[test]
    fn test_strength_reduction() {
        let code = vec![
            Quad::binary(TacOp::Mul, name("x"), Operand::Int(2), "t0"),
            Quad::binary(TacOp::Mul, name("y"), Operand::Float(2.0), "t1"),
            Quad::binary(TacOp::Mul, Operand::Int(2), name("z"), "t2"),
        ];
        let result = run_pass(&mut StrengthReduction::new(), code.clone());
        assert_eq!(
            result,
            vec![
                Quad::binary(TacOp::Add, name("x"), name("x"), "t0"),
                Quad::binary(TacOp::Add, name("y"), name("y"), "t1"),
                code[2].clone(),
            ]
        );
    }

    #[test]
    fn test_dce_keeps_control_and_variables() {
        let code = vec![
            Quad::binary(TacOp::Add, name("a"), Operand::Int(1), "t0"),
            Quad::binary(TacOp::Mul, name("t0"), Operand::Int(3), "t1"),
            Quad::assign(Operand::Int(1), "i"),
            Quad::label("L0"),
            Quad::binary(TacOp::Lt, name("i"), Operand::Int(3), "t2"),
            Quad::if_false(name("t2"), "L1"),
            Quad::goto("L0"),
            Quad::label("L1"),
        ];
        let mut dce = DeadCodeElimination::new(temps(&["t0", "t1", "t2"]));
        let result = run_pass(&mut dce, code.clone());
        assert_eq!(result, code[2..].to_vec());
    }

    #[test]
    fn test_dce_keeps_variables_named_like_temps() {
        let code = vec![
            Quad::assign(Operand::Int(7), "t3"),
            Quad::binary(TacOp::Add, name("t3"), Operand::Int(1), "t4"),
            Quad::assign(Operand::Int(7), "a"),
        ];
        let mut dce = DeadCodeElimination::new(temps(&["t4"]));
        let result = run_pass(&mut dce, code.clone());
        assert_eq!(result, vec![code[0].clone(), code[2].clone()]);
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let code = vec![
            Quad::assign(Operand::Int(0), "i"),
            Quad::label("L0"),
            Quad::binary(TacOp::Lt, name("i"), Operand::Int(3), "t0"),
            Quad::if_false(name("t0"), "L2"),
            Quad::label("L1"),
            Quad::binary(TacOp::Mul, name("x"), Operand::Int(2), "t1"),
            Quad::assign(name("t1"), "x"),
            Quad::binary(TacOp::Add, name("i"), Operand::Int(1), "t2"),
            Quad::assign(name("t2"), "i"),
            Quad::goto("L0"),
            Quad::label("L2"),
        ];
        let mut optimizer = Optimizer::new(&temps(&["t0", "t1", "t2"]));
        let once = optimizer.optimize(&code).code;
        let twice = optimizer.optimize(&once).code;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_optimizer_is_identity() {
        let code = vec![Quad::binary(TacOp::Add, Operand::Int(1), Operand::Int(1), "t0")];
        assert_eq!(Optimizer::empty().optimize(&code).code, code);
    }
}
