//! TAC Printer - canonical text listing
//!
//! ```text
//! .code
//! 000:  t0 = 2 + 3
//! 001:  x = t0
//! .data
//! _str0: .asciiz "hello"
//! ```

use std::fmt::Write;

use crate::middle::ir::*;

/// Pretty printer for TAC
pub struct TacPrinter {
    output: String,
}

impl TacPrinter {
    pub fn new() -> Self {
        Self { output: String::new() }
    }

    /// Print a code listing followed by its string data
    pub fn print(&mut self, code: &[Quad], strings: &StringTable) -> String {
        self.output.clear();

        let _ = writeln!(self.output, ".code");
        for (i, quad) in code.iter().enumerate() {
            let _ = writeln!(self.output, "{:03}:  {}", i, format_quad(quad));
        }

        if !strings.is_empty() {
            let _ = writeln!(self.output, ".data");
            for (label, text) in strings.iter() {
                let _ = writeln!(self.output, "{}: .asciiz \"{}\"", label, text);
            }
        }

        std::mem::take(&mut self.output)
    }
}

impl Default for TacPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical one-line form of an instruction
pub fn format_quad(quad: &Quad) -> String {
    let arg = |a: &Option<Operand>| a.as_ref().map(ToString::to_string).unwrap_or_default();
    let (a1, a2) = (arg(&quad.arg1), arg(&quad.arg2));
    let result = quad.result.as_deref().unwrap_or_default();

    match quad.op {
        TacOp::Assign => format!("{} = {}", result, a1),
        TacOp::Uminus => format!("{} = - {}", result, a1),
        TacOp::IfFalse => format!("if_false {} goto {}", a1, result),
        TacOp::Goto => format!("goto {}", result),
        TacOp::Label => format!("{}:", result),
        op => match op.symbol() {
            Some(sym) => format!("{} = {} {} {}", result, a1, sym, a2),
            None => format!("{} {}, {}, {}", op, a1, a2, result),
        },
    }
}

/// Convenience function to print a TAC listing
pub fn print_tac(code: &[Quad], strings: &StringTable) -> String {
    TacPrinter::new().print(code, strings)
}
