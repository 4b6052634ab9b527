//! Three-address code definitions
//!
//! A program lowers to a flat sequence of quadruples
//! `{op, arg1, arg2, result}`. Control flow is expressed with `LABEL`,
//! `GOTO` and `IF_FALSE`, each of which names its label in `result`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::frontend::ast::{BinOp, RelOp};

/// TAC opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TacOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    /// String concatenation
    Concat,
    /// Unary minus
    Uminus,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    IfFalse,
    Goto,
    Label,
}

impl TacOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TacOp::Assign => "ASSIGN",
            TacOp::Add => "ADD",
            TacOp::Sub => "SUB",
            TacOp::Mul => "MUL",
            TacOp::Div => "DIV",
            TacOp::Concat => "CONCAT",
            TacOp::Uminus => "UMINUS",
            TacOp::Lt => "LT",
            TacOp::Gt => "GT",
            TacOp::Le => "LE",
            TacOp::Ge => "GE",
            TacOp::Eq => "EQ",
            TacOp::Ne => "NE",
            TacOp::IfFalse => "IF_FALSE",
            TacOp::Goto => "GOTO",
            TacOp::Label => "LABEL",
        }
    }

    /// ADD, SUB, MUL, DIV
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, TacOp::Add | TacOp::Sub | TacOp::Mul | TacOp::Div)
    }

    /// LABEL, GOTO, IF_FALSE
    pub fn is_control(&self) -> bool {
        matches!(self, TacOp::Label | TacOp::Goto | TacOp::IfFalse)
    }

    /// Infix symbol for binary opcodes
    pub fn symbol(&self) -> Option<&'static str> {
        Some(match self {
            TacOp::Add | TacOp::Concat => "+",
            TacOp::Sub => "-",
            TacOp::Mul => "*",
            TacOp::Div => "/",
            TacOp::Lt => "<",
            TacOp::Gt => ">",
            TacOp::Le => "<=",
            TacOp::Ge => ">=",
            TacOp::Eq => "==",
            TacOp::Ne => "!=",
            _ => return None,
        })
    }
}

impl From<BinOp> for TacOp {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Add => TacOp::Add,
            BinOp::Sub => TacOp::Sub,
            BinOp::Mul => TacOp::Mul,
            BinOp::Div => TacOp::Div,
        }
    }
}

impl From<RelOp> for TacOp {
    fn from(op: RelOp) -> Self {
        match op {
            RelOp::Lt => TacOp::Lt,
            RelOp::Gt => TacOp::Gt,
            RelOp::Le => TacOp::Le,
            RelOp::Ge => TacOp::Ge,
            RelOp::Eq => TacOp::Eq,
            RelOp::Ne => TacOp::Ne,
        }
    }
}

impl fmt::Display for TacOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== Operands ====================

/// Instruction operand
#[derive(Debug, Clone)]
pub enum Operand {
    /// Program variable or temporary
    Name(String),
    Int(i64),
    Float(f64),
    Char(char),
    Bool(bool),
    /// Label of an entry in the string table
    StringRef(String),
}

impl Operand {
    pub fn name(name: impl Into<String>) -> Self {
        Operand::Name(name.into())
    }

    /// Int, float, char or bool constant
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Operand::Int(_) | Operand::Float(_) | Operand::Char(_) | Operand::Bool(_)
        )
    }

    /// Int or float constant
    pub fn is_numeric(&self) -> bool {
        matches!(self, Operand::Int(_) | Operand::Float(_))
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_string_ref(&self) -> bool {
        matches!(self, Operand::StringRef(_))
    }
}

// Floats compare by bit pattern so operands can key hash maps.
impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::Name(a), Operand::Name(b)) => a == b,
            (Operand::Int(a), Operand::Int(b)) => a == b,
            (Operand::Float(a), Operand::Float(b)) => a.to_bits() == b.to_bits(),
            (Operand::Char(a), Operand::Char(b)) => a == b,
            (Operand::Bool(a), Operand::Bool(b)) => a == b,
            (Operand::StringRef(a), Operand::StringRef(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Operand {}

impl Hash for Operand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Operand::Name(s) | Operand::StringRef(s) => s.hash(state),
            Operand::Int(n) => n.hash(state),
            Operand::Float(f) => f.to_bits().hash(state),
            Operand::Char(c) => c.hash(state),
            Operand::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Name(name) | Operand::StringRef(name) => f.write_str(name),
            Operand::Int(n) => write!(f, "{}", n),
            Operand::Float(x) => write!(f, "{:?}", x),
            Operand::Char(c) => write!(f, "'{}'", c.escape_default()),
            Operand::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl Serialize for Operand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Operand::Int(n) => serializer.serialize_i64(*n),
            Operand::Float(x) => serializer.serialize_f64(*x),
            Operand::Bool(b) => serializer.serialize_bool(*b),
            _ => serializer.collect_str(self),
        }
    }
}

// ==================== Quadruples ====================

/// A single three-address instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quad {
    pub op: TacOp,
    pub arg1: Option<Operand>,
    pub arg2: Option<Operand>,
    /// Destination name, or the label for control instructions
    pub result: Option<String>,
}

impl Quad {
    pub fn new(
        op: TacOp,
        arg1: Option<Operand>,
        arg2: Option<Operand>,
        result: Option<String>,
    ) -> Self {
        Self { op, arg1, arg2, result }
    }

    pub fn assign(value: Operand, dest: impl Into<String>) -> Self {
        Self::new(TacOp::Assign, Some(value), None, Some(dest.into()))
    }

    pub fn binary(op: TacOp, left: Operand, right: Operand, dest: impl Into<String>) -> Self {
        Self::new(op, Some(left), Some(right), Some(dest.into()))
    }

    pub fn unary(op: TacOp, operand: Operand, dest: impl Into<String>) -> Self {
        Self::new(op, Some(operand), None, Some(dest.into()))
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self::new(TacOp::Label, None, None, Some(label.into()))
    }

    pub fn goto(label: impl Into<String>) -> Self {
        Self::new(TacOp::Goto, None, None, Some(label.into()))
    }

    pub fn if_false(cond: Operand, label: impl Into<String>) -> Self {
        Self::new(TacOp::IfFalse, Some(cond), None, Some(label.into()))
    }

    /// Present operands, in argument order
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.arg1.iter().chain(self.arg2.iter())
    }

    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.arg1.iter_mut().chain(self.arg2.iter_mut())
    }

    /// The name this instruction defines, if it defines one
    pub fn defines(&self) -> Option<&str> {
        if self.op.is_control() {
            None
        } else {
            self.result.as_deref()
        }
    }
}

// ==================== String Table ====================

/// String literals by first appearance, each with a stable `_strN` label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringTable {
    /// (text, label) in insertion order
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label for `text`, allocating the next one on first sight
    pub fn intern(&mut self, text: &str) -> String {
        if let Some(&i) = self.index.get(text) {
            return self.entries[i].1.clone();
        }
        let label = format!("_str{}", self.entries.len());
        self.index.insert(text.to_string(), self.entries.len());
        self.entries.push((text.to_string(), label.clone()));
        label
    }

    /// `(label, text)` pairs in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(text, label)| (label.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serialized as `text -> label`
impl Serialize for StringTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (text, label) in &self.entries {
            map.serialize_entry(text, label)?;
        }
        map.end()
    }
}

// ==================== Lowered Program ====================

/// Everything the generator produces for one program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TacProgram {
    pub code: Vec<Quad>,
    pub strings: StringTable,
    /// Names the generator introduced for intermediate values
    pub temps: HashSet<String>,
}
