//! Type System for tacc

use std::fmt;

use serde::Serialize;

/// Declarable value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Int,
    Float,
    Double,
    String,
    Char,
    Bool,
}

impl PrimitiveType {
    /// All declarable types, in keyword order
    pub const ALL: [PrimitiveType; 6] = [
        Self::Int,
        Self::Float,
        Self::String,
        Self::Double,
        Self::Char,
        Self::Bool,
    ];

    /// Map a type keyword to its type
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "string" => Some(Self::String),
            "char" => Some(Self::Char),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Char => "char",
            Self::Bool => "bool",
        }
    }

    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Double)
    }

    /// Check if this is a floating-point type
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Whether a value of type `source` may be stored in a variable of this type.
    /// Floating targets widen from any numeric source.
    pub fn accepts(&self, source: PrimitiveType) -> bool {
        *self == source || (self.is_float() && source.is_numeric())
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Resolved type of an expression (after type checking)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedType {
    Primitive(PrimitiveType),
    /// Type could not be determined; suppresses further checks
    Unknown,
}

impl ResolvedType {
    pub const INT: Self = Self::Primitive(PrimitiveType::Int);
    pub const FLOAT: Self = Self::Primitive(PrimitiveType::Float);
    pub const DOUBLE: Self = Self::Primitive(PrimitiveType::Double);
    pub const STRING: Self = Self::Primitive(PrimitiveType::String);
    pub const CHAR: Self = Self::Primitive(PrimitiveType::Char);
    pub const BOOL: Self = Self::Primitive(PrimitiveType::Bool);

    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive(p) => Some(*p),
            Self::Unknown => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive().map_or(false, |p| p.is_numeric())
    }

    /// Result type of `+ - *` on two numeric operands
    pub fn arithmetic(left: PrimitiveType, right: PrimitiveType) -> Self {
        if left == PrimitiveType::Double || right == PrimitiveType::Double {
            Self::DOUBLE
        } else if left == PrimitiveType::Float || right == PrimitiveType::Float {
            Self::FLOAT
        } else {
            Self::INT
        }
    }

    /// Result type of `/` on two numeric operands (true division)
    pub fn division(left: PrimitiveType, right: PrimitiveType) -> Self {
        if left.is_float() || right.is_float() {
            Self::DOUBLE
        } else {
            Self::FLOAT
        }
    }
}

impl From<PrimitiveType> for ResolvedType {
    fn from(p: PrimitiveType) -> Self {
        Self::Primitive(p)
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening() {
        assert!(PrimitiveType::Double.accepts(PrimitiveType::Int));
        assert!(PrimitiveType::Float.accepts(PrimitiveType::Double));
        assert!(!PrimitiveType::Int.accepts(PrimitiveType::Float));
        assert!(!PrimitiveType::Char.accepts(PrimitiveType::String));
        assert!(PrimitiveType::Bool.accepts(PrimitiveType::Bool));
    }

    #[test]
    fn test_arithmetic_result() {
        use PrimitiveType::*;
        assert_eq!(ResolvedType::arithmetic(Int, Int), ResolvedType::INT);
        assert_eq!(ResolvedType::arithmetic(Int, Float), ResolvedType::FLOAT);
        assert_eq!(ResolvedType::arithmetic(Float, Double), ResolvedType::DOUBLE);
        assert_eq!(ResolvedType::division(Int, Int), ResolvedType::FLOAT);
        assert_eq!(ResolvedType::division(Int, Float), ResolvedType::DOUBLE);
    }

    #[test]
    fn test_keywords_round_trip() {
        for ty in PrimitiveType::ALL {
            assert_eq!(PrimitiveType::from_keyword(ty.keyword()), Some(ty));
        }
        assert_eq!(PrimitiveType::from_keyword("for"), None);
    }
}
