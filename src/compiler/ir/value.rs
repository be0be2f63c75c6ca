//! IR values: literal constants and references to locals

use super::local::LocalId;
use super::types::DataType;
use std::fmt;

/// Compile-time constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal(pub i64);

impl Literal {
    /// Value as a signed integer
    pub fn signed_int(&self) -> i64 {
        self.0
    }

    /// Value as an unsigned integer, `None` if negative or too large
    pub fn unsigned_int(&self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a value refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Literal constant
    Literal(Literal),
    /// Named storage location
    Local(LocalId),
    /// Undefined value
    Undefined,
}

/// Typed operand of an instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    /// Constant or local
    pub kind: ValueKind,
    /// Type of the value
    pub ty: DataType,
}

impl Value {
    /// Literal constant of the given type
    pub fn literal(value: i64, ty: DataType) -> Self {
        Value {
            kind: ValueKind::Literal(Literal(value)),
            ty,
        }
    }

    /// Reference to a local
    pub fn local(id: LocalId, ty: DataType) -> Self {
        Value {
            kind: ValueKind::Local(id),
            ty,
        }
    }

    /// Undefined value of the given type
    pub fn undefined(ty: DataType) -> Self {
        Value {
            kind: ValueKind::Undefined,
            ty,
        }
    }

    /// The referenced local, if any
    pub fn check_local(&self) -> Option<LocalId> {
        match self.kind {
            ValueKind::Local(id) => Some(id),
            _ => None,
        }
    }

    /// The literal constant, if any
    pub fn literal_value(&self) -> Option<Literal> {
        match self.kind {
            ValueKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Returns true for literal constants
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ValueKind::Literal(_))
    }

    /// Returns true if this is the literal one
    pub fn is_literal_one(&self) -> bool {
        self.literal_value() == Some(Literal(1))
    }
}
