//! Data types of IR values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address space a pointer refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressSpace {
    /// Per work-item memory (stack)
    Private,
    /// Device memory, persistent across work-group invocations
    Global,
    /// Read-only device memory
    Constant,
    /// Memory shared by the work-items of one work-group
    Local,
    /// Unknown address space
    Generic,
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressSpace::Private => "__private",
            AddressSpace::Global => "__global",
            AddressSpace::Constant => "__constant",
            AddressSpace::Local => "__local",
            AddressSpace::Generic => "__generic",
        };
        f.write_str(name)
    }
}

/// A named struct field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    /// The name of the field
    pub name: String,
    /// The type of the field
    pub ty: DataType,
}

/// Type of an IR value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean (condition) value
    Bool,
    /// Integer of the given bit width
    Int {
        /// Width in bits (8, 16, 32 or 64)
        bits: u8,
    },
    /// Floating-point value of the given bit width
    Float {
        /// Width in bits (16 or 32)
        bits: u8,
    },
    /// SIMD vector of a scalar type
    Vector {
        /// Scalar element type
        elem: Box<DataType>,
        /// Number of elements (2, 3, 4, 8 or 16)
        width: u8,
    },
    /// Pointer into the given address space
    Pointer {
        /// Pointed-to type
        elem: Box<DataType>,
        /// Address space of the pointed-to memory
        address_space: AddressSpace,
    },
    /// Fixed-size array
    Array {
        /// Type of each element
        elem: Box<DataType>,
        /// Number of elements
        size: u32,
    },
    /// Aggregate with named fields
    Struct {
        /// Name of the struct
        name: String,
        /// Fields in declaration order
        fields: Vec<StructField>,
    },
    /// Basic block label
    Label,
    /// No value
    Void,
}

impl DataType {
    /// 8-bit integer
    pub fn i8() -> Self {
        DataType::Int { bits: 8 }
    }

    /// 16-bit integer
    pub fn i16() -> Self {
        DataType::Int { bits: 16 }
    }

    /// 32-bit integer
    pub fn i32() -> Self {
        DataType::Int { bits: 32 }
    }

    /// 32-bit float
    pub fn f32() -> Self {
        DataType::Float { bits: 32 }
    }

    /// Pointer to `elem` in the given address space
    pub fn pointer_to(elem: DataType, address_space: AddressSpace) -> Self {
        DataType::Pointer {
            elem: Box::new(elem),
            address_space,
        }
    }

    /// Array of `size` elements of this type
    pub fn to_array_type(&self, size: u32) -> Self {
        DataType::Array {
            elem: Box::new(self.clone()),
            size,
        }
    }

    /// Vector of `width` elements of this type's scalar type
    pub fn to_vector_type(&self, width: u8) -> Self {
        let scalar = match self {
            DataType::Vector { elem, .. } => elem.as_ref().clone(),
            other => other.clone(),
        };
        DataType::Vector {
            elem: Box::new(scalar),
            width,
        }
    }

    /// Pointed-to type for pointers, element type for arrays and vectors, the type itself otherwise
    pub fn element_type(&self) -> DataType {
        match self {
            DataType::Pointer { elem, .. }
            | DataType::Array { elem, .. }
            | DataType::Vector { elem, .. } => elem.as_ref().clone(),
            other => other.clone(),
        }
    }

    /// Address space of a pointer type
    pub fn pointer_type(&self) -> Option<AddressSpace> {
        match self {
            DataType::Pointer { address_space, .. } => Some(*address_space),
            _ => None,
        }
    }

    /// Returns true for pointer types
    pub fn is_pointer(&self) -> bool {
        matches!(self, DataType::Pointer { .. })
    }

    /// Returns true for array types
    pub fn is_array(&self) -> bool {
        matches!(self, DataType::Array { .. })
    }

    /// Returns true for struct types
    pub fn is_struct(&self) -> bool {
        matches!(self, DataType::Struct { .. })
    }

    /// Returns true for scalar (bool, integer, float) types
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            DataType::Bool | DataType::Int { .. } | DataType::Float { .. }
        )
    }

    /// Number of SIMD elements (1 for scalars)
    pub fn vector_width(&self) -> u8 {
        match self {
            DataType::Vector { width, .. } => *width,
            _ => 1,
        }
    }

    /// Size in bytes this type occupies in memory
    ///
    /// 3-element vectors are aligned like 4-element vectors. Pointers are 32 bit wide. Sizes too
    /// large to represent saturate at `u64::MAX`.
    pub fn physical_width(&self) -> u64 {
        match self {
            DataType::Bool => 1,
            DataType::Int { bits } | DataType::Float { bits } => (u64::from(*bits) + 7) / 8,
            DataType::Vector { elem, width } => {
                let width = if *width == 3 { 4 } else { u64::from(*width) };
                elem.physical_width().saturating_mul(width)
            }
            DataType::Pointer { .. } => 4,
            DataType::Array { elem, size } => elem.physical_width().saturating_mul(u64::from(*size)),
            DataType::Struct { fields, .. } => fields
                .iter()
                .fold(0u64, |acc, f| acc.saturating_add(f.ty.physical_width())),
            DataType::Label | DataType::Void => 0,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "bool"),
            DataType::Int { bits } => write!(f, "i{}", bits),
            DataType::Float { bits } => write!(f, "f{}", bits),
            DataType::Vector { elem, width } => write!(f, "{}{}", elem, width),
            DataType::Pointer {
                elem,
                address_space,
            } => write!(f, "({}) {}*", address_space, elem),
            DataType::Array { elem, size } => write!(f, "{}[{}]", elem, size),
            DataType::Struct { name, .. } => write!(f, "%{}", name),
            DataType::Label => write!(f, "label"),
            DataType::Void => write!(f, "void"),
        }
    }
}
