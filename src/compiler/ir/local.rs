//! Locals: virtual registers and memory-resident objects

use super::instruction::InstrId;
use super::types::{AddressSpace, DataType};
use std::collections::BTreeSet;

/// Stable index of a local within its method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// Kind of storage a local names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalKind {
    /// Plain virtual register
    Register,
    /// Kernel parameter supplied by the host
    Parameter {
        /// Address space of the pointed-to memory (for pointer parameters)
        address_space: Option<AddressSpace>,
    },
    /// Module-scope memory object
    Global {
        /// Whether the contents never change
        is_constant: bool,
        /// Address space the object lives in
        address_space: AddressSpace,
    },
    /// Per work-item stack object
    StackAllocation {
        /// Size in bytes
        size: u64,
        /// Alignment in bytes
        alignment: u32,
    },
}

/// Named storage location
///
/// Globals and stack allocations are pointer-typed: the local is the address of the object and
/// `ty.element_type()` is the type of the object itself.
#[derive(Debug, Clone)]
pub struct Local {
    /// Unique name within the method
    pub name: String,
    /// Type of the local
    pub ty: DataType,
    /// Storage kind
    pub kind: LocalKind,
    /// Instructions writing this local
    pub(crate) writers: BTreeSet<InstrId>,
    /// Instructions reading this local
    pub(crate) users: BTreeSet<InstrId>,
}

impl Local {
    pub(crate) fn new(name: impl Into<String>, ty: DataType, kind: LocalKind) -> Self {
        Local {
            name: name.into(),
            ty,
            kind,
            writers: BTreeSet::new(),
            users: BTreeSet::new(),
        }
    }

    /// Instructions writing this local
    pub fn writers(&self) -> &BTreeSet<InstrId> {
        &self.writers
    }

    /// Instructions reading this local
    pub fn users(&self) -> &BTreeSet<InstrId> {
        &self.users
    }

    /// Returns true for globals and stack allocations
    pub fn resides_in_memory(&self) -> bool {
        matches!(
            self.kind,
            LocalKind::Global { .. } | LocalKind::StackAllocation { .. }
        )
    }

    /// Returns true for kernel parameters
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, LocalKind::Parameter { .. })
    }

    /// Returns true for globals
    pub fn is_global(&self) -> bool {
        matches!(self.kind, LocalKind::Global { .. })
    }

    /// Returns true for constant globals
    pub fn is_constant_global(&self) -> bool {
        matches!(
            self.kind,
            LocalKind::Global {
                is_constant: true,
                ..
            }
        )
    }

    /// Returns true for stack allocations
    pub fn is_stack_allocation(&self) -> bool {
        matches!(self.kind, LocalKind::StackAllocation { .. })
    }

    /// Returns true for globals living in the work-group shared address space
    pub fn is_local_memory_global(&self) -> bool {
        matches!(
            self.kind,
            LocalKind::Global {
                address_space: AddressSpace::Local,
                ..
            }
        ) || (self.is_global() && self.ty.pointer_type() == Some(AddressSpace::Local))
    }
}
