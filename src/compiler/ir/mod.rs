//! # Intermediate Representation (IR)
//!
//! Kernels arrive here as a control flow graph of typed virtual-register instructions, built by
//! the front-end. The analyses only read this representation; passes that transform it use the
//! mutation API of [`Method`], which keeps the writer/user sets of locals consistent.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs           # This file - module definition and re-exports
//! ├── types.rs         # DataType, AddressSpace
//! ├── value.rs         # Literal, Value
//! ├── local.rs         # Local, LocalKind (registers, parameters, globals, stack)
//! ├── instruction.rs   # Instruction enum, Operation, MoveOperation, MemoryInstruction, Branch
//! ├── program.rs       # BasicBlock, Method (arenas), Module
//! └── memory_model.rs  # Pointer provenance and memory access classification
//! ```
//!
//! ## Memory Model
//!
//! Globals and stack allocations are pointer-typed locals naming a memory object. Any other
//! pointer must be traced back to such an object (its *base*) through moves and
//! pointer-plus-offset arithmetic; see [`memory_model::is_derived_from_memory`].

mod instruction;
mod local;
pub mod memory_model;
mod program;
mod types;
mod value;

pub use instruction::{
    BlockId, Branch, InstrId, Instruction, MemoryInstruction, MemoryOperation, MoveOperation,
    OpCode, Operation,
};
pub use local::{Local, LocalId, LocalKind};
pub use memory_model::{
    check_local_value, check_memory_location, check_single_value, is_derived_from_memory,
    ProvenanceCache,
};
pub use program::{BasicBlock, Method, Module, Position};
pub use types::{AddressSpace, DataType, StructField};
pub use value::{Literal, Value, ValueKind};
