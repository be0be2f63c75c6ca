//! # qpu-ir - Loop and Memory Analyses for a QPU Kernel Compiler
//!
//! The analysis core of the middle-end of an OpenCL C compiler targeting the VideoCore IV QPUs.
//! Kernels are held in a non-SSA, register-based IR; this crate finds the loops of a kernel and
//! decides which memory accesses may be served from the VPM, the small on-chip scratch memory.
//!
//! ## Features
//!
//! - **Control flow**: CFG construction with dominators and natural loop discovery
//! - **Loops**: headers, tails, entry and exit blocks, nesting forest, invariant instructions
//! - **Induction variables**: bounds, step and static iteration counts
//! - **Memory model**: pointer provenance through moves and pointer arithmetic
//! - **VPM lowering**: eligibility of memory accesses for a configurable target
//!
//! ## Quick Start
//!
//! ```rust
//! use qpu_ir::analysis::{ControlFlowGraph, DataDependencyGraph};
//! use qpu_ir::compiler::ir::{Branch, DataType, Instruction, Method, MoveOperation, OpCode, Operation, Value};
//!
//! let mut method = Method::new("kernel");
//! let entry = method.add_block("entry");
//! let body = method.add_block("body");
//! let i = method.add_local("i", DataType::i32());
//! let c = method.add_local("c", DataType::Bool);
//!
//! // i = 0; do { i = i + 1; } while (i < 10);
//! method.append(entry, Instruction::Move(MoveOperation {
//!     output: i.clone(),
//!     source: Value::literal(0, DataType::i32()),
//! }));
//! method.append(body, Instruction::Operation(Operation::binary(
//!     OpCode::Add, i.clone(), i.clone(), Value::literal(1, DataType::i32()),
//! )));
//! method.append(body, Instruction::Operation(Operation::binary(
//!     OpCode::Lt, c.clone(), i.clone(), Value::literal(10, DataType::i32()),
//! )));
//! method.append(body, Instruction::Branch(Branch::if_true(body, c)));
//!
//! let cfg = ControlFlowGraph::build(&method);
//! let deps = DataDependencyGraph::build(&method);
//! let loops = cfg.find_loops();
//! assert_eq!(loops.len(), 1);
//!
//! let vars = loops[0].find_induction_variables(&method, &cfg, &deps, true);
//! assert_eq!(vars[0].get_iteration_count(), Some(10));
//! ```
//!
//! ## Architecture
//!
//! ### Main Components
//!
//! 1. **IR** ([`compiler::ir`]) - Types, values, locals, instructions, methods
//! 2. **Memory model** ([`compiler::ir::memory_model`]) - Provenance and access classification
//! 3. **VPM** ([`compiler::vpm`]) - Lowering eligibility against a [`compiler::TargetConfig`]
//! 4. **Analyses** ([`analysis`]) - CFG, loops, induction variables, nesting
//! 5. **Driver** ([`parallel`]) - Per-method analysis of a whole module on a Rayon pool
//!
//! ## Error Handling
//!
//! Contract violations are reported as [`Error`], tagged with the compilation step raising them.
//! Loops without a unique header or tail are not errors; the affected queries return `None`.

// Module declarations
/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analysis;
pub mod compiler;
pub mod error;
pub mod parallel;

// Re-export main types
pub use analysis::{ControlFlowGraph, ControlFlowLoop, InductionVariable, LoopInclusionTree};
pub use compiler::ir::{Method, Module};
pub use compiler::TargetConfig;
pub use error::{CompilationStep, Error, Result};
pub use parallel::{analyze_method, analyze_module, MethodAnalysis, ParallelConfig};
