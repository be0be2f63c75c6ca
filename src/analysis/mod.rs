//! # Analyses
//!
//! Read-only analyses over a [`Method`](crate::compiler::ir::Method): its control flow graph with
//! dominators, the natural loops it contains, their nesting, induction variables and
//! loop-invariant instructions.
//!
//! ## Module Structure
//!
//! ```text
//! analysis/
//! ├── mod.rs             # This file - module definition and re-exports
//! ├── cfg.rs             # ControlFlowGraph, dominators, loop discovery
//! ├── dependency.rs      # DataDependencyGraph (def/use per local)
//! ├── loops.rs           # ControlFlowLoop and its queries
//! ├── induction.rs       # InductionVariable extraction and bounds
//! ├── inclusion_tree.rs  # LoopInclusionTree (nesting forest)
//! └── debug_graph.rs     # Graphviz output
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let cfg = ControlFlowGraph::build(&method);
//! let deps = DataDependencyGraph::build(&method);
//! for lp in cfg.find_loops() {
//!     for var in lp.find_induction_variables(&method, &cfg, &deps, true) {
//!         println!("{:?}", var.get_iteration_count());
//!     }
//! }
//! ```
//!
//! All results are snapshots; rebuild them after mutating the method.

pub mod cfg;
pub mod debug_graph;
pub mod dependency;
pub mod inclusion_tree;
pub mod induction;
pub mod loops;

pub use cfg::{CfgEdge, CfgRelation, ControlFlowGraph, EdgeId};
pub use dependency::{Access, DataDependencyGraph};
pub use inclusion_tree::LoopInclusionTree;
pub use induction::{InductionVariable, RepeatCondition};
pub use loops::ControlFlowLoop;
