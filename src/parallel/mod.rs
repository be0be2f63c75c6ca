//! Parallel analysis of independent methods
//!
//! Runs the analyses of every method of a module concurrently.

mod executor;

pub use executor::{analyze_method, analyze_module, MethodAnalysis, ParallelConfig, VpmEligibility};
