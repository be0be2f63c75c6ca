//! Parallel analysis driver
//!
//! Methods share nothing, so every method of a module is analyzed as its own Rayon task.

use crate::analysis::{
    ControlFlowGraph, ControlFlowLoop, DataDependencyGraph, InductionVariable, LoopInclusionTree,
};
use crate::compiler::ir::{InstrId, Instruction, LocalId, Method, Module, Position};
use crate::compiler::TargetConfig;
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Configuration for parallel execution
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Maximum number of parallel tasks (default: num_cpus)
    pub max_parallelism: usize,
    /// Fail fast on first error vs collect all results
    pub fail_fast: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            fail_fast: false,
        }
    }
}

/// VPM eligibility of one memory instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VpmEligibility {
    /// Source may be relocated into VPM
    pub source: bool,
    /// Destination may be relocated into VPM
    pub destination: bool,
}

/// Everything the loop and memory analyses found in one method
#[derive(Debug, Clone)]
pub struct MethodAnalysis {
    /// Name of the analyzed method
    pub method: String,
    /// Control flow graph with dominators
    pub cfg: ControlFlowGraph,
    /// Def/use edges
    pub dependencies: DataDependencyGraph,
    /// Natural loops
    pub loops: Vec<ControlFlowLoop>,
    /// Nesting of `loops`
    pub tree: LoopInclusionTree,
    /// Induction variables, per loop
    pub induction_variables: Vec<Vec<InductionVariable>>,
    /// Loop-invariant instructions, per loop
    pub invariants: Vec<BTreeSet<Position>>,
    /// Root allocations accessed by every memory instruction
    pub memory_areas: BTreeMap<InstrId, BTreeSet<LocalId>>,
    /// Lowering decision for every memory instruction
    pub vpm: BTreeMap<InstrId, VpmEligibility>,
}

/// Run all analyses on a single method
///
/// Fails if a memory instruction's addresses cannot be traced to memory.
pub fn analyze_method(method: &Method, target: &TargetConfig) -> Result<MethodAnalysis> {
    let cfg = ControlFlowGraph::build(method);
    let dependencies = DataDependencyGraph::build(method);
    let loops = cfg.find_loops();
    let tree = LoopInclusionTree::new(&loops);
    let induction_variables = loops
        .iter()
        .map(|lp| lp.find_induction_variables(method, &cfg, &dependencies, true))
        .collect();
    let invariants = loops
        .iter()
        .map(|lp| lp.find_loop_invariants(method, &cfg, &dependencies))
        .collect();

    let mut memory_areas = BTreeMap::new();
    let mut vpm = BTreeMap::new();
    for (_, block) in method.blocks() {
        for &id in block.instructions() {
            if let Some(Instruction::Memory(mem)) = method.instruction(id) {
                memory_areas.insert(id, mem.get_memory_areas(method)?);
                vpm.insert(
                    id,
                    VpmEligibility {
                        source: mem.can_move_source_into_vpm(method, target)?,
                        destination: mem.can_move_destination_into_vpm(method, target)?,
                    },
                );
            }
        }
    }

    Ok(MethodAnalysis {
        method: method.name.clone(),
        cfg,
        dependencies,
        loops,
        tree,
        induction_variables,
        invariants,
        memory_areas,
        vpm,
    })
}

/// Analyze all methods of a module in parallel
///
/// # Returns
/// * `Ok(results)` - One result per method, in method order
/// * `Err(Error)` - First failing method (if fail_fast=true) or thread pool failure
///
/// # Example
/// ```ignore
/// let results = analyze_module(&module, &TargetConfig::default(), ParallelConfig::default())?;
/// ```
pub fn analyze_module(
    module: &Module,
    target: &TargetConfig,
    config: ParallelConfig,
) -> Result<Vec<Result<MethodAnalysis>>> {
    // Empty module fast path
    if module.methods.is_empty() {
        return Ok(Vec::new());
    }

    // Single method - no parallelism needed
    if module.methods.len() == 1 {
        let result = analyze_method(&module.methods[0], target);
        return match result {
            Err(e) if config.fail_fast => Err(e),
            other => Ok(vec![other]),
        };
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_parallelism.clamp(1, module.methods.len()))
        .build()
        .map_err(|e| Error::Parallel(format!("Failed to create thread pool: {}", e)))?;

    tracing::debug!(
        "Analyzing {} methods on {} threads",
        module.methods.len(),
        pool.current_num_threads()
    );

    pool.install(|| {
        if config.fail_fast {
            module
                .methods
                .par_iter()
                .map(|method| analyze_method(method, target))
                .collect::<Result<Vec<MethodAnalysis>>>()
                .map(|results| results.into_iter().map(Ok).collect())
        } else {
            Ok(module
                .methods
                .par_iter()
                .map(|method| analyze_method(method, target))
                .collect())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{
        AddressSpace, Branch, DataType, MemoryInstruction, MemoryOperation, OpCode, Operation,
        Value,
    };

    fn looping_method(name: &str) -> Method {
        let mut method = Method::new(name);
        let entry = method.add_block("entry");
        let body = method.add_block("body");
        let i = method.add_local("i", DataType::i32());
        let c = method.add_local("c", DataType::Bool);
        method.append(
            entry,
            Instruction::Move(crate::compiler::ir::MoveOperation {
                output: i.clone(),
                source: Value::literal(0, DataType::i32()),
            }),
        );
        method.append(
            body,
            Instruction::Operation(Operation::binary(
                OpCode::Add,
                i.clone(),
                i.clone(),
                Value::literal(1, DataType::i32()),
            )),
        );
        method.append(
            body,
            Instruction::Operation(Operation::binary(
                OpCode::Lt,
                c.clone(),
                i,
                Value::literal(4, DataType::i32()),
            )),
        );
        method.append(body, Instruction::Branch(Branch::if_true(body, c)));
        method
    }

    /// Loads through a register nothing writes
    fn broken_method() -> Method {
        let mut method = Method::new("broken");
        let entry = method.add_block("entry");
        let p = method.add_local("p", DataType::pointer_to(DataType::i32(), AddressSpace::Global));
        let v = method.add_local("v", DataType::i32());
        let read = MemoryInstruction::new(
            MemoryOperation::Read,
            v,
            p,
            Value::literal(1, DataType::i32()),
        )
        .unwrap();
        method.append(entry, Instruction::Memory(read));
        method
    }

    #[test]
    fn test_analyze_method() {
        let method = looping_method("k");
        let analysis = analyze_method(&method, &TargetConfig::default()).unwrap();
        assert_eq!(analysis.loops.len(), 1);
        assert_eq!(analysis.induction_variables[0].len(), 1);
        assert_eq!(analysis.induction_variables[0][0].get_iteration_count(), Some(4));
        assert!(analysis.vpm.is_empty());
    }

    #[test]
    fn test_analyze_method_records_memory_areas() {
        let mut method = Method::new("copy_row");
        let entry = method.add_block("entry");
        let table = method.add_global(
            "table",
            DataType::i32().to_array_type(4),
            true,
            AddressSpace::Constant,
        );
        let v = method.add_local("v", DataType::i32());
        let read = MemoryInstruction::new(
            MemoryOperation::Read,
            v,
            table.clone(),
            Value::literal(1, DataType::i32()),
        )
        .unwrap();
        let id = method.append(entry, Instruction::Memory(read));

        let analysis = analyze_method(&method, &TargetConfig::default()).unwrap();
        let areas: BTreeSet<_> = [table.check_local().unwrap()].into_iter().collect();
        assert_eq!(analysis.memory_areas[&id], areas);
        assert!(analysis.vpm[&id].source);
        assert!(!analysis.vpm[&id].destination);
    }

    #[test]
    fn test_analyze_module_keeps_order() {
        let mut module = Module::new();
        for i in 0..8 {
            module.methods.push(looping_method(&format!("k{}", i)));
        }
        let results =
            analyze_module(&module, &TargetConfig::default(), ParallelConfig::default()).unwrap();
        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap().method, format!("k{}", i));
        }
    }

    #[test]
    fn test_analyze_module_empty() {
        let results =
            analyze_module(&Module::new(), &TargetConfig::default(), ParallelConfig::default())
                .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_analyze_module_error_fail_fast() {
        let mut module = Module::new();
        module.methods.push(looping_method("ok"));
        module.methods.push(broken_method());

        let config = ParallelConfig {
            fail_fast: true,
            ..Default::default()
        };
        let result = analyze_module(&module, &TargetConfig::default(), config);
        assert!(matches!(result, Err(Error::Provenance { .. })));
    }

    #[test]
    fn test_analyze_module_error_collect_all() {
        let mut module = Module::new();
        module.methods.push(looping_method("ok"));
        module.methods.push(broken_method());
        module.methods.push(looping_method("also ok"));

        let results =
            analyze_module(&module, &TargetConfig::default(), ParallelConfig::default()).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
