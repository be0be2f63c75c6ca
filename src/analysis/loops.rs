//! # Natural loops
//!
//! A [`ControlFlowLoop`] is the set of blocks of one natural loop together with the back edge
//! closing it. Loops are discovered by [`ControlFlowGraph::find_loops`] and borrow nothing from the
//! graph; queries that need the graph take it as an argument.

use super::cfg::{ControlFlowGraph, EdgeId};
use super::dependency::DataDependencyGraph;
use super::induction::{self, InductionVariable};
use crate::compiler::ir::{BlockId, InstrId, Method, Position, Value};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Natural loop: the target of its back edge (the header) and every block reaching the source of
/// the back edge (the tail) without passing through the header
///
/// Two loops are equal when they contain the same blocks and are closed by the same back edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowLoop {
    back_edge: EdgeId,
    nodes: BTreeSet<BlockId>,
}

impl ControlFlowLoop {
    pub(crate) fn new(back_edge: EdgeId, nodes: BTreeSet<BlockId>) -> Self {
        ControlFlowLoop { back_edge, nodes }
    }

    /// Edge from the tail back to the header
    pub fn back_edge(&self) -> EdgeId {
        self.back_edge
    }

    /// Blocks of this loop
    pub fn nodes(&self) -> &BTreeSet<BlockId> {
        &self.nodes
    }

    /// Whether `block` is part of this loop
    pub fn contains(&self, block: BlockId) -> bool {
        self.nodes.contains(&block)
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the loop has no blocks
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reachable blocks outside the loop with an edge into it
    pub fn find_predecessors(&self, cfg: &ControlFlowGraph) -> BTreeSet<BlockId> {
        self.nodes
            .iter()
            .flat_map(|&node| cfg.predecessors(node))
            .filter(|pred| cfg.is_reachable(*pred) && !self.contains(*pred))
            .collect()
    }

    /// The single block entering this loop, `None` if there are zero or several
    pub fn find_predecessor(&self, cfg: &ControlFlowGraph) -> Option<BlockId> {
        single(self.find_predecessors(cfg))
    }

    /// Blocks outside the loop with an edge from it
    pub fn find_successors(&self, cfg: &ControlFlowGraph) -> BTreeSet<BlockId> {
        self.nodes
            .iter()
            .flat_map(|&node| cfg.successors(node))
            .filter(|succ| !self.contains(*succ))
            .collect()
    }

    /// The single block this loop exits to, `None` if there are zero or several
    pub fn find_successor(&self, cfg: &ControlFlowGraph) -> Option<BlockId> {
        single(self.find_successors(cfg))
    }

    /// Block control enters the loop through
    ///
    /// This is the unique block with a predecessor outside the loop; the method's entry block counts
    /// as entered from outside. If several blocks qualify the loop has no header.
    pub fn get_header(&self, cfg: &ControlFlowGraph) -> Option<BlockId> {
        let entered: Vec<BlockId> = self
            .nodes
            .iter()
            .copied()
            .filter(|&node| {
                node == cfg.entry()
                    || cfg
                        .predecessors(node)
                        .any(|pred| cfg.is_reachable(pred) && !self.contains(pred))
            })
            .collect();
        match entered.as_slice() {
            [header] => Some(*header),
            [] => None,
            _ => {
                tracing::warn!("Loop has {} entry blocks, no unique header", entered.len());
                None
            }
        }
    }

    /// Block jumping back to the header
    pub fn get_tail(&self, cfg: &ControlFlowGraph) -> Option<BlockId> {
        let edge = cfg.edge(self.back_edge);
        if self.contains(edge.from) && self.get_header(cfg) == Some(edge.to) {
            Some(edge.from)
        } else {
            None
        }
    }

    /// Whether `other` lies strictly inside this loop
    pub fn includes(&self, other: &ControlFlowLoop) -> bool {
        self.nodes.len() > other.nodes.len() && other.nodes.is_subset(&self.nodes)
    }

    /// Position of the instruction if it lies inside this loop
    pub fn find_in_loop(&self, method: &Method, instr: InstrId) -> Option<Position> {
        let block = method.block_of(instr)?;
        if self.contains(block) {
            method.position_of(instr)
        } else {
            None
        }
    }

    /// Whether this loop is the compiler-inserted loop over the work-items of a work-group
    pub fn is_work_group_loop(&self, cfg: &ControlFlowGraph) -> bool {
        cfg.edge(self.back_edge).relation.is_work_group_loop
    }

    /// Induction variables of this loop, see [`induction::find_induction_variables`]
    pub fn find_induction_variables(
        &self,
        method: &Method,
        cfg: &ControlFlowGraph,
        dependencies: &DataDependencyGraph,
        include_iteration_information: bool,
    ) -> Vec<InductionVariable> {
        induction::find_induction_variables(
            self,
            method,
            cfg,
            dependencies,
            include_iteration_information,
        )
    }

    /// Instructions inside the loop that compute the same value in every iteration
    ///
    /// An instruction is invariant if it has no side effects and every local it reads is either
    /// written outside the loop only, or written exactly once by an invariant instruction that
    /// dominates the read. Literals are invariant. Readers of a newly found invariant are revisited
    /// until nothing changes.
    pub fn find_loop_invariants(
        &self,
        method: &Method,
        cfg: &ControlFlowGraph,
        dependencies: &DataDependencyGraph,
    ) -> BTreeSet<Position> {
        let mut worklist: VecDeque<(Position, InstrId)> = self
            .nodes
            .iter()
            .flat_map(|&block| {
                method
                    .block(block)
                    .instructions()
                    .iter()
                    .enumerate()
                    .map(move |(index, &id)| (Position { block, index }, id))
            })
            .collect();

        let mut invariant: HashSet<InstrId> = HashSet::new();
        let mut result = BTreeSet::new();
        while let Some((pos, id)) = worklist.pop_front() {
            if invariant.contains(&id) {
                continue;
            }
            let Some(instr) = method.instruction(id) else {
                continue;
            };
            if instr.has_side_effects() {
                continue;
            }
            let Some(output) = instr.output() else {
                continue;
            };
            if !instr
                .arguments()
                .into_iter()
                .all(|arg| self.is_invariant_value(cfg, dependencies, arg, pos, &invariant))
            {
                continue;
            }
            invariant.insert(id);
            result.insert(pos);
            if let Some(local) = output.check_local() {
                worklist.extend(
                    dependencies
                        .readers(local)
                        .iter()
                        .filter(|r| self.contains(r.position.block) && !invariant.contains(&r.instr))
                        .map(|r| (r.position, r.instr)),
                );
            }
        }
        tracing::debug!("Found {} loop invariant instructions", result.len());
        result
    }

    fn is_invariant_value(
        &self,
        cfg: &ControlFlowGraph,
        dependencies: &DataDependencyGraph,
        value: &Value,
        read_at: Position,
        invariant: &HashSet<InstrId>,
    ) -> bool {
        let Some(local) = value.check_local() else {
            return true;
        };
        let writers = dependencies.writers(local);
        if writers.iter().all(|w| !self.contains(w.position.block)) {
            return true;
        }
        // a second writer makes the value depend on the iteration
        match writers {
            [writer] => {
                invariant.contains(&writer.instr)
                    && position_dominates(cfg, writer.position, read_at)
            }
            _ => false,
        }
    }

    /// Human-readable description listing the blocks by label
    pub fn to_string(&self, cfg: &ControlFlowGraph, method: &Method) -> String {
        let label = |block: BlockId| {
            if (block.0 as usize) < method.num_blocks() {
                method.block(block).label.clone()
            } else {
                format!("block{}", block.0)
            }
        };
        let blocks: Vec<String> = self.nodes.iter().map(|&b| label(b)).collect();
        let header = self
            .get_header(cfg)
            .map_or_else(|| "(none)".to_string(), label);
        format!(
            "Loop{} with header {} over [{}]",
            if self.is_work_group_loop(cfg) {
                " (work-group)"
            } else {
                ""
            },
            header,
            blocks.join(", ")
        )
    }
}

fn position_dominates(cfg: &ControlFlowGraph, first: Position, second: Position) -> bool {
    if first.block == second.block {
        first.index < second.index
    } else {
        cfg.dominates(first.block, second.block)
    }
}

fn single(set: BTreeSet<BlockId>) -> Option<BlockId> {
    if set.len() == 1 {
        set.into_iter().next()
    } else {
        None
    }
}
