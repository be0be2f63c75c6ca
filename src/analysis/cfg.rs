//! # Control Flow Graph
//!
//! Builds the control flow graph of a method's basic blocks and computes its dominator tree.

use super::loops::ControlFlowLoop;
use crate::compiler::ir::{BlockId, InstrId, Instruction, Method};
use std::collections::{BTreeSet, HashMap};

/// Stable index of an edge within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

/// How control passes along an edge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfgRelation {
    /// Fall-through into the next block without a branch
    pub is_implicit: bool,
    /// Edge is the back-jump of the compiler-inserted work-group loop
    pub is_work_group_loop: bool,
    /// Branch instruction taking this edge, if explicit
    pub branch: Option<InstrId>,
}

/// Directed edge between two basic blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgEdge {
    /// Source block
    pub from: BlockId,
    /// Target block
    pub to: BlockId,
    /// Branch metadata
    pub relation: CfgRelation,
}

#[derive(Debug, Clone, Default)]
struct CfgNode {
    successors: Vec<EdgeId>,
    predecessors: Vec<EdgeId>,
}

/// Control Flow Graph
///
/// Nodes are the basic blocks of one method, addressed by their [`BlockId`]. Dominators are
/// computed on construction; the graph is a snapshot and must be rebuilt after the method's
/// blocks or branches change.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    entry: BlockId,
    nodes: Vec<CfgNode>,
    edges: Vec<CfgEdge>,
    edge_map: HashMap<(BlockId, BlockId), EdgeId>,
    /// Immediate dominator per node, the entry is its own, unreachable nodes have none
    idom: Vec<Option<BlockId>>,
    /// Reverse post-order from the entry, reachable nodes only
    rpo: Vec<BlockId>,
    rpo_index: Vec<Option<usize>>,
}

impl ControlFlowGraph {
    /// Build the CFG of a method, the first block is the entry
    pub fn build(method: &Method) -> Self {
        let mut cfg = ControlFlowGraph::empty(BlockId(0), method.num_blocks());
        let blocks: Vec<_> = method.blocks().map(|(id, block)| (id, block.instructions().to_vec())).collect();

        for (pos, (block, instructions)) in blocks.iter().enumerate() {
            let mut falls_through = true;
            for &id in instructions {
                if let Some(Instruction::Branch(branch)) = method.instruction(id) {
                    cfg.add_edge(
                        *block,
                        branch.target,
                        CfgRelation {
                            is_implicit: false,
                            is_work_group_loop: branch.work_group_loop,
                            branch: Some(id),
                        },
                    );
                }
            }
            if let Some(last) = instructions.last().and_then(|id| method.instruction(*id)) {
                falls_through = match last {
                    Instruction::Branch(branch) => !branch.is_unconditional(),
                    Instruction::Return(_) => false,
                    _ => true,
                };
            }
            if falls_through {
                if let Some((next, _)) = blocks.get(pos + 1) {
                    cfg.add_edge(
                        *block,
                        *next,
                        CfgRelation {
                            is_implicit: true,
                            ..CfgRelation::default()
                        },
                    );
                }
            }
        }

        cfg.compute_dominators();
        cfg
    }

    /// Build a graph from raw edges, mostly useful for analyses independent of instructions
    pub fn from_edges(entry: BlockId, num_nodes: usize, edges: &[(u32, u32)]) -> Self {
        let mut cfg = ControlFlowGraph::empty(entry, num_nodes);
        for &(from, to) in edges {
            cfg.add_edge(BlockId(from), BlockId(to), CfgRelation::default());
        }
        cfg.compute_dominators();
        cfg
    }

    fn empty(entry: BlockId, num_nodes: usize) -> Self {
        ControlFlowGraph {
            entry,
            nodes: vec![CfgNode::default(); num_nodes],
            edges: Vec::new(),
            edge_map: HashMap::new(),
            idom: vec![None; num_nodes],
            rpo: Vec::new(),
            rpo_index: vec![None; num_nodes],
        }
    }

    /// Add an edge, merging it into an existing edge between the same blocks
    fn add_edge(&mut self, from: BlockId, to: BlockId, relation: CfgRelation) -> EdgeId {
        if let Some(&existing) = self.edge_map.get(&(from, to)) {
            let edge = &mut self.edges[existing.0 as usize];
            edge.relation.is_implicit &= relation.is_implicit;
            edge.relation.is_work_group_loop |= relation.is_work_group_loop;
            if edge.relation.branch.is_none() {
                edge.relation.branch = relation.branch;
            }
            return existing;
        }
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(CfgEdge { from, to, relation });
        self.edge_map.insert((from, to), id);
        self.nodes[from.0 as usize].successors.push(id);
        self.nodes[to.0 as usize].predecessors.push(id);
        id
    }

    /// Cooper-Harvey-Kennedy iterative dominator computation
    fn compute_dominators(&mut self) {
        if self.nodes.is_empty() {
            return;
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut postorder = Vec::with_capacity(self.nodes.len());
        // iterative DFS, (node, next successor index)
        let mut stack = vec![(self.entry, 0usize)];
        visited[self.entry.0 as usize] = true;
        while let Some((node, next)) = stack.pop() {
            let succs = &self.nodes[node.0 as usize].successors;
            if next < succs.len() {
                stack.push((node, next + 1));
                let succ = self.edges[succs[next].0 as usize].to;
                if !visited[succ.0 as usize] {
                    visited[succ.0 as usize] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(node);
            }
        }
        postorder.reverse();
        self.rpo = postorder;
        for (i, node) in self.rpo.iter().enumerate() {
            self.rpo_index[node.0 as usize] = Some(i);
        }

        self.idom[self.entry.0 as usize] = Some(self.entry);
        let mut changed = true;
        while changed {
            changed = false;
            for &node in self.rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for pred in self.predecessors(node) {
                    if self.idom[pred.0 as usize].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => self.intersect(current, pred),
                    });
                }
                if new_idom.is_some() && self.idom[node.0 as usize] != new_idom {
                    self.idom[node.0 as usize] = new_idom;
                    changed = true;
                }
            }
        }
    }

    fn intersect(&self, mut b1: BlockId, mut b2: BlockId) -> BlockId {
        let order = |b: BlockId| self.rpo_index[b.0 as usize].unwrap_or(usize::MAX);
        while b1 != b2 {
            while order(b1) > order(b2) {
                b1 = self.idom[b1.0 as usize].unwrap_or(self.entry);
            }
            while order(b2) > order(b1) {
                b2 = self.idom[b2.0 as usize].unwrap_or(self.entry);
            }
        }
        b1
    }

    /// Entry block
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// All edges
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &CfgEdge)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, edge)| (EdgeId(i as u32), edge))
    }

    /// Edge by index
    pub fn edge(&self, id: EdgeId) -> &CfgEdge {
        &self.edges[id.0 as usize]
    }

    /// Edge between two blocks, if any
    pub fn find_edge(&self, from: BlockId, to: BlockId) -> Option<EdgeId> {
        self.edge_map.get(&(from, to)).copied()
    }

    /// Blocks control can pass to from `node`
    pub fn successors(&self, node: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.nodes[node.0 as usize]
            .successors
            .iter()
            .map(move |e| self.edges[e.0 as usize].to)
    }

    /// Blocks control can come from into `node`
    pub fn predecessors(&self, node: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.nodes[node.0 as usize]
            .predecessors
            .iter()
            .map(move |e| self.edges[e.0 as usize].from)
    }

    /// Whether `node` can be reached from the entry
    pub fn is_reachable(&self, node: BlockId) -> bool {
        self.rpo_index
            .get(node.0 as usize)
            .map_or(false, |index| index.is_some())
    }

    /// Reachable nodes in reverse post-order
    pub fn reverse_post_order(&self) -> &[BlockId] {
        &self.rpo
    }

    /// Immediate dominator, `None` for the entry and unreachable nodes
    pub fn immediate_dominator(&self, node: BlockId) -> Option<BlockId> {
        if node == self.entry {
            return None;
        }
        self.idom.get(node.0 as usize).copied().flatten()
    }

    /// Whether every path from the entry to `b` passes through `a`
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    /// Edges whose target dominates their source
    pub fn back_edges(&self) -> Vec<EdgeId> {
        self.edges()
            .filter(|(_, edge)| self.dominates(edge.to, edge.from))
            .map(|(id, _)| id)
            .collect()
    }

    /// Natural loops of all back edges, in edge order
    ///
    /// The natural loop of a back edge `m -> n` is `n` plus every node that reaches `m` without
    /// passing through `n`.
    pub fn find_loops(&self) -> Vec<ControlFlowLoop> {
        let loops: Vec<ControlFlowLoop> = self
            .back_edges()
            .into_iter()
            .map(|back_edge| {
                let edge = self.edge(back_edge);
                let header = edge.to;
                let mut nodes = BTreeSet::new();
                nodes.insert(header);
                let mut worklist = Vec::new();
                if nodes.insert(edge.from) {
                    worklist.push(edge.from);
                }
                while let Some(node) = worklist.pop() {
                    for pred in self.predecessors(node) {
                        if self.is_reachable(pred) && nodes.insert(pred) {
                            worklist.push(pred);
                        }
                    }
                }
                ControlFlowLoop::new(back_edge, nodes)
            })
            .collect();
        tracing::debug!("Found {} control flow loops", loops.len());
        loops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Branch, DataType, Value};

    #[test]
    fn test_empty_cfg() {
        let method = Method::new("empty");
        let cfg = ControlFlowGraph::build(&method);
        assert_eq!(cfg.num_nodes(), 0);
        assert!(cfg.find_loops().is_empty());
    }

    #[test]
    fn test_fall_through_and_branches() {
        let mut method = Method::new("k");
        let entry = method.add_block("entry");
        let body = method.add_block("body");
        let exit = method.add_block("exit");
        let cond = method.add_local("c", DataType::Bool);
        method.append(body, Instruction::Branch(Branch::if_true(body, cond)));
        method.append(exit, Instruction::Return(None::<Value>));

        let cfg = ControlFlowGraph::build(&method);
        assert!(cfg.find_edge(entry, body).unwrap() != cfg.find_edge(body, body).unwrap());
        assert!(cfg.edge(cfg.find_edge(entry, body).unwrap()).relation.is_implicit);
        assert!(!cfg.edge(cfg.find_edge(body, body).unwrap()).relation.is_implicit);
        assert!(cfg.find_edge(body, exit).is_some());
        assert_eq!(cfg.successors(exit).count(), 0);
    }

    #[test]
    fn test_dominators_of_diamond() {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let cfg = ControlFlowGraph::from_edges(BlockId(0), 4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert!(cfg.dominates(BlockId(0), BlockId(3)));
        assert!(!cfg.dominates(BlockId(1), BlockId(3)));
        assert!(cfg.dominates(BlockId(3), BlockId(3)));
        assert_eq!(cfg.immediate_dominator(BlockId(3)), Some(BlockId(0)));
        assert_eq!(cfg.immediate_dominator(BlockId(0)), None);
    }

    #[test]
    fn test_unreachable_nodes_are_not_dominated() {
        let cfg = ControlFlowGraph::from_edges(BlockId(0), 3, &[(0, 1), (2, 1)]);
        assert!(!cfg.is_reachable(BlockId(2)));
        assert!(!cfg.dominates(BlockId(0), BlockId(2)));
        assert!(cfg.dominates(BlockId(0), BlockId(1)));
    }

    #[test]
    fn test_natural_loop_nodes() {
        // 0 -> 1 -> 2 -> 3 -> 1, 2 -> 4
        let cfg = ControlFlowGraph::from_edges(
            BlockId(0),
            5,
            &[(0, 1), (1, 2), (2, 3), (3, 1), (2, 4)],
        );
        let loops = cfg.find_loops();
        assert_eq!(loops.len(), 1);
        let nodes: Vec<_> = loops[0].nodes().iter().copied().collect();
        assert_eq!(nodes, vec![BlockId(1), BlockId(2), BlockId(3)]);
    }

    #[test]
    fn test_retreating_edge_without_dominance_is_no_loop() {
        // irreducible: 0 -> 1, 0 -> 2, 1 -> 2, 2 -> 1
        let cfg = ControlFlowGraph::from_edges(BlockId(0), 3, &[(0, 1), (0, 2), (1, 2), (2, 1)]);
        assert!(cfg.find_loops().is_empty());
    }
}
