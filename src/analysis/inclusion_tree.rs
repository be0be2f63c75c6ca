//! # Loop inclusion forest
//!
//! Nesting relation between the natural loops of one method. A loop is a child of another if it
//! lies inside it with no third loop in between. Loops sharing a header may overlap without either
//! including the other; a loop inside both then has two parents.

use super::loops::ControlFlowLoop;
use crate::compiler::ir::BlockId;

#[derive(Debug, Clone, Default)]
struct TreeNode {
    parents: Vec<usize>,
    children: Vec<usize>,
}

/// Forest over loops, nodes are the indices of the loops it was created from
#[derive(Debug, Clone, Default)]
pub struct LoopInclusionTree {
    nodes: Vec<TreeNode>,
}

impl LoopInclusionTree {
    /// Build the forest of direct inclusions between `loops`
    pub fn new(loops: &[ControlFlowLoop]) -> Self {
        let mut nodes = vec![TreeNode::default(); loops.len()];
        for (outer, a) in loops.iter().enumerate() {
            for (inner, b) in loops.iter().enumerate() {
                if !a.includes(b) {
                    continue;
                }
                let direct = !loops
                    .iter()
                    .any(|c| a.includes(c) && c.includes(b));
                if direct {
                    nodes[outer].children.push(inner);
                    nodes[inner].parents.push(outer);
                }
            }
        }
        LoopInclusionTree { nodes }
    }

    /// Number of loops
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if there are no loops
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Outermost loops
    pub fn roots(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parents.is_empty())
            .collect()
    }

    /// Loops directly inside `node`
    pub fn children(&self, node: usize) -> &[usize] {
        &self.nodes[node].children
    }

    /// Loops directly containing `node`
    pub fn parents(&self, node: usize) -> &[usize] {
        &self.nodes[node].parents
    }

    /// Ancestor reached by walking up at most `max_depth` levels, or the root if `None`
    ///
    /// Where a loop has several parents the first one is followed.
    pub fn find_root(&self, node: usize, max_depth: Option<u32>) -> usize {
        let mut current = node;
        let mut depth = 0;
        while let Some(&parent) = self.nodes[current].parents.first() {
            if max_depth.map_or(false, |max| depth >= max) {
                break;
            }
            current = parent;
            depth += 1;
        }
        current
    }

    /// Number of inclusion levels above `node` on the longest path to a root
    pub fn longest_path_to_root(&self, node: usize) -> u32 {
        self.nodes[node]
            .parents
            .iter()
            .map(|&parent| 1 + self.longest_path_to_root(parent))
            .max()
            .unwrap_or(0)
    }

    /// Whether any loop nested inside `node` contains `block`
    pub fn has_cfg_node_in_children(
        &self,
        node: usize,
        loops: &[ControlFlowLoop],
        block: BlockId,
    ) -> bool {
        self.nodes[node]
            .children
            .iter()
            .any(|&child| {
                loops[child].contains(block) || self.has_cfg_node_in_children(child, loops, block)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cfg::ControlFlowGraph;

    /// a = {1..6}, b = {2..4} inside a, c = {3} inside b, d = {5} inside a
    fn nested() -> (Vec<ControlFlowLoop>, LoopInclusionTree) {
        let cfg = ControlFlowGraph::from_edges(
            BlockId(0),
            8,
            &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 3),
                (3, 4),
                (4, 2),
                (4, 5),
                (5, 5),
                (5, 6),
                (6, 1),
                (6, 7),
            ],
        );
        let loops = cfg.find_loops();
        let tree = LoopInclusionTree::new(&loops);
        (loops, tree)
    }

    fn by_size(loops: &[ControlFlowLoop], size: usize, block: u32) -> usize {
        loops
            .iter()
            .position(|l| l.len() == size && l.contains(BlockId(block)))
            .unwrap()
    }

    #[test]
    fn test_nesting_shape() {
        let (loops, tree) = nested();
        assert_eq!(loops.len(), 4);
        let a = by_size(&loops, 6, 1);
        let b = by_size(&loops, 3, 2);
        let c = by_size(&loops, 1, 3);
        let d = by_size(&loops, 1, 5);

        assert_eq!(tree.roots(), vec![a]);
        let mut children = tree.children(a).to_vec();
        children.sort();
        let mut expected = vec![b, d];
        expected.sort();
        assert_eq!(children, expected);
        assert_eq!(tree.children(b), &[c]);
        assert!(tree.children(c).is_empty());

        assert_eq!(tree.find_root(c, None), a);
        assert_eq!(tree.find_root(c, Some(1)), b);
        assert_eq!(tree.find_root(c, Some(0)), c);
        assert_eq!(tree.longest_path_to_root(c), 2);
        assert_eq!(tree.longest_path_to_root(d), 1);
        assert_eq!(tree.longest_path_to_root(a), 0);
    }

    #[test]
    fn test_has_cfg_node_in_children() {
        let (loops, tree) = nested();
        let a = by_size(&loops, 6, 1);
        let c = by_size(&loops, 1, 3);
        assert!(tree.has_cfg_node_in_children(a, &loops, BlockId(3)));
        assert!(!tree.has_cfg_node_in_children(a, &loops, BlockId(6)));
        assert!(!tree.has_cfg_node_in_children(c, &loops, BlockId(3)));
    }
}
