//! # Data dependencies
//!
//! Def/use edges between the instructions of one method, keyed by local.

use crate::compiler::ir::{BlockId, InstrId, LocalId, Method, Position};
use std::collections::{BTreeMap, BTreeSet};

/// Instruction reading or writing a local
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Access {
    /// The instruction
    pub instr: InstrId,
    /// Where it lies
    pub position: Position,
}

/// Writers and readers of every local of a method, in layout order
///
/// Like the control flow graph this is a snapshot of the method at construction time.
#[derive(Debug, Clone, Default)]
pub struct DataDependencyGraph {
    writers: BTreeMap<LocalId, Vec<Access>>,
    readers: BTreeMap<LocalId, Vec<Access>>,
}

impl DataDependencyGraph {
    /// Collect the def/use edges of all instructions of `method`
    pub fn build(method: &Method) -> Self {
        let mut graph = DataDependencyGraph::default();
        for (block, bb) in method.blocks() {
            for (index, &instr) in bb.instructions().iter().enumerate() {
                let access = Access {
                    instr,
                    position: Position { block, index },
                };
                let Some(instruction) = method.instruction(instr) else {
                    continue;
                };
                if let Some(out) = instruction.output().and_then(|v| v.check_local()) {
                    graph.writers.entry(out).or_default().push(access);
                }
                for arg in instruction.arguments() {
                    if let Some(local) = arg.check_local() {
                        let readers = graph.readers.entry(local).or_default();
                        if readers.last() != Some(&access) {
                            readers.push(access);
                        }
                    }
                }
            }
        }
        graph
    }

    /// Locals written by at least one instruction
    pub fn written_locals(&self) -> impl Iterator<Item = LocalId> + '_ {
        self.writers.keys().copied()
    }

    /// Instructions writing `local`
    pub fn writers(&self, local: LocalId) -> &[Access] {
        self.writers.get(&local).map_or(&[], Vec::as_slice)
    }

    /// Instructions reading `local`
    pub fn readers(&self, local: LocalId) -> &[Access] {
        self.readers.get(&local).map_or(&[], Vec::as_slice)
    }

    /// Instructions writing `local` inside the given blocks
    pub fn writers_in(&self, local: LocalId, blocks: &BTreeSet<BlockId>) -> Vec<Access> {
        self.writers(local)
            .iter()
            .filter(|access| blocks.contains(&access.position.block))
            .copied()
            .collect()
    }

    /// Instructions writing `local` outside the given blocks
    pub fn writers_outside(&self, local: LocalId, blocks: &BTreeSet<BlockId>) -> Vec<Access> {
        self.writers(local)
            .iter()
            .filter(|access| !blocks.contains(&access.position.block))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{DataType, Instruction, OpCode, Operation, Value};

    #[test]
    fn test_writers_and_readers() {
        let mut method = Method::new("k");
        let first = method.add_block("first");
        let second = method.add_block("second");
        let a = method.add_local("a", DataType::i32());
        let b = method.add_local("b", DataType::i32());
        let one = Value::literal(1, DataType::i32());
        let w = method.append(
            first,
            Instruction::Operation(Operation::binary(OpCode::Add, a.clone(), one.clone(), one)),
        );
        let r = method.append(
            second,
            Instruction::Operation(Operation::binary(OpCode::Mul, b, a.clone(), a.clone())),
        );

        let graph = DataDependencyGraph::build(&method);
        let a_id = a.check_local().unwrap();
        assert_eq!(graph.writers(a_id).len(), 1);
        assert_eq!(graph.writers(a_id)[0].instr, w);
        // both operands are the same local, one edge
        assert_eq!(graph.readers(a_id).len(), 1);
        assert_eq!(graph.readers(a_id)[0].instr, r);

        let blocks: BTreeSet<_> = [second].into_iter().collect();
        assert!(graph.writers_in(a_id, &blocks).is_empty());
        assert_eq!(graph.writers_outside(a_id, &blocks).len(), 1);
    }
}
