//! # Debug graphs
//!
//! Graphviz DOT output of the control flow graph and the loop inclusion forest.

use super::cfg::ControlFlowGraph;
use super::inclusion_tree::LoopInclusionTree;
use super::loops::ControlFlowLoop;
use crate::compiler::ir::{BlockId, Method};
use std::collections::BTreeSet;
use std::io::{self, Write};

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn block_label(method: &Method, block: BlockId) -> String {
    if (block.0 as usize) < method.num_blocks() {
        escape(&method.block(block).label)
    } else {
        format!("block{}", block.0)
    }
}

/// Write the CFG, loop headers are drawn bold and back edges dashed
pub fn write_cfg<W: Write>(
    out: &mut W,
    cfg: &ControlFlowGraph,
    method: &Method,
    loops: &[ControlFlowLoop],
) -> io::Result<()> {
    let headers: BTreeSet<BlockId> = loops.iter().filter_map(|l| l.get_header(cfg)).collect();
    let back_edges: BTreeSet<_> = loops.iter().map(|l| l.back_edge()).collect();

    writeln!(out, "digraph \"{}\" {{", escape(&method.name))?;
    writeln!(out, "  node [shape=box, fontname=\"monospace\"];")?;
    for i in 0..cfg.num_nodes() {
        let block = BlockId(i as u32);
        let style = if headers.contains(&block) {
            ", style=bold, color=\"blue\""
        } else if !cfg.is_reachable(block) {
            ", color=\"gray\""
        } else {
            ""
        };
        writeln!(
            out,
            "  n{} [label=\"{}\"{}];",
            i,
            block_label(method, block),
            style
        )?;
    }
    for (id, edge) in cfg.edges() {
        let mut attrs = Vec::new();
        if back_edges.contains(&id) {
            attrs.push("style=dashed");
        } else if edge.relation.is_implicit {
            attrs.push("style=dotted");
        }
        if edge.relation.is_work_group_loop {
            attrs.push("label=\"work-group\"");
        }
        if attrs.is_empty() {
            writeln!(out, "  n{} -> n{};", edge.from.0, edge.to.0)?;
        } else {
            writeln!(
                out,
                "  n{} -> n{} [{}];",
                edge.from.0,
                edge.to.0,
                attrs.join(", ")
            )?;
        }
    }
    writeln!(out, "}}")
}

/// Write the loop inclusion forest, each node labelled with its loop's header
pub fn write_loop_tree<W: Write>(
    out: &mut W,
    tree: &LoopInclusionTree,
    loops: &[ControlFlowLoop],
    cfg: &ControlFlowGraph,
    method: &Method,
) -> io::Result<()> {
    writeln!(out, "digraph \"{} loops\" {{", escape(&method.name))?;
    writeln!(out, "  node [shape=ellipse, fontname=\"monospace\"];")?;
    for (i, lp) in loops.iter().enumerate() {
        let header = lp
            .get_header(cfg)
            .map_or_else(|| "?".to_string(), |h| block_label(method, h));
        writeln!(
            out,
            "  l{} [label=\"{} ({} blocks)\"];",
            i,
            header,
            lp.len()
        )?;
    }
    for i in 0..tree.len() {
        for child in tree.children(i) {
            writeln!(out, "  l{} -> l{};", i, child)?;
        }
    }
    writeln!(out, "}}")
}
