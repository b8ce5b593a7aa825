//! Structural Analyzer (§4.7): folds a function's basic-block CFG into a
//! region graph by iteratively matching Block/IfThenElse/IfThen/While/
//! DoWhile/Switch shapes, replacing each matched sub-CFG with a compound
//! region until no rule fires. Whatever does not fold survives as
//! unstructured [`Region::Goto`] edges the Code Generator lowers
//! literally.

mod patterns;
pub mod region;

use rustc_hash::FxHashMap;

pub use region::Region;

use crate::ir::{BlockAddress, Function, JumpTarget, Program, Statement};

/// Working graph during structural matching: one node per not-yet-merged
/// region, keyed by the address of the block execution enters it
/// through, plus its successor edges in program order (a conditional
/// jump's then-target before its else-target; a resolved switch's
/// entries in table order).
pub struct RegionGraph {
    nodes: FxHashMap<BlockAddress, Region>,
    successors: FxHashMap<BlockAddress, Vec<BlockAddress>>,
    entry: BlockAddress,
}

impl RegionGraph {
    fn predecessors(&self, target: BlockAddress) -> Vec<BlockAddress> {
        let mut preds: Vec<_> = self.successors.iter().filter(|(_, succs)| succs.contains(&target)).map(|(&addr, _)| addr).collect();
        preds.sort();
        preds
    }

    fn remove(&mut self, addr: BlockAddress) -> Region {
        self.successors.remove(&addr);
        self.nodes.remove(&addr).expect("removed node must have existed")
    }

    /// Folds whatever remains into the final [`Region`]. A fully
    /// structured function collapses to a single node at `entry`; any
    /// residual nodes (unstructured control flow no rule could fold)
    /// become goto-terminated leaves in a best-effort sequence, ordered
    /// by address for determinism.
    fn finish(mut self) -> Region {
        if self.nodes.len() == 1 {
            return self.nodes.remove(&self.entry).unwrap_or_else(|| self.nodes.into_values().next().unwrap());
        }
        let mut addrs: Vec<_> = self.nodes.keys().copied().collect();
        addrs.sort();
        let parts = addrs
            .into_iter()
            .map(|a| {
                let region = self.nodes.remove(&a).unwrap();
                if a == self.entry {
                    region
                } else {
                    Region::Goto(region.entry())
                }
            })
            .collect();
        Region::Sequence(parts)
    }
}

fn build_initial(program: &Program, function: &Function) -> RegionGraph {
    let mut nodes = FxHashMap::default();
    let mut successors = FxHashMap::default();
    for addr in function.blocks() {
        nodes.insert(addr, Region::Block(addr));
        successors.insert(addr, edge_targets(program, function, addr));
    }
    RegionGraph { nodes, successors, entry: function.entry() }
}

fn edge_targets(program: &Program, function: &Function, addr: BlockAddress) -> Vec<BlockAddress> {
    let Some(block) = program.block(addr) else { return Vec::new() };
    let mut out = Vec::new();
    if let Some(Statement::Jump { then_target, else_target, .. }) = block.terminator() {
        push_target(&mut out, then_target, function);
        if let Some(e) = else_target {
            push_target(&mut out, e, function);
        }
    }
    out
}

fn push_target(out: &mut Vec<BlockAddress>, target: &JumpTarget, function: &Function) {
    match target {
        JumpTarget::Direct(addr) if function.contains(*addr) => out.push(*addr),
        JumpTarget::Table(entries) => out.extend(entries.iter().filter_map(|e| e.block).filter(|b| function.contains(*b))),
        _ => {}
    }
}

/// Runs structural analysis over `function`, returning its recovered
/// region tree.
pub fn analyze(program: &Program, function: &Function) -> Region {
    let mut graph = build_initial(program, function);
    while patterns::apply_one(&mut graph) {}
    graph.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, JumpTarget as JT, Statement};

    fn program_with(blocks: Vec<(u64, BasicBlock)>) -> Program {
        let mut program = Program::new();
        for (addr, block) in blocks {
            program.insert_block(addr, block);
        }
        program
    }

    #[test]
    fn straight_line_blocks_fold_to_sequence() {
        let mut a = BasicBlock::at(0);
        a.push_statement(Statement::Jump { condition: None, then_target: JT::Direct(4), else_target: None });
        let mut b = BasicBlock::at(4);
        b.push_statement(Statement::Return);
        let program = program_with(vec![(0, a), (4, b)]);
        let function = crate::ir::isolate(&program, 0);

        let region = analyze(&program, &function);
        assert!(matches!(region, Region::Sequence(_)));
    }

    #[test]
    fn diamond_folds_to_if_then_else() {
        let mut head = BasicBlock::at(0);
        let cond = crate::ir::Term::constant(&mut crate::ir::TermIdSource::default(), 1, 1);
        head.push_statement(Statement::Jump { condition: Some(cond), then_target: JT::Direct(4), else_target: Some(JT::Direct(8)) });
        let mut then_blk = BasicBlock::at(4);
        then_blk.push_statement(Statement::Jump { condition: None, then_target: JT::Direct(12), else_target: None });
        let mut else_blk = BasicBlock::at(8);
        else_blk.push_statement(Statement::Jump { condition: None, then_target: JT::Direct(12), else_target: None });
        let mut join = BasicBlock::at(12);
        join.push_statement(Statement::Return);
        let program = program_with(vec![(0, head), (4, then_blk), (8, else_blk), (12, join)]);
        let function = crate::ir::isolate(&program, 0);

        let region = analyze(&program, &function);
        assert!(matches!(region, Region::Sequence(_)));
        if let Region::Sequence(parts) = region {
            assert!(matches!(parts[0], Region::IfThenElse { .. }));
        }
    }

    #[test]
    fn self_loop_folds_to_do_while() {
        let mut head = BasicBlock::at(0);
        head.push_statement(Statement::Jump { condition: None, then_target: JT::Direct(0), else_target: Some(JT::Direct(4)) });
        let mut exit = BasicBlock::at(4);
        exit.push_statement(Statement::Return);
        let program = program_with(vec![(0, head), (4, exit)]);
        let function = crate::ir::isolate(&program, 0);

        let region = analyze(&program, &function);
        if let Region::Sequence(parts) = &region {
            assert!(matches!(parts[0], Region::DoWhile { .. }));
        } else {
            panic!("expected a sequence wrapping the do-while and exit, got {region:?}");
        }
    }
}
