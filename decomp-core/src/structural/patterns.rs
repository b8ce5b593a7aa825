//! The pattern-matching rules §4.7 iterates to a fixed point.

use crate::ir::BlockAddress;

use super::region::Region;
use super::RegionGraph;

/// Tries each rule, in Sequence/IfThenElse/IfThen/While/DoWhile/Switch
/// order, against every node; applies the first match found and returns
/// `true`. Returns `false` once nothing fires (the §4.7 stopping
/// condition).
pub fn apply_one(graph: &mut RegionGraph) -> bool {
    try_sequence(graph) || try_if_then_else(graph) || try_if_then(graph) || try_while(graph) || try_do_while(graph) || try_switch(graph)
}

fn sorted_nodes(graph: &RegionGraph) -> Vec<BlockAddress> {
    let mut addrs: Vec<_> = graph.nodes.keys().copied().collect();
    addrs.sort();
    addrs
}

fn try_sequence(graph: &mut RegionGraph) -> bool {
    for n in sorted_nodes(graph) {
        let succs = graph.successors.get(&n).cloned().unwrap_or_default();
        if succs.len() != 1 {
            continue;
        }
        let s = succs[0];
        if s == n || !graph.nodes.contains_key(&s) {
            continue;
        }
        if graph.predecessors(s) != vec![n] {
            continue;
        }
        let tail = graph.remove(s);
        let tail_succs = graph.successors.remove(&s).unwrap_or_default();
        let head = graph.nodes.get_mut(&n).unwrap();
        let merged = match std::mem::replace(head, Region::Block(n)) {
            Region::Sequence(mut parts) => {
                extend_sequence(&mut parts, tail);
                Region::Sequence(parts)
            }
            other => Region::Sequence(vec![other, tail]),
        };
        *head = merged;
        graph.successors.insert(n, tail_succs);
        return true;
    }
    false
}

fn extend_sequence(parts: &mut Vec<Region>, tail: Region) {
    match tail {
        Region::Sequence(mut more) => parts.append(&mut more),
        other => parts.push(other),
    }
}

fn try_if_then_else(graph: &mut RegionGraph) -> bool {
    for head in sorted_nodes(graph) {
        let succs = graph.successors.get(&head).cloned().unwrap_or_default();
        if succs.len() != 2 {
            continue;
        }
        let (b, c) = (succs[0], succs[1]);
        if b == c || b == head || c == head {
            continue;
        }
        if graph.predecessors(b) != vec![head] || graph.predecessors(c) != vec![head] {
            continue;
        }
        let sb = graph.successors.get(&b).cloned().unwrap_or_default();
        let sc = graph.successors.get(&c).cloned().unwrap_or_default();
        if sb.len() == 1 && sc.len() == 1 && sb[0] == sc[0] {
            let join = sb[0];
            if join != head && join != b && join != c {
                let then_branch = graph.remove(b);
                let else_branch = graph.remove(c);
                *graph.nodes.get_mut(&head).unwrap() = Region::IfThenElse { head, then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) };
                graph.successors.insert(head, vec![join]);
                return true;
            }
        }
    }
    false
}

/// If exactly one of `b`/`c` has the other as its sole successor and
/// `head` as its sole predecessor, that one is the `then` body and the
/// other is the join point — an `if (cond) { then }` with no `else`.
fn one_sided_then(graph: &RegionGraph, head: BlockAddress, b: BlockAddress, c: BlockAddress) -> Option<(BlockAddress, BlockAddress)> {
    if graph.predecessors(b) == vec![head] && graph.successors.get(&b).cloned().unwrap_or_default() == vec![c] {
        return Some((b, c));
    }
    if graph.predecessors(c) == vec![head] && graph.successors.get(&c).cloned().unwrap_or_default() == vec![b] {
        return Some((c, b));
    }
    None
}

fn try_if_then(graph: &mut RegionGraph) -> bool {
    for head in sorted_nodes(graph) {
        let succs = graph.successors.get(&head).cloned().unwrap_or_default();
        if succs.len() != 2 {
            continue;
        }
        let (b, c) = (succs[0], succs[1]);
        if b == head || c == head {
            continue;
        }
        if let Some((body, join)) = one_sided_then(graph, head, b, c) {
            let then_branch = graph.remove(body);
            *graph.nodes.get_mut(&head).unwrap() = Region::IfThen { head, then_branch: Box::new(then_branch) };
            graph.successors.insert(head, vec![join]);
            return true;
        }
    }
    false
}

/// If exactly one of `b`/`c` has `head` as its sole predecessor and loops
/// straight back to `head`, that one is a pre-tested loop body and the
/// other is the loop's exit.
fn loop_body(graph: &RegionGraph, head: BlockAddress, b: BlockAddress, c: BlockAddress) -> Option<(BlockAddress, BlockAddress)> {
    if b == head || c == head {
        return None;
    }
    if graph.predecessors(b) == vec![head] && graph.successors.get(&b).cloned().unwrap_or_default() == vec![head] {
        return Some((b, c));
    }
    if graph.predecessors(c) == vec![head] && graph.successors.get(&c).cloned().unwrap_or_default() == vec![head] {
        return Some((c, b));
    }
    None
}

fn try_while(graph: &mut RegionGraph) -> bool {
    for head in sorted_nodes(graph) {
        let succs = graph.successors.get(&head).cloned().unwrap_or_default();
        if succs.len() != 2 {
            continue;
        }
        let (b, c) = (succs[0], succs[1]);
        if let Some((body, exit)) = loop_body(graph, head, b, c) {
            let body_region = graph.remove(body);
            *graph.nodes.get_mut(&head).unwrap() = Region::While { head, body: Box::new(body_region) };
            graph.successors.insert(head, vec![exit]);
            return true;
        }
    }
    false
}

fn try_do_while(graph: &mut RegionGraph) -> bool {
    for head in sorted_nodes(graph) {
        let succs = graph.successors.get(&head).cloned().unwrap_or_default();
        if succs.len() != 2 {
            continue;
        }
        let (b, c) = (succs[0], succs[1]);
        let exit = if b == head {
            c
        } else if c == head {
            b
        } else {
            continue;
        };
        let body = graph.remove(head);
        graph.nodes.insert(head, Region::DoWhile { head, body: Box::new(body) });
        graph.successors.insert(head, vec![exit]);
        return true;
    }
    false
}

fn try_switch(graph: &mut RegionGraph) -> bool {
    for head in sorted_nodes(graph) {
        let succs = graph.successors.get(&head).cloned().unwrap_or_default();
        if succs.len() <= 2 {
            continue;
        }
        let mut cases = Vec::new();
        for &case_addr in &succs {
            if graph.predecessors(case_addr) == vec![head] && graph.nodes.contains_key(&case_addr) {
                cases.push(graph.remove(case_addr));
            } else {
                cases.push(Region::Goto(case_addr));
            }
        }
        *graph.nodes.get_mut(&head).unwrap() = Region::Switch { head, cases };
        graph.successors.insert(head, vec![]);
        return true;
    }
    false
}
