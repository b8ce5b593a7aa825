//! Variable Reconstruction (§4.6): groups memory locations into variables
//! via a disjoint-set forest, unioning two locations whenever some term
//! accesses both across their overlap — the same standard disjoint-set
//! shape `decomp-types::TypeTable` uses for the type lattice (path
//! compression, union-by-rank), specialized here to plain location keys
//! with no payload to merge.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{Function, MemoryLocation, Program, Statement};

/// Opaque identifier for a reconstructed variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(u32);

struct Node {
    parent: u32,
    rank: u32,
}

struct DisjointLocations {
    index: FxHashMap<MemoryLocation, u32>,
    nodes: Vec<Node>,
    keys: Vec<MemoryLocation>,
}

impl DisjointLocations {
    fn new() -> Self {
        DisjointLocations { index: FxHashMap::default(), nodes: Vec::new(), keys: Vec::new() }
    }

    fn cell(&mut self, location: MemoryLocation) -> u32 {
        if let Some(&i) = self.index.get(&location) {
            return i;
        }
        let i = self.nodes.len() as u32;
        self.nodes.push(Node { parent: i, rank: 0 });
        self.keys.push(location);
        self.index.insert(location, i);
        i
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut x = x;
        while self.nodes[x as usize].parent != x {
            let grandparent = self.nodes[self.nodes[x as usize].parent as usize].parent;
            self.nodes[x as usize].parent = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (small, big) = if self.nodes[ra as usize].rank < self.nodes[rb as usize].rank { (ra, rb) } else { (rb, ra) };
        self.nodes[small as usize].parent = big;
        if self.nodes[small as usize].rank == self.nodes[big as usize].rank {
            self.nodes[big as usize].rank += 1;
        }
    }
}

/// The location-to-variable mapping produced for one function.
#[derive(Debug, Default)]
pub struct Variables {
    location_to_variable: FxHashMap<MemoryLocation, VariableId>,
}

impl Variables {
    /// The variable a location was grouped into, if it was ever accessed.
    pub fn variable_of(&self, location: &MemoryLocation) -> Option<VariableId> {
        self.location_to_variable.get(location).copied()
    }

    /// Number of distinct variables recovered.
    pub fn variable_count(&self) -> usize {
        self.location_to_variable.values().collect::<FxHashSet<_>>().len()
    }

    /// Every distinct variable recovered, each paired with one of its
    /// member locations (for picking a declared size/name), in a stable
    /// order (lowest member location first).
    pub fn distinct_variables(&self) -> Vec<(VariableId, MemoryLocation)> {
        let mut best: FxHashMap<VariableId, MemoryLocation> = FxHashMap::default();
        for (&location, &id) in &self.location_to_variable {
            best.entry(id).and_modify(|cur| if location < *cur { *cur = location }).or_insert(location);
        }
        let mut out: Vec<_> = best.into_iter().map(|(id, loc)| (id, loc)).collect();
        out.sort_by_key(|(_, loc)| *loc);
        out
    }
}

/// Reconstructs variables for `function`: starts with one cell per
/// distinct memory location touched anywhere in the function, then unions
/// any two overlapping locations that share an accessing term (every term
/// in a statement reads or writes exactly the locations it names, so two
/// locations are unioned whenever they overlap *and* both appear, whether
/// in the same statement or not, since overlap alone already implies a
/// shared storage cell per §4.6's union rule).
pub fn reconstruct(program: &Program, function: &Function) -> Variables {
    let mut forest = DisjointLocations::new();

    for addr in function.blocks() {
        let Some(block) = program.block(addr) else { continue };
        for statement in block.statements() {
            statement.for_each_term(|term| {
                term.visit(&mut |t| {
                    if let Some(location) = t.as_memory_location() {
                        forest.cell(*location);
                    }
                });
            });
        }
    }

    // Union every pair of distinct locations that overlap. The location
    // set per function is small (register families plus recovered stack
    // slots), so the quadratic scan is acceptable; a real implementation
    // would bucket by domain first.
    let all: Vec<MemoryLocation> = forest.keys.clone();
    for i in 0..all.len() {
        for j in (i + 1)..all.len() {
            if all[i].overlaps(&all[j]) {
                let a = forest.cell(all[i]);
                let b = forest.cell(all[j]);
                forest.union(a, b);
            }
        }
    }

    let mut variables = Variables::default();
    for location in all {
        let cell = forest.cell(location);
        let rep = forest.find(cell);
        variables.location_to_variable.insert(location, VariableId(rep));
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_regs;
    use crate::ir::{isolate, BasicBlock, Term};

    #[test]
    fn overlapping_stack_slots_join_one_variable() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let wide = Term::memory_location_access(program.term_ids(), MemoryLocation::stack(-8, 32));
        block.push_statement(Statement::assign(wide, Term::constant(program.term_ids(), 32, 0)));
        let narrow = Term::memory_location_access(program.term_ids(), MemoryLocation::stack(-8, 8));
        block.push_statement(Statement::assign(narrow, Term::constant(program.term_ids(), 8, 0)));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let vars = reconstruct(&program, &function);
        let a = vars.variable_of(&MemoryLocation::stack(-8, 32)).unwrap();
        let b = vars.variable_of(&MemoryLocation::stack(-8, 8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn disjoint_registers_stay_separate_variables() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let ax = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        block.push_statement(Statement::assign(ax, Term::constant(program.term_ids(), 32, 1)));
        let cx = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::CX, 0, 32));
        block.push_statement(Statement::assign(cx, Term::constant(program.term_ids(), 32, 2)));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let vars = reconstruct(&program, &function);
        let a = vars.variable_of(&MemoryLocation::register(x86_regs::AX, 0, 32)).unwrap();
        let b = vars.variable_of(&MemoryLocation::register(x86_regs::CX, 0, 32)).unwrap();
        assert_ne!(a, b);
    }
}
