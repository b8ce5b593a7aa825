//! The x86-64 implicit zero-extend post-pass (§9 Open Question: "it is
//! unclear whether this should instead be modeled by the instruction
//! analyzer itself; current behavior follows the source").
//!
//! Writing a 32-bit general-purpose register on x86-64 implicitly zeroes
//! the upper 32 bits of its 64-bit container. The stub analyzer models
//! registers as flat 64-bit cells and has no notion of sub-register
//! writes, so this pass runs after IR generation: any assignment whose
//! destination is a 32-bit register slice at bit-offset 0 gets a second,
//! synthetic assignment zeroing bits [32, 64) of the same family.

use crate::ir::{AccessFlag, Domain, MemoryLocation, Program, Statement, Term, TermKind};

/// Applies the patch in place to every block of `program`.
pub fn apply(program: &mut Program) {
    let addrs: Vec<_> = program.addresses().collect();
    for addr in addrs {
        let insertions: Vec<(usize, u16)> = program
            .block(addr)
            .unwrap()
            .statements()
            .iter()
            .enumerate()
            .filter_map(|(i, statement)| match statement {
                Statement::Assignment { lhs, .. } => thirty_two_bit_write(lhs).map(|family| (i, family)),
                _ => None,
            })
            .collect();
        if insertions.is_empty() {
            continue;
        }

        let patches: Vec<(usize, Statement)> = insertions
            .into_iter()
            .enumerate()
            .map(|(offset, (i, family))| {
                let ids = program.term_ids();
                let zero = Term::constant(ids, 32, 0);
                let upper = Term::memory_location_access(ids, MemoryLocation::register(family, 32, 32)).with_flag(AccessFlag::Write);
                (i + 1 + offset, Statement::Assignment { lhs: upper, rhs: zero })
            })
            .collect();

        let block = program.block_mut(addr);
        for (index, patch) in patches {
            block.statements_mut().insert(index, patch);
        }
    }
}

fn thirty_two_bit_write(lhs: &Term) -> Option<u16> {
    match lhs.kind() {
        TermKind::MemoryLocationAccess { location } if location.bit_size() == 32 && location.bit_offset() == 0 => match location.domain() {
            Domain::Register(family) => Some(family),
            _ => None,
        },
        _ => None,
    }
}
