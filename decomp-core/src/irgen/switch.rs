//! Switch/jump-table recognition (§4.1 step 3).

use crate::ir::{BinaryOperator, JumpTableEntry, Term, TermKind};
use crate::image::{Image, SectionKind};

/// Maximum table entries walked before giving up (§7 Budget exhaustion).
pub const MAX_TABLE_ENTRIES: usize = 65_536;

/// The `base + index*stride` shape extracted from a computed jump target.
struct ArrayAccess {
    base: u64,
    stride: u64,
    entry_size_bits: u32,
}

/// Attempts to match `term` (normally a `Dereference` of a computed jump
/// target) against the `ArrayAccess` pattern: a dereference of `base +
/// index*stride` where `base` and `stride` are both constants.
fn match_array_access(term: &Term) -> Option<ArrayAccess> {
    let TermKind::Dereference { address, .. } = term.kind() else { return None };
    let TermKind::BinaryOp { op: BinaryOperator::Add, left, right } = address.kind() else { return None };

    let (base_term, offset_term) = (left.as_ref(), right.as_ref());
    let base = base_term.as_constant().or_else(|| offset_term.as_constant())?;
    let offset = if base_term.as_constant().is_some() { offset_term } else { base_term };

    let TermKind::BinaryOp { op: BinaryOperator::Mul, left: index_or_stride_a, right: index_or_stride_b } = offset.kind() else { return None };
    let stride = index_or_stride_a.as_constant().or_else(|| index_or_stride_b.as_constant())?;

    Some(ArrayAccess { base, stride, entry_size_bits: term.size() })
}

/// If `term` matches the `ArrayAccess` shape, walks the table through
/// `image`, stopping at [`MAX_TABLE_ENTRIES`] or the first pointer that
/// does not land in a code section (the stand-in, in the absence of a
/// real disassembler, for "verified by trial-disassembly").
pub fn recognize(term: &Term, image: &Image) -> Option<Vec<JumpTableEntry>> {
    let access = match_array_access(term)?;
    let entry_bytes = (access.entry_size_bits / 8).max(1) as usize;

    let mut entries = Vec::new();
    for i in 0..MAX_TABLE_ENTRIES {
        let slot = access.base + (i as u64) * access.stride;
        let candidate = image.read_uint(slot, entry_bytes);
        let looks_valid = image.section_at(candidate).map(|s| s.kind() == SectionKind::Code).unwrap_or(false);
        if !looks_valid {
            break;
        }
        entries.push(JumpTableEntry { address: candidate, block: Some(candidate) });
    }
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Permissions, Platform, Section, Architecture, Endianness, OperatingSystem};
    use crate::ir::{Domain, TermIdSource};

    fn test_image_with_table(table_base: u64, targets: &[u64]) -> Image {
        let mut bytes = Vec::new();
        for t in targets {
            bytes.extend((*t as u32).to_le_bytes());
        }
        let data = Section::new("rdata", table_base, bytes.len() as u64, Permissions::RODATA, SectionKind::Data, bytes);
        let code_start = *targets.iter().min().unwrap();
        let code_end = *targets.iter().max().unwrap() + 0x10;
        let code = Section::new("text", code_start, code_end - code_start, Permissions::CODE, SectionKind::Code, vec![0x90; (code_end - code_start) as usize]);
        let platform = Platform { architecture: Architecture::I386, os: OperatingSystem::Windows, endianness: Endianness::Little };
        Image::new(platform, vec![data, code], vec![], vec![])
    }

    #[test]
    fn recognizes_four_entry_jump_table() {
        let targets = [0x2000u64, 0x2010, 0x2020, 0x2030];
        let image = test_image_with_table(0x3000, &targets);

        let mut ids = TermIdSource::default();
        let index = Term::memory_location_access(&mut ids, crate::ir::MemoryLocation::register(0, 0, 32));
        let stride = Term::constant(&mut ids, 32, 4);
        let offset = Term::binary(&mut ids, BinaryOperator::Mul, index, stride, 32);
        let base = Term::constant(&mut ids, 32, 0x3000);
        let addr = Term::binary(&mut ids, BinaryOperator::Add, base, offset, 32);
        let deref = Term::dereference(&mut ids, addr, Domain::Memory, 32);

        let entries = recognize(&deref, &image).expect("should recognize table");
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].address, 0x2000);
    }

    #[test]
    fn stops_before_first_bogus_pointer() {
        let targets = [0x2000u64, 0x2010];
        let image = test_image_with_table(0x3000, &targets);
        // Pretend there's a third slot holding garbage outside any section.
        let mut bytes = image.sections()[0].read(0x3000, 8);
        bytes.extend([0xFF, 0xFF, 0xFF, 0xFF]);
        let data = Section::new("rdata", 0x3000, bytes.len() as u64, Permissions::RODATA, SectionKind::Data, bytes);
        let code = image.sections()[1].clone();
        let image = Image::new(image.platform(), vec![data, code], vec![], vec![]);

        let mut ids = TermIdSource::default();
        let index = Term::memory_location_access(&mut ids, crate::ir::MemoryLocation::register(0, 0, 32));
        let stride = Term::constant(&mut ids, 32, 4);
        let offset = Term::binary(&mut ids, BinaryOperator::Mul, index, stride, 32);
        let base = Term::constant(&mut ids, 32, 0x3000);
        let addr = Term::binary(&mut ids, BinaryOperator::Add, base, offset, 32);
        let deref = Term::dereference(&mut ids, addr, Domain::Memory, 32);

        let entries = recognize(&deref, &image).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
