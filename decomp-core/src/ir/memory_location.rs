//! [`MemoryLocation`]: the `(domain, bit-offset, bit-size)` triple that
//! identifies abstract storage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace for a [`MemoryLocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    /// Flat addressable RAM.
    Memory,
    /// The current function's stack, addressed relative to a per-function
    /// frame base (not a raw address).
    Stack,
    /// An architectural register family, identified by a small integer
    /// assigned by the architecture back-end (e.g. the index of `eax`'s
    /// register file in x86).
    Register(u16),
}

/// An abstract `(domain, bit-offset, bit-size)` triple.
///
/// Two locations *overlap* iff they share a domain and their
/// `[bit_offset, bit_offset+bit_size)` ranges intersect. One location
/// *contains* another iff same domain and the other's range is a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryLocation {
    domain: Domain,
    bit_offset: i64,
    bit_size: u32,
}

impl MemoryLocation {
    /// Constructs a location. `bit_size` must be positive; a zero-size
    /// location is meaningless and callers should not construct one (the
    /// Dereference evaluation rule which might do so instead yields "no
    /// location").
    pub fn new(domain: Domain, bit_offset: i64, bit_size: u32) -> MemoryLocation {
        debug_assert!(bit_size > 0);
        MemoryLocation { domain, bit_offset, bit_size }
    }

    /// The domain.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Bit offset within the domain.
    pub fn bit_offset(&self) -> i64 {
        self.bit_offset
    }

    /// Size in bits.
    pub fn bit_size(&self) -> u32 {
        self.bit_size
    }

    fn end(&self) -> i64 {
        self.bit_offset + self.bit_size as i64
    }

    /// True iff `self` and `other` share a domain and their bit ranges
    /// intersect.
    pub fn overlaps(&self, other: &MemoryLocation) -> bool {
        self.domain == other.domain && self.bit_offset < other.end() && other.bit_offset < self.end()
    }

    /// True iff `self` and `other` are in the same domain and `other`'s
    /// range is fully inside `self`'s range.
    pub fn contains(&self, other: &MemoryLocation) -> bool {
        self.domain == other.domain && self.bit_offset <= other.bit_offset && other.end() <= self.end()
    }

    /// The stack cell at the given signed byte offset from the frame
    /// base, `size` bits wide. Convenience constructor used throughout
    /// the dataflow analyzer's stack-offset tracking.
    pub fn stack(byte_offset: i64, size: u32) -> MemoryLocation {
        MemoryLocation::new(Domain::Stack, byte_offset * 8, size)
    }

    /// The RAM cell at the given byte address, `size` bits wide.
    pub fn memory(byte_address: u64, size: u32) -> MemoryLocation {
        MemoryLocation::new(Domain::Memory, byte_address as i64 * 8, size)
    }

    /// The register cell for the given register-family id, `size` bits
    /// wide starting at `bit_offset` within that family (nonzero for
    /// sub-registers like `ah`/`al`).
    pub fn register(family: u16, bit_offset: i64, size: u32) -> MemoryLocation {
        MemoryLocation::new(Domain::Register(family), bit_offset, size)
    }
}

impl fmt::Display for MemoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}:{}]", self.domain, self.bit_offset, self.bit_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_requires_same_domain() {
        let a = MemoryLocation::new(Domain::Memory, 0, 32);
        let b = MemoryLocation::new(Domain::Stack, 0, 32);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn overlap_detects_partial_intersection() {
        let a = MemoryLocation::new(Domain::Memory, 0, 32);
        let b = MemoryLocation::new(Domain::Memory, 16, 32);
        assert!(a.overlaps(&b));
        let c = MemoryLocation::new(Domain::Memory, 32, 32);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn contains_is_strict_subset() {
        let outer = MemoryLocation::new(Domain::Register(0), 0, 32);
        let inner = MemoryLocation::new(Domain::Register(0), 0, 8);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }
}
