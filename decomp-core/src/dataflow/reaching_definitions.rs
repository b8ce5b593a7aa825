//! [`ReachingDefinitions`]: which term(s) last wrote each memory location.
//!
//! Ported from `nc::core::ir::dflow::ReachingDefinitions`, with raw `Term*`
//! pointers replaced by [`TermId`] — the stable identity every term already
//! carries rather than a borrowed reference, since a single definition can
//! legitimately reach from multiple predecessor blocks at once.

use crate::ir::{Domain, MemoryLocation, TermId};

/// A memory location and the term(s) that may have last defined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    location: MemoryLocation,
    definitions: Vec<TermId>,
}

impl Chunk {
    /// The covered location.
    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    /// The terms that may have defined it.
    pub fn definitions(&self) -> &[TermId] {
        &self.definitions
    }
}

/// Reaching-definitions state: a sorted, non-overlapping (within a single
/// flow path) set of location-to-definitions chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachingDefinitions {
    chunks: Vec<Chunk>,
}

impl ReachingDefinitions {
    /// The empty state.
    pub fn new() -> ReachingDefinitions {
        ReachingDefinitions::default()
    }

    /// All chunks, sorted by location.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// True if there are no known definitions at all.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Discards all known definitions (used after an unresolved call or
    /// inline-assembly statement, whose effects this analyzer cannot
    /// track — §4.1's "reaching-definitions state is cleared").
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Records `term` as the (sole) definition of `location`, first
    /// killing any existing definition that overlaps it.
    pub fn add_definition(&mut self, location: MemoryLocation, term: TermId) {
        self.kill_definitions(&location);
        let idx = self.chunks.partition_point(|c| c.location < location);
        self.chunks.insert(idx, Chunk { location, definitions: vec![term] });
    }

    /// Removes every chunk whose location overlaps `location`.
    pub fn kill_definitions(&mut self, location: &MemoryLocation) {
        self.chunks.retain(|c| !c.location.overlaps(location));
        self.self_test();
    }

    /// The subset of chunks overlapping `location`.
    pub fn project(&self, location: &MemoryLocation) -> ReachingDefinitions {
        ReachingDefinitions { chunks: self.chunks.iter().filter(|c| c.location.overlaps(location)).cloned().collect() }
    }

    /// All distinct locations defined within `domain`.
    pub fn defined_memory_locations_within(&self, domain: Domain) -> Vec<MemoryLocation> {
        self.chunks.iter().map(|c| c.location).filter(|l| l.domain() == domain).collect()
    }

    /// Merges `other`'s definitions into `self`: matching locations union
    /// their definition sets (deduplicated and sorted, so two merges of
    /// the same inputs produce identical results — required for the
    /// fixed-point loop to terminate), new locations are inserted in
    /// order.
    pub fn merge(&mut self, other: &ReachingDefinitions) {
        for chunk in &other.chunks {
            match self.chunks.binary_search_by(|c| c.location.cmp(&chunk.location)) {
                Ok(idx) => {
                    for &term in &chunk.definitions {
                        if !self.chunks[idx].definitions.contains(&term) {
                            self.chunks[idx].definitions.push(term);
                        }
                    }
                    self.chunks[idx].definitions.sort();
                }
                Err(idx) => {
                    self.chunks.insert(idx, chunk.clone());
                }
            }
        }
        self.self_test();
    }

    /// Drops every definition for which `pred(location, term)` is true,
    /// then drops chunks left with no definitions.
    pub fn filter_out(&mut self, pred: impl Fn(MemoryLocation, TermId) -> bool) {
        for chunk in &mut self.chunks {
            chunk.definitions.retain(|&t| !pred(chunk.location, t));
        }
        self.chunks.retain(|c| !c.definitions.is_empty());
    }

    fn self_test(&self) {
        debug_assert!(self.chunks.windows(2).all(|w| w[0].location < w[1].location));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TermIdSource;

    fn tid(n: u32) -> TermId {
        let mut ids = TermIdSource::default();
        for _ in 0..n {
            ids.next();
        }
        ids.next()
    }

    #[test]
    fn add_definition_kills_overlapping_prior() {
        let mut rd = ReachingDefinitions::new();
        let loc = MemoryLocation::register(0, 0, 32);
        rd.add_definition(loc, tid(1));
        rd.add_definition(loc, tid(2));
        assert_eq!(rd.project(&loc).chunks().len(), 1);
        assert_eq!(rd.project(&loc).chunks()[0].definitions(), &[tid(2)]);
    }

    #[test]
    fn project_returns_only_overlapping_chunks() {
        let mut rd = ReachingDefinitions::new();
        rd.add_definition(MemoryLocation::register(0, 0, 32), tid(1));
        rd.add_definition(MemoryLocation::register(1, 0, 32), tid(2));
        let projected = rd.project(&MemoryLocation::register(0, 0, 32));
        assert_eq!(projected.chunks().len(), 1);
    }

    #[test]
    fn merge_unions_definitions_at_shared_location() {
        let loc = MemoryLocation::register(0, 0, 32);
        let mut a = ReachingDefinitions::new();
        a.add_definition(loc, tid(1));
        let mut b = ReachingDefinitions::new();
        b.add_definition(loc, tid(2));
        a.merge(&b);
        assert_eq!(a.project(&loc).chunks()[0].definitions().len(), 2);
    }

    #[test]
    fn merge_is_idempotent_for_identical_inputs() {
        let loc = MemoryLocation::register(0, 0, 32);
        let mut a = ReachingDefinitions::new();
        a.add_definition(loc, tid(1));
        let snapshot = a.clone();
        a.merge(&snapshot);
        assert_eq!(a, snapshot);
    }

    #[test]
    fn kill_definitions_removes_subset_overlap() {
        let mut rd = ReachingDefinitions::new();
        rd.add_definition(MemoryLocation::new(Domain::Memory, 0, 32), tid(1));
        rd.kill_definitions(&MemoryLocation::new(Domain::Memory, 16, 8));
        assert!(rd.is_empty());
    }

    #[test]
    fn filter_out_drops_matching_definitions_and_empty_chunks() {
        let mut rd = ReachingDefinitions::new();
        let loc = MemoryLocation::register(2, 0, 32);
        rd.add_definition(loc, tid(1));
        rd.filter_out(|_, _| true);
        assert!(rd.is_empty());
    }

    #[test]
    fn chunks_stay_sorted_by_location() {
        let mut rd = ReachingDefinitions::new();
        rd.add_definition(MemoryLocation::register(5, 0, 32), tid(1));
        rd.add_definition(MemoryLocation::register(1, 0, 32), tid(2));
        rd.add_definition(MemoryLocation::register(3, 0, 32), tid(3));
        let locs: Vec<_> = rd.chunks().iter().map(|c| c.location()).collect();
        let mut sorted = locs.clone();
        sorted.sort();
        assert_eq!(locs, sorted);
    }
}
