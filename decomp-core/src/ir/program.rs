//! [`Program`]: the set of basic blocks discovered across the whole image,
//! plus the called-address seeds the Function Isolator consumes.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::block::BasicBlock;
use super::statement::BlockAddress;
use super::term::TermIdSource;

/// The whole-image control-flow graph produced by the IR Generator
/// ([MODULE] IR Generator), before it is partitioned into functions.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Program {
    blocks: FxHashMap<BlockAddress, BasicBlock>,
    called_addresses: FxHashSet<BlockAddress>,
    term_ids: TermIdSource,
}

impl Program {
    /// An empty program.
    pub fn new() -> Program {
        Program::default()
    }

    /// The term-id allocator shared by every statement lowered into this
    /// program (so ids stay unique program-wide).
    pub fn term_ids(&mut self) -> &mut TermIdSource {
        &mut self.term_ids
    }

    /// Inserts or replaces the block at `address`.
    pub fn insert_block(&mut self, address: BlockAddress, block: BasicBlock) {
        self.blocks.insert(address, block);
    }

    /// Looks up the block that is a control point at `address`, creating
    /// an empty one if absent (the IR Generator materializes a block the
    /// first time it is targeted by a jump, whether or not it has been
    /// visited by linear sweep yet).
    pub fn block_mut(&mut self, address: BlockAddress) -> &mut BasicBlock {
        self.blocks.entry(address).or_insert_with(|| BasicBlock::at(address))
    }

    /// Read-only lookup.
    pub fn block(&self, address: BlockAddress) -> Option<&BasicBlock> {
        self.blocks.get(&address)
    }

    /// True if a control point exists at `address`.
    pub fn has_block(&self, address: BlockAddress) -> bool {
        self.blocks.contains_key(&address)
    }

    /// All control-point addresses.
    pub fn addresses(&self) -> impl Iterator<Item = BlockAddress> + '_ {
        self.blocks.keys().copied()
    }

    /// Iterates all blocks, address-sorted for deterministic output.
    pub fn blocks_sorted(&self) -> Vec<(BlockAddress, &BasicBlock)> {
        let mut v: Vec<_> = self.blocks.iter().map(|(a, b)| (*a, b)).collect();
        v.sort_by_key(|(a, _)| *a);
        v
    }

    /// Records `address` as a discovered call target — the seed set the
    /// Function Isolator partitions the program on.
    pub fn record_called_address(&mut self, address: BlockAddress) {
        self.called_addresses.insert(address);
    }

    /// All discovered called addresses.
    pub fn called_addresses(&self) -> impl Iterator<Item = BlockAddress> + '_ {
        self.called_addresses.iter().copied()
    }

    /// Number of blocks currently in the program.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Serializes the whole program to pretty-printed JSON, for test
    /// fixtures and ad hoc debug dumps (the one case where a caller wants
    /// the IR as data rather than as the one-line-per-statement rendering
    /// `Display` gives).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reconstructs a program from a dump produced by [`Program::to_json`].
    pub fn from_json(json: &str) -> serde_json::Result<Program> {
        serde_json::from_str(json)
    }
}

/// Renders every block address-sorted, one after another — the sanity-
/// check printer the source's `nc::common::Printable`/`ReachingDefinitions
/// ::print` instances serve before a real textual back-end exists.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, block) in self.blocks_sorted() {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}
