//! Disjoint-set forest over [`TypeInfo`] payloads, one node per IR term.

use rustc_hash::FxHashMap;

use crate::error::TypeError;
use crate::type_info::TypeInfo;

/// Stable identifier for a node in a [`TypeTable`].
///
/// Opaque outside this crate; callers obtain one per term from
/// `TypeTable::insert` and thread it alongside the term handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

struct Node {
    parent: u32,
    rank: u32,
    info: TypeInfo,
}

/// A union-find forest with path compression and union-by-rank, payload
/// mutated only on each set's representative — the shape prescribed by
/// the design notes for "Union-find types".
#[derive(Default)]
pub struct TypeTable {
    nodes: Vec<Node>,
    /// Back-reference used only for diagnostics (term index -> TypeId),
    /// kept as a plain map rather than on `Node` since most callers never
    /// need it.
    labels: FxHashMap<u32, String>,
}

impl TypeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        TypeTable { nodes: Vec::new(), labels: FxHashMap::default() }
    }

    /// Inserts a fresh, unconstrained node of the given bit size and
    /// returns its id.
    pub fn insert(&mut self, size: u32) -> TypeId {
        let id = self.nodes.len() as u32;
        self.nodes.push(Node { parent: id, rank: 0, info: TypeInfo::unconstrained(size) });
        TypeId(id)
    }

    /// Attaches a debug label to a type id (e.g. the term's textual form),
    /// purely for error messages and pretty-printing.
    pub fn set_label(&mut self, id: TypeId, label: impl Into<String>) {
        self.labels.insert(id.0, label.into());
    }

    fn label_of(&self, id: TypeId) -> String {
        self.labels.get(&id.0).cloned().unwrap_or_else(|| format!("t{}", id.0))
    }

    fn check(&self, id: TypeId) -> Result<(), TypeError> {
        if (id.0 as usize) < self.nodes.len() {
            Ok(())
        } else {
            Err(TypeError::UnknownTypeId(id))
        }
    }

    /// Finds the representative of `id`'s set, compressing the path.
    pub fn find(&mut self, id: TypeId) -> TypeId {
        let mut x = id.0;
        while self.nodes[x as usize].parent != x {
            let grandparent = self.nodes[self.nodes[x as usize].parent as usize].parent;
            self.nodes[x as usize].parent = grandparent;
            x = grandparent;
        }
        TypeId(x)
    }

    /// Read-only access to a node's current facts (resolves to the
    /// representative first).
    pub fn info(&mut self, id: TypeId) -> &TypeInfo {
        let rep = self.find(id);
        &self.nodes[rep.0 as usize].info
    }

    /// Mutable access to a node's facts without unioning, used by
    /// propagation rules that learn a fact about a single term (e.g. "this
    /// operand of `and` is an integer") rather than unifying two terms.
    pub fn info_mut(&mut self, id: TypeId) -> &mut TypeInfo {
        let rep = self.find(id);
        &mut self.nodes[rep.0 as usize].info
    }

    /// Unifies the sets containing `a` and `b`. Idempotent: unifying a
    /// node with itself, or re-unifying two already-unified nodes, makes
    /// no further change and returns `false`.
    ///
    /// The surviving representative's payload is the monotone join of
    /// both prior payloads (§8 testable property 7).
    pub fn unify(&mut self, a: TypeId, b: TypeId) -> Result<bool, TypeError> {
        self.check(a)?;
        self.check(b)?;

        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return Ok(false);
        }

        let (small, big) = {
            let rank_a = self.nodes[ra.0 as usize].rank;
            let rank_b = self.nodes[rb.0 as usize].rank;
            if rank_a < rank_b { (ra, rb) } else { (rb, ra) }
        };

        let small_info = self.nodes[small.0 as usize].info.clone();
        let changed = self.nodes[big.0 as usize].info.merge_from(&small_info);

        self.nodes[small.0 as usize].parent = big.0;
        if self.nodes[small.0 as usize].rank == self.nodes[big.0 as usize].rank {
            self.nodes[big.0 as usize].rank += 1;
        }

        Ok(changed)
    }

    /// Returns `true` if any node in the table still has its `changed`
    /// flag set (the fixed-point loop's stopping condition).
    pub fn has_pending_changes(&self) -> bool {
        self.nodes.iter().any(|n| n.info.changed)
    }

    /// Clears every node's `changed` flag, marking the current iteration
    /// as consumed.
    pub fn clear_changed(&mut self) {
        for n in &mut self.nodes {
            n.info.changed = false;
        }
    }

    /// Number of nodes ever allocated (not the number of distinct sets).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no nodes have been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Human-readable description of a type id's current set, for error
    /// messages (`TypeError::Incompatible`).
    pub fn describe(&mut self, id: TypeId) -> String {
        let label = self.label_of(id);
        let info = self.info(id).clone();
        format!(
            "{label}(size={}, int={}, float={}, ptr={})",
            info.size, info.is_integer, info.is_float, info.is_pointer
        )
    }
}
