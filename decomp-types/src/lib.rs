//! Union-find type lattice used by the decompilation core's type analyzer.
//!
//! `decomp-types` is deliberately small and has no knowledge of IR terms,
//! basic blocks, or the rest of the pipeline: it models exactly the type
//! unification problem described by the type analyzer ([MODULE] Type
//! Analyzer) — a disjoint-set forest over [`TypeInfo`] payloads that only
//! ever shrink in size and only ever gain boolean facts.

#![warn(missing_docs)]

mod error;
mod type_info;
mod union_find;

pub use error::TypeError;
pub use type_info::{Signedness, TypeInfo};
pub use union_find::{TypeId, TypeTable};
