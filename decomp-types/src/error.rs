//! Errors raised while unifying or querying the type lattice.

use thiserror::Error;

use crate::union_find::TypeId;

/// Errors that can occur while operating on the type table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A [`TypeId`] was used that does not belong to the table it was
    /// passed to (e.g. mixing ids from two different functions' tables).
    #[error("unknown type id: {0:?}")]
    UnknownTypeId(TypeId),

    /// Two incompatible concrete categories were unified (e.g. a term
    /// proven to be a float unified with a term proven to be a pointer).
    #[error("cannot unify incompatible types: {left} and {right}")]
    Incompatible {
        /// Human-readable description of the left operand's category.
        left: String,
        /// Human-readable description of the right operand's category.
        right: String,
    },
}
