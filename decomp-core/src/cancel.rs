//! Cooperative cancellation (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CoreError;

/// A cheaply cloneable, shareable cancellation flag. A pass polls it at
/// coarse boundaries (once per basic block, once per function) and
/// unwinds with [`CoreError::Cancelled`] if it is set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A fresh, not-yet-cancelled token.
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Requests cancellation. Visible to every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True if [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Polls the token, returning `Err(Cancelled)` for `pass` if it has
    /// been cancelled.
    pub fn poll(&self, pass: &'static str) -> Result<(), CoreError> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled { pass })
        } else {
            Ok(())
        }
    }
}
