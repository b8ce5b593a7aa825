//! Top-level error type for the decompilation core (§7).

use thiserror::Error;

/// Errors the core can surface to its caller. Most pipeline-internal
/// trouble (invalid instructions, budget exhaustion) is recovered locally
/// and only recorded in [`crate::diagnostics::Diagnostics`]; these
/// variants are for conditions that abort the job outright.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The image parser rejected the input; decompilation aborts before
    /// any IR work starts.
    #[error("failed to parse input image: {reason}")]
    ParseError {
        /// Why the parser rejected the input.
        reason: String,
    },
    /// Cooperative cancellation unwound the current pass.
    #[error("decompilation cancelled during pass '{pass}'")]
    Cancelled {
        /// The pass that was running when cancellation was observed.
        pass: &'static str,
    },
    /// A later pass was asked to run over a Context whose prerequisite
    /// pass never completed.
    #[error("pass '{pass}' requires '{dependency}' to have completed first")]
    MissingDependency {
        /// The pass that could not run.
        pass: &'static str,
        /// The prerequisite pass whose output was missing.
        dependency: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let e = CoreError::ParseError { reason: "bad magic".into() };
        assert_eq!(e.to_string(), "failed to parse input image: bad magic");
    }
}
