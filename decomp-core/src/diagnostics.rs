//! Structured diagnostics collection, standing in for a logging crate.
//!
//! The core has no source text to attach spans to — its "locations" are
//! instruction addresses and pass names — so diagnostics are collected
//! here rather than emitted through `log`/`tracing`, in the same spirit as
//! a compiler front-end's diagnostic bag.

use std::io::Write;

use serde::{Deserialize, Serialize};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Severity of a collected [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Informational; does not affect correctness of later passes.
    Note,
    /// A pass degraded to a conservative default or skipped something.
    Warning,
    /// A pass could not proceed at all for this input (but the rest of
    /// the pipeline may still run; see §7).
    Error,
}

/// One diagnostic: a message, its severity, the pass that raised it, and
/// the instruction address it concerns, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Which pass raised this (e.g. `"irgen"`, `"dataflow"`).
    pub source: &'static str,
    /// Human-readable message.
    pub message: String,
    /// The instruction or block address this concerns, if any.
    pub address: Option<u64>,
}

impl Diagnostic {
    /// A warning-severity diagnostic.
    pub fn warning(source: &'static str, message: impl Into<String>) -> Diagnostic {
        Diagnostic { severity: Severity::Warning, source, message: message.into(), address: None }
    }

    /// An error-severity diagnostic.
    pub fn error(source: &'static str, message: impl Into<String>) -> Diagnostic {
        Diagnostic { severity: Severity::Error, source, message: message.into(), address: None }
    }

    /// A note-severity diagnostic.
    pub fn note(source: &'static str, message: impl Into<String>) -> Diagnostic {
        Diagnostic { severity: Severity::Note, source, message: message.into(), address: None }
    }

    /// Attaches the address this diagnostic concerns.
    pub fn at(mut self, address: u64) -> Diagnostic {
        self.address = Some(address);
        self
    }
}

/// An ordered collection of diagnostics raised across a decompilation job.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty collector.
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Records a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// All collected diagnostics, in emission order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// True if any diagnostic at `Error` severity was collected.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no diagnostics were collected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every diagnostic to stderr, colorized by severity.
    pub fn emit_to_stderr(&self) -> std::io::Result<()> {
        let mut stream = StandardStream::stderr(ColorChoice::Auto);
        for d in &self.entries {
            let mut spec = ColorSpec::new();
            spec.set_fg(Some(match d.severity {
                Severity::Note => Color::Cyan,
                Severity::Warning => Color::Yellow,
                Severity::Error => Color::Red,
            }));
            stream.set_color(&spec)?;
            write!(stream, "[{:?}] {}: ", d.severity, d.source)?;
            stream.reset()?;
            match d.address {
                Some(addr) => writeln!(stream, "{} (at 0x{addr:x})", d.message)?,
                None => writeln!(stream, "{}", d.message)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_is_false_until_an_error_is_pushed() {
        let mut d = Diagnostics::new();
        assert!(!d.has_errors());
        d.push(Diagnostic::warning("irgen", "skipped opcode"));
        assert!(!d.has_errors());
        d.push(Diagnostic::error("irgen", "fatal"));
        assert!(d.has_errors());
    }

    #[test]
    fn at_attaches_address() {
        let d = Diagnostic::warning("irgen", "bad opcode").at(0x4010);
        assert_eq!(d.address, Some(0x4010));
    }

    #[test]
    fn serializes_round_trip() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error("dataflow", "did not converge").at(0x1000));
        let json = serde_json::to_string(&diags).unwrap();
        let back: Diagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries().len(), 1);
    }
}
