//! Explicitly-constructed registry of architecture back-ends (§9's
//! redesign note: "Global state (parser/architecture singletons)...
//! should be replaced by an explicitly-constructed `Registry`").
//!
//! The instruction-analyzer *object* is deliberately not cached here —
//! §5 specifies it as per-thread, holding private decode state — so the
//! registry holds factories and a [`Driver`](crate::driver::Driver)
//! instantiates a fresh one per job.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::arch::x86_stub::StubAnalyzer;
use crate::arch::InstructionAnalyzer;
use crate::image::Architecture;

/// Builds a boxed, per-call fresh instruction analyzer.
pub type AnalyzerFactory = fn() -> Box<dyn InstructionAnalyzer + Send>;

/// Process-global, immutable-after-init table of architecture back-ends
/// (§5 "Shared resources").
pub struct Registry {
    analyzers: FxHashMap<Architecture, AnalyzerFactory>,
}

impl Registry {
    /// An empty registry with no architectures registered.
    pub fn new() -> Registry {
        Registry { analyzers: FxHashMap::default() }
    }

    /// The registry pre-populated with the stub x86-32/x86-64 analyzers
    /// this core ships (§1 Non-goals: no general-purpose decoder).
    pub fn with_defaults() -> Registry {
        let mut registry = Registry::new();
        registry.register(Architecture::I386, || Box::new(StubAnalyzer::x86_32()));
        registry.register(Architecture::X8664, || Box::new(StubAnalyzer::x86_64()));
        registry
    }

    /// Registers a factory for `architecture`, replacing any prior one.
    pub fn register(&mut self, architecture: Architecture, factory: AnalyzerFactory) {
        self.analyzers.insert(architecture, factory);
    }

    /// Instantiates a fresh analyzer for `architecture`, if registered.
    pub fn analyzer_for(&self, architecture: Architecture) -> Option<Box<dyn InstructionAnalyzer + Send>> {
        self.analyzers.get(&architecture).map(|factory| factory())
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

/// The default registry, built once and shared by tests and the CLI
/// shim (SPEC_FULL §2 "Once-init globals").
pub static DEFAULT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::with_defaults);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_i386_and_x86_64() {
        let registry = Registry::with_defaults();
        assert!(registry.analyzer_for(Architecture::I386).is_some());
        assert!(registry.analyzer_for(Architecture::X8664).is_some());
        assert!(registry.analyzer_for(Architecture::ArmLe).is_none());
    }

    #[test]
    fn default_registry_singleton_is_usable() {
        assert!(DEFAULT_REGISTRY.analyzer_for(Architecture::I386).is_some());
    }
}
