//! [`Context`]: the mutable state one decompilation job accumulates as
//! the pass pipeline runs (§3 Lifecycles, §6 "the core exposes, on the
//! Context: program CFG, functions, dataflow, variables, signatures,
//! types, region graphs, AST").

use rustc_hash::FxHashMap;

use decomp_types::TypeTable;

use crate::arch::CallingConvention;
use crate::codegen::likec;
use crate::dataflow::Dataflow;
use crate::diagnostics::Diagnostics;
use crate::image::Image;
use crate::ir::{BlockAddress, Function, Program};
use crate::liveness::Liveness;
use crate::signatures::{CallSite, Signature};
use crate::structural::Region;
use crate::types::TypeAssignment;
use crate::variables::Variables;

/// Everything computed for one isolated function, accumulated pass by
/// pass. A field is `None` until its producing pass has run; a pass that
/// is cancelled mid-function leaves the function's entry in
/// [`Context::functions`] with only the fields completed so far (§5
/// Cancellation: "previous pass's outputs intact, current pass's
/// outputs absent or incomplete but discardable").
#[derive(Default)]
pub struct FunctionAnalysis {
    /// The isolated block set.
    pub function: Option<Function>,
    /// The calling convention selected for this function.
    pub convention: Option<CallingConvention>,
    /// Reaching-definitions/abstract-value fixed point.
    pub dataflow: Option<Dataflow>,
    /// Backwards liveness fixed point.
    pub liveness: Option<Liveness>,
    /// Recovered formal/return signature.
    pub signature: Option<Signature>,
    /// Call sites within this function, keyed by the calling block.
    pub call_sites: FxHashMap<BlockAddress, CallSite>,
    /// Recovered variables.
    pub variables: Option<Variables>,
    /// Recovered region tree.
    pub region: Option<Region>,
    /// Type lattice and per-term assignment.
    pub types: Option<(TypeTable, TypeAssignment)>,
    /// Emitted LikeC AST.
    pub ast: Option<likec::Function>,
}

/// The mutable state of one decompilation job: one [`Image`], one
/// whole-image [`Program`], and one [`FunctionAnalysis`] per isolated
/// function, keyed by entry address.
#[derive(Default)]
pub struct Context {
    /// The input image, set at construction and read-only thereafter.
    pub image: Option<Image>,
    /// Diagnostics collected across every pass run so far.
    pub diagnostics: Diagnostics,
    /// The whole-image control-flow graph.
    pub program: Option<Program>,
    /// Per-function analysis results, keyed by entry address.
    pub functions: FxHashMap<BlockAddress, FunctionAnalysis>,
}

impl Context {
    /// A fresh context over `image`, with no passes run yet.
    pub fn new(image: Image) -> Context {
        Context { image: Some(image), diagnostics: Diagnostics::new(), program: None, functions: FxHashMap::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Endianness, OperatingSystem, Platform};

    #[test]
    fn fresh_context_has_no_program_until_irgen_runs() {
        let platform = Platform { architecture: crate::image::Architecture::I386, os: OperatingSystem::Windows, endianness: Endianness::Little };
        let image = Image::new(platform, vec![], vec![], vec![]);
        let ctx = Context::new(image);
        assert!(ctx.program.is_none());
        assert!(ctx.functions.is_empty());
    }
}
