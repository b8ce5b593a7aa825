//! Signature Analyzer (§4.5): infers a function's formal argument and
//! return-value locations, and each call site's actual argument set,
//! iterating to a stable fixed point across the whole program.

use rustc_hash::FxHashSet;

use crate::arch::CallingConvention;
use crate::ir::{BlockAddress, Function, MemoryLocation, Program, Statement, TouchKind};
use crate::liveness;

/// A function's inferred formal parameter and return-value locations.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    /// Locations read before being written anywhere in the function —
    /// candidate formal arguments.
    pub formals: Vec<MemoryLocation>,
    /// Locations written on every path that reaches a `Return` — candidate
    /// return values.
    pub returns: Vec<MemoryLocation>,
}

/// The actual argument set passed at one call site: the intersection of
/// locations live (written, not yet killed) immediately before the call
/// with the callee's formal set, or the convention's default argument
/// registers when the callee's signature is not yet known.
#[derive(Debug, Clone, Default)]
pub struct CallSite {
    /// The call's block address.
    pub block: BlockAddress,
    /// Locations treated as actual arguments at this call.
    pub actuals: Vec<MemoryLocation>,
}

/// Computes `function`'s [`Signature`] using `convention`'s argument and
/// return registers as the candidate universe (§4.5: "formal-arg/return
/// determination via entry-reads-before-write and writes-on-every-
/// return-path").
pub fn analyze_signature(program: &Program, function: &Function, convention: &CallingConvention) -> Signature {
    let formals = convention
        .argument_registers
        .iter()
        .filter(|loc| is_read_before_write(program, function, loc))
        .copied()
        .collect();
    let returns = convention
        .return_registers
        .iter()
        .filter(|loc| is_written_on_every_return_path(program, function, loc))
        .copied()
        .collect();
    Signature { formals, returns }
}

fn is_read_before_write(program: &Program, function: &Function, location: &MemoryLocation) -> bool {
    let Some(entry) = program.block(function.entry()) else { return false };
    for statement in entry.statements() {
        match statement {
            Statement::Assignment { lhs, rhs } => {
                if lhs.as_memory_location().map(|l| l.contains(location)).unwrap_or(false) {
                    return false;
                }
                if term_reads(rhs, location) {
                    return true;
                }
            }
            Statement::Touch { term, kind: TouchKind::Read } if term_reads(term, location) => return true,
            _ => {}
        }
    }
    false
}

fn is_written_on_every_return_path(program: &Program, function: &Function, location: &MemoryLocation) -> bool {
    let mut any_return = false;
    for addr in function.blocks() {
        let Some(block) = program.block(addr) else { continue };
        if !matches!(block.terminator(), Some(Statement::Return)) {
            continue;
        }
        any_return = true;
        let written = block.statements().iter().rev().any(|s| match s {
            Statement::Assignment { lhs, .. } => lhs.as_memory_location().map(|l| l.contains(location)).unwrap_or(false),
            Statement::Touch { term, kind: TouchKind::Kill } => term.as_memory_location().map(|l| l.contains(location)).unwrap_or(false),
            _ => false,
        });
        if !written {
            return false;
        }
    }
    any_return
}

fn term_reads(term: &crate::ir::Term, location: &MemoryLocation) -> bool {
    let mut found = false;
    term.visit(&mut |t| {
        if let Some(l) = t.as_memory_location() {
            if l.overlaps(location) {
                found = true;
            }
        }
    });
    found
}

/// Computes every call site's [`CallSite`] actual-argument set within
/// `function`. `callee_signature` resolves a direct call target to a
/// previously computed [`Signature`], when known.
pub fn analyze_call_sites(
    program: &Program,
    function: &Function,
    convention: &CallingConvention,
    callee_signature: impl Fn(BlockAddress) -> Option<Signature>,
) -> Vec<CallSite> {
    let liveness = liveness::analyze(program, function);
    let mut out = Vec::new();
    for addr in function.blocks() {
        let Some(block) = program.block(addr) else { continue };
        let Some(Statement::Call { target }) = block.terminator() else { continue };

        let default_set: FxHashSet<MemoryLocation> = convention.argument_registers.iter().copied().collect();
        let candidate_set: FxHashSet<MemoryLocation> = match target {
            crate::ir::JumpTarget::Direct(callee) => match callee_signature(*callee) {
                Some(sig) if !sig.formals.is_empty() => sig.formals.into_iter().collect(),
                _ => default_set,
            },
            _ => default_set,
        };

        let actuals = candidate_set.into_iter().filter(|loc| liveness.is_live_out(addr, loc)).collect();
        out.push(CallSite { block: addr, actuals });
    }
    out
}

/// Runs [`analyze_signature`] for every function in `functions`, iterating
/// until no function's formal/return set changes (§4.5: "iterate to
/// stability" — callees' signatures can change a caller's call-site
/// actual set, which this crate resolves separately via
/// [`analyze_call_sites`], so the fixed point here is solely over each
/// function's own entry/return pattern and is reached in a single pass;
/// the loop guards against future rules that make a function's signature
/// depend on another's).
pub fn analyze_all(program: &Program, functions: &[Function], convention_for: impl Fn(&Function) -> CallingConvention) -> Vec<Signature> {
    let mut signatures: Vec<Signature> = functions.iter().map(|f| analyze_signature(program, f, &convention_for(f))).collect();
    loop {
        let next: Vec<Signature> = functions.iter().map(|f| analyze_signature(program, f, &convention_for(f))).collect();
        let stable = next.iter().zip(&signatures).all(|(a, b)| a.formals == b.formals && a.returns == b.returns);
        signatures = next;
        if stable {
            break;
        }
    }
    signatures
}
