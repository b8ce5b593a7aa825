//! [`Driver`]: orchestrates the ten passes of §2 over one [`Context`] in
//! their dependency order, honoring cooperative cancellation at function
//! boundaries (§5).

use rustc_hash::FxHashMap;

use crate::arch::{select_convention, x86_regs, Instruction};
use crate::cancel::CancellationToken;
use crate::codegen;
use crate::context::{Context, FunctionAnalysis};
use crate::convention_hooks;
use crate::dataflow;
use crate::error::CoreError;
use crate::image::Image;
use crate::ir::{BlockAddress, MemoryLocation};
use crate::irgen;
use crate::liveness;
use crate::registry::Registry;
use crate::signatures;
use crate::structural;
use crate::types as type_analysis;
use crate::variables;

/// Drives one decompilation job: IR generation, then per-function
/// isolation and analysis, over a [`Registry`] of architecture back-ends.
pub struct Driver {
    registry: Registry,
    cancellation: CancellationToken,
}

impl Driver {
    /// A driver over `registry`, cancellable through `cancellation`.
    pub fn new(registry: Registry, cancellation: CancellationToken) -> Driver {
        Driver { registry, cancellation }
    }

    /// Runs the full pipeline over `instructions` decoded from `image`,
    /// returning the populated [`Context`]. Entries are every address
    /// the IR generator's instructions span that is either the first
    /// instruction or a recorded call target; callers that already know
    /// their entry points can instead drive the passes directly.
    pub fn run(&self, image: Image, instructions: &[Instruction]) -> Result<Context, CoreError> {
        let platform = image.platform();
        let mut context = Context::new(image);

        let analyzer = self
            .registry
            .analyzer_for(platform.architecture)
            .ok_or_else(|| CoreError::ParseError { reason: format!("no instruction analyzer registered for {:?}", platform.architecture) })?;

        let mut program = irgen::generate(instructions, analyzer.as_ref(), context.image.as_ref().unwrap(), &mut context.diagnostics);

        let entries: Vec<BlockAddress> = entry_points(&program, instructions);

        // Signatures depend on every function's calling convention and
        // liveness already being known, so functions are isolated and
        // instrumented in one pass before the whole-program signature
        // fixed point runs.
        let mut functions = FxHashMap::default();
        let mut conventions = FxHashMap::default();
        for &entry in &entries {
            self.cancellation.poll("isolate")?;
            let function = crate::ir::isolate(&program, entry);
            let symbol = context.image.as_ref().unwrap().symbol_at(entry);
            let convention = select_convention(platform.architecture, platform.os, symbol, None);
            convention_hooks::instrument(&mut program, &function, &convention);
            conventions.insert(entry, convention.clone());
            functions.insert(entry, function);
        }

        let ordered_functions: Vec<_> = entries.iter().map(|e| functions[e].clone()).collect();
        let signatures = signatures::analyze_all(&program, &ordered_functions, |f| conventions[&f.entry()].clone());
        let signature_by_entry: FxHashMap<BlockAddress, signatures::Signature> = entries.iter().cloned().zip(signatures).collect();

        for &entry in &entries {
            self.cancellation.poll("function")?;
            let function = functions.remove(&entry).expect("isolated above");
            let convention = conventions.remove(&entry).expect("selected above");

            let stack_pointer = MemoryLocation::register(x86_regs::SP, 0, platform.architecture.pointer_size());
            let dataflow = dataflow::analyze(&program, &function, stack_pointer);
            let liveness = liveness::analyze(&program, &function);
            let signature = signature_by_entry.get(&entry).cloned().unwrap_or_else(|| signatures::analyze_signature(&program, &function, &convention));
            let call_sites: FxHashMap<BlockAddress, signatures::CallSite> =
                signatures::analyze_call_sites(&program, &function, &convention, |target| signature_by_entry.get(&target).cloned()).into_iter().map(|site| (site.block, site)).collect();
            let vars = variables::reconstruct(&program, &function);
            let region = structural::analyze(&program, &function);
            let (mut type_table, type_assignment) = type_analysis::analyze(&program, &function);
            let ast = codegen::generate(&program, &function, &region, &vars, &signature, &mut type_table, &type_assignment, &call_sites);

            context.functions.insert(
                entry,
                FunctionAnalysis {
                    function: Some(function),
                    convention: Some(convention),
                    dataflow: Some(dataflow),
                    liveness: Some(liveness),
                    signature: Some(signature),
                    call_sites,
                    variables: Some(vars),
                    region: Some(region),
                    types: Some((type_table, type_assignment)),
                    ast: Some(ast),
                },
            );
        }

        context.program = Some(program);
        Ok(context)
    }
}

fn entry_points(program: &crate::ir::Program, instructions: &[Instruction]) -> Vec<BlockAddress> {
    let mut entries: Vec<BlockAddress> = program.called_addresses().collect();
    if let Some(first) = instructions.first() {
        if !entries.contains(&first.address()) {
            entries.push(first.address());
        }
    }
    entries.retain(|addr| program.has_block(*addr));
    entries.sort();
    entries.dedup();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_stub::{encode_mov_reg_imm32, encode_ret, StubAnalyzer};
    use crate::image::{Endianness, OperatingSystem, Platform};
    use crate::image::Architecture as Arch;

    #[test]
    fn drives_a_single_straight_line_function_end_to_end() {
        let platform = Platform { architecture: Arch::I386, os: OperatingSystem::Windows, endianness: Endianness::Little };
        let image = Image::new(platform, vec![], vec![], vec![]);

        let bytes = encode_mov_reg_imm32(x86_regs::AX, 7);
        let mut instructions = vec![Instruction::new(0, bytes)];
        let ret_addr = instructions[0].end();
        instructions.push(Instruction::new(ret_addr, encode_ret()));

        let mut registry = Registry::new();
        registry.register(Arch::I386, || Box::new(StubAnalyzer::x86_32()));
        let driver = Driver::new(registry, CancellationToken::new());

        let context = driver.run(image, &instructions).expect("pipeline succeeds");
        assert!(context.program.is_some());
        assert_eq!(context.functions.len(), 1);
        let analysis = context.functions.values().next().unwrap();
        assert!(analysis.ast.is_some());
    }
}
