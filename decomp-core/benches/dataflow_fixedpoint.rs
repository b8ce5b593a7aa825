use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use decomp_core::arch::x86_stub::{encode_add_reg_reg, encode_mov_reg_imm32, encode_ret, StubAnalyzer};
use decomp_core::arch::{x86_regs, Instruction};
use decomp_core::dataflow;
use decomp_core::diagnostics::Diagnostics;
use decomp_core::image::{Architecture, Endianness, Image, OperatingSystem, Platform};
use decomp_core::ir::{isolate, MemoryLocation};
use decomp_core::irgen;

fn straight_line_chain(len: usize) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(len + 1);
    let mut address = 0u64;
    let seed = Instruction::new(address, encode_mov_reg_imm32(x86_regs::AX, 1));
    address = seed.end();
    instructions.push(seed);
    for i in 0..len {
        let (dst, src) = if i % 2 == 0 { (x86_regs::CX, x86_regs::AX) } else { (x86_regs::AX, x86_regs::CX) };
        let instruction = Instruction::new(address, encode_add_reg_reg(dst, src));
        address = instruction.end();
        instructions.push(instruction);
    }
    instructions.push(Instruction::new(address, encode_ret()));
    instructions
}

fn bench_reaching_definitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("reaching_definitions");
    let image = Image::new(Platform { architecture: Architecture::I386, os: OperatingSystem::Windows, endianness: Endianness::Little }, vec![], vec![], vec![]);
    let analyzer = StubAnalyzer::x86_32();

    for &len in &[8usize, 64, 256] {
        let instructions = straight_line_chain(len);
        let mut diagnostics = Diagnostics::new();
        let program = irgen::generate(&instructions, &analyzer, &image, &mut diagnostics);
        let function = isolate(&program, 0);
        let stack_pointer = MemoryLocation::register(x86_regs::SP, 0, 32);

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("chain", len), &(program, function), |b, (program, function)| {
            b.iter(|| dataflow::analyze(black_box(program), black_box(function), stack_pointer));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reaching_definitions);
criterion_main!(benches);
