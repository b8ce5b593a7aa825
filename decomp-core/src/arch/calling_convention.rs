//! Calling-convention models and selection (§4.2).

use crate::image::{Architecture, OperatingSystem, Symbol};
use crate::ir::{Domain, MemoryLocation};

/// A calling convention: which register cells carry arguments and return
/// values, who cleans up the stack, and which registers a call clobbers.
#[derive(Debug, Clone)]
pub struct CallingConvention {
    /// Convention name, surfaced in diagnostics and tests.
    pub name: &'static str,
    /// Register cells that carry the first N integer/pointer arguments,
    /// in order. Arguments beyond this list are assumed passed on the
    /// stack (modeled as part of `stack_arg_bytes` rather than enumerated
    /// per-slot, since the slot count is call-site-dependent).
    pub argument_registers: Vec<MemoryLocation>,
    /// Register cells that carry the return value (usually one; x86-64
    /// 128-bit struct returns could use two, left as a Vec for that
    /// reason even though every convention modeled here populates one).
    pub return_registers: Vec<MemoryLocation>,
    /// Registers a call clobbers and the caller must treat as killed
    /// (the "volatile"/caller-saved set).
    pub caller_saved: Vec<MemoryLocation>,
    /// Bytes of stack arguments the *callee* pops on return (`ret imm16`
    /// / stdcall `@N` suffix). `0` for cdecl-family conventions where the
    /// caller pops its own arguments.
    pub callee_cleanup_bytes: u32,
}

/// x86 register-family ids used by [`MemoryLocation::register`] below.
/// A real architecture back-end would own a much larger table; this core
/// only needs enough identity to build the conventions' register sets.
pub mod x86_regs {
    /// `eax`/`rax` family.
    pub const AX: u16 = 0;
    /// `ecx`/`rcx` family.
    pub const CX: u16 = 1;
    /// `edx`/`rdx` family.
    pub const DX: u16 = 2;
    /// `ebx`/`rbx` family.
    pub const BX: u16 = 3;
    /// `esp`/`rsp` family — the stack pointer.
    pub const SP: u16 = 4;
    /// `r8` (x86-64 only).
    pub const R8: u16 = 8;
    /// `r9` (x86-64 only).
    pub const R9: u16 = 9;
}

fn reg32(family: u16) -> MemoryLocation {
    MemoryLocation::register(family, 0, 32)
}

fn reg64(family: u16) -> MemoryLocation {
    MemoryLocation::register(family, 0, 64)
}

impl CallingConvention {
    /// `cdecl`, 32-bit x86: no register arguments, caller cleans up,
    /// return value in `eax`.
    pub fn cdecl32() -> CallingConvention {
        CallingConvention {
            name: "cdecl32",
            argument_registers: vec![],
            return_registers: vec![reg32(x86_regs::AX)],
            caller_saved: vec![reg32(x86_regs::AX), reg32(x86_regs::CX), reg32(x86_regs::DX)],
            callee_cleanup_bytes: 0,
        }
    }

    /// `stdcall`, 32-bit x86: like `cdecl32` but the callee pops
    /// `stack_bytes` bytes of arguments on return.
    pub fn stdcall32(stack_bytes: u32) -> CallingConvention {
        CallingConvention { name: "stdcall32", callee_cleanup_bytes: stack_bytes, ..CallingConvention::cdecl32() }
    }

    /// `cdecl`, 16-bit x86.
    pub fn cdecl16() -> CallingConvention {
        CallingConvention {
            name: "cdecl16",
            argument_registers: vec![],
            return_registers: vec![MemoryLocation::register(x86_regs::AX, 0, 16)],
            caller_saved: vec![MemoryLocation::register(x86_regs::AX, 0, 16)],
            callee_cleanup_bytes: 0,
        }
    }

    /// AMD64 System V ABI (Linux/BSD/macOS x86-64): first integer
    /// arguments in `rdi, rsi, rdx, rcx, r8, r9`.
    pub fn amd64_sysv() -> CallingConvention {
        CallingConvention {
            name: "amd64-sysv",
            argument_registers: vec![
                reg64(5), // rdi
                reg64(6), // rsi
                reg64(x86_regs::DX),
                reg64(x86_regs::CX),
                reg64(x86_regs::R8),
                reg64(x86_regs::R9),
            ],
            return_registers: vec![reg64(x86_regs::AX)],
            caller_saved: vec![reg64(x86_regs::AX), reg64(x86_regs::CX), reg64(x86_regs::DX), reg64(x86_regs::R8), reg64(x86_regs::R9)],
            callee_cleanup_bytes: 0,
        }
    }

    /// Microsoft x64 ABI (Windows x86-64): first integer arguments in
    /// `rcx, rdx, r8, r9`.
    pub fn microsoft64() -> CallingConvention {
        CallingConvention {
            name: "microsoft64",
            argument_registers: vec![reg64(x86_regs::CX), reg64(x86_regs::DX), reg64(x86_regs::R8), reg64(x86_regs::R9)],
            return_registers: vec![reg64(x86_regs::AX)],
            caller_saved: vec![reg64(x86_regs::AX), reg64(x86_regs::CX), reg64(x86_regs::DX), reg64(x86_regs::R8), reg64(x86_regs::R9)],
            callee_cleanup_bytes: 0,
        }
    }

    /// ARM AAPCS defaults: first arguments in `r0..r3`.
    pub fn aapcs() -> CallingConvention {
        let args = (0..4).map(|i| MemoryLocation::register(i, 0, 32)).collect();
        CallingConvention {
            name: "aapcs",
            argument_registers: args,
            return_registers: vec![MemoryLocation::register(0, 0, 32)],
            caller_saved: (0..4).map(|i| MemoryLocation::register(i, 0, 32)).collect(),
            callee_cleanup_bytes: 0,
        }
    }

    /// Every register location this convention treats as clobbered by a
    /// call to an unknown callee — used by the Calling-Convention Hooks'
    /// per-call-site `CallAnalyzer` effect (§4.2).
    pub fn clobbered(&self) -> &[MemoryLocation] {
        &self.caller_saved
    }
}

/// Return terminator shape observed by the instruction analyzer, used by
/// the stdcall-detection rule ("a `ret imm16` terminator").
#[derive(Debug, Clone, Copy)]
pub enum ReturnShape {
    /// Plain `ret`.
    Plain,
    /// `ret imm16`, popping `imm16` bytes of arguments.
    PopBytes(u16),
}

/// Selects the calling convention for a function, given its architecture,
/// OS, optional symbol name, and the shape of its return instruction(s),
/// implementing the selection table in §4.2 verbatim:
///
/// - x86-32: symbol suffix `@N` → stdcall32(N); else a `ret imm16`
///   terminator → stdcall32(imm16); else cdecl32.
/// - x86-64: System V or Microsoft64 by OS.
/// - 16-bit: cdecl16.
/// - ARM: AAPCS.
pub fn select_convention(
    architecture: Architecture,
    os: OperatingSystem,
    symbol: Option<&Symbol>,
    return_shape: Option<ReturnShape>,
) -> CallingConvention {
    match architecture {
        Architecture::I386 => {
            if let Some(bytes) = symbol.and_then(Symbol::stdcall_arg_bytes) {
                return CallingConvention::stdcall32(bytes);
            }
            if let Some(ReturnShape::PopBytes(n)) = return_shape {
                return CallingConvention::stdcall32(n as u32);
            }
            CallingConvention::cdecl32()
        }
        Architecture::X8664 => match os {
            OperatingSystem::Windows => CallingConvention::microsoft64(),
            OperatingSystem::SystemV | OperatingSystem::Unknown => CallingConvention::amd64_sysv(),
        },
        Architecture::I8086 => CallingConvention::cdecl16(),
        Architecture::ArmLe | Architecture::ArmBe => CallingConvention::aapcs(),
    }
}
