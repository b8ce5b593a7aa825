//! Architecture back-ends: instruction shapes, calling conventions, and
//! the per-architecture instruction analyzer that lowers decoded
//! instructions into IR (§6, §9's instruction-semantics DSL note).

mod calling_convention;
mod instruction;
pub mod x86_stub;

pub use calling_convention::{select_convention, x86_regs, CallingConvention, ReturnShape};
pub use instruction::Instruction;

use crate::diagnostics::Diagnostics;
use crate::ir::{BasicBlock, TermIdSource};

/// Lowers one decoded [`Instruction`] into IR statements appended to
/// `block`. Implementations must honor the instruction's address
/// alignment, each operand's declared size, and the architecture's
/// per-domain endianness (§6). Invalid or unsupported encodings are not
/// an `Err` — per §7 they degrade to an `InlineAssembly` statement plus a
/// warning on `diagnostics`.
pub trait InstructionAnalyzer {
    /// Appends the IR lowering of `instruction` to `block`.
    fn analyze(&self, instruction: &Instruction, block: &mut BasicBlock, ids: &mut TermIdSource, diagnostics: &mut Diagnostics);
}
