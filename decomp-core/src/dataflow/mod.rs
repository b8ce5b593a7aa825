//! Abstract interpretation over the IR: bit-lattice values, reaching
//! definitions, stack-offset tracking, and the fixed-point driver that
//! ties them together (§4.3).

mod abstract_value;
mod analyzer;
mod reaching_definitions;
mod simulation;

pub use abstract_value::AbstractValue;
pub use analyzer::{analyze, Dataflow, MAX_ITERATIONS};
pub use reaching_definitions::{Chunk, ReachingDefinitions};
pub use simulation::{StackAttribute, TermValue};
