//! Code Generator (§4.9): the final pipeline stage, turning a function's
//! recovered region graph plus its variables/signature/types into a
//! [`likec::Function`]. Producing readable text from that tree is the
//! external printer's job, not this crate's.

pub mod generator;
pub mod likec;

pub use generator::generate;
pub use likec::{Declaration, Expr, Function, Stmt};
