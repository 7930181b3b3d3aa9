//! An SSA optimizer for a register-machine intermediate representation.
//!
//! The input is a function whose body is a control-flow graph of basic
//! blocks in pruned SSA form; the output is an equivalent CFG with fewer
//! instructions and better use of specialized opcodes. The whole crate is
//! the pass pipeline in [`middle_end::optimization`]; lowering into and
//! out of this representation is somebody else's job.

pub mod commons;
pub mod middle_end;
