//! Errors that can occur while constructing, loading, or executing programs.
//!
//! All of these are fatal to the current run: the engine never retries and
//! never catches them itself; they propagate to whoever called `run` or
//! `step`. Halting and breakpoint suspension are *not* errors - they are the
//! [`Step`](crate::interpreter::Step) outcomes of the interpreter loop.

use vmkit_derive::Error;

/// Errors raised by the instruction factory, program storage, memory model,
/// and interpreter engine.
#[derive(Debug, Error)]
pub enum VMError {
    /// Wrong number of operands for a declared operation or record kind.
    #[error("{op}() takes exactly {expected} operands ({got} given)")]
    Arity {
        op: String,
        expected: usize,
        got: usize,
    },
    /// Reference to a label no loaded instruction carries.
    #[error("label not found: {0}")]
    LabelNotFound(String),
    /// Two instructions in the same load carry the same label.
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),
    /// No handler matches an instruction's opcode name.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),
    /// Dereference of an offset outside a container's current extent.
    #[error("offset {offset} out of bounds for {target} of length {len}")]
    OutOfBounds {
        target: &'static str,
        offset: i64,
        len: usize,
    },
    /// Operand type does not match what the instruction handler expects.
    #[error(
        "instruction {instruction} expected operand {operand} to be of type {expected} but got {actual}"
    )]
    TypeMismatch {
        instruction: String,
        operand: usize,
        expected: &'static str,
        actual: &'static str,
    },
    /// Instruction carries fewer operands than its handler reads.
    #[error("instruction {instruction} is missing operand {operand}")]
    MissingOperand { instruction: String, operand: usize },
}
