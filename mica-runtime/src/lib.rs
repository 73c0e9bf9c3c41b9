//! Mica runtime: bytecode chunks, heap objects, the loaded package, and
//! the stack-based interpreter that executes it.

use thiserror::Error;

pub mod bytecode;
pub mod engine;
pub mod map;
pub mod object;
pub mod package;
pub mod stdlib;
pub mod value;

pub use bytecode::{Chunk, FunctionProto, OpCode};
pub use engine::{Engine, MAX_STACK};
pub use map::RtMap;
pub use object::{NativeFunction, Object};
pub use package::Package;
pub use value::Value;

/// Unrecoverable execution failures; the driver maps these to exit code 6.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("value stack underflow; bytecode is inconsistent")]
    CorruptStack,

    #[error("unknown opcode byte {byte:#04x}")]
    CorruptBytecode { byte: u8 },

    #[error("no main function")]
    MissingMain,

    #[error("{type_name} object is not callable")]
    NotCallable { type_name: &'static str },

    #[error("{type_name} object is not subscriptable")]
    NotSubscriptable { type_name: &'static str },

    #[error("index {index} out of bounds for array of size {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("string indexing is not defined")]
    StringIndexing,

    #[error("{type_name} object is not hashable")]
    UnhashableKey { type_name: &'static str },

    #[error("global slot {slot} was never bound")]
    UndefinedGlobal { slot: u16 },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid operand type for operation")]
    InvalidOperand,
}
