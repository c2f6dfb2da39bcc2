//! Error types for the execution core
//!
//! "Not ready yet" is deliberately absent here: it is the dominant,
//! expected control path and travels as [`crate::node::Pull::Blocked`],
//! never as an error. Everything below is fatal for the running
//! statement; the failing node must still be `close()`-able.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Processing errors
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Column index {0} out of bounds")]
    ColumnOutOfBounds(usize),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    // Terminal by request
    #[error("Execution cancelled")]
    Cancelled,

    // Resource errors
    #[error("Buffer error: {0}")]
    Buffer(String),

    // Programmer-invariant violations (malformed plan state)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tessera_types::Error> for Error {
    fn from(e: tessera_types::Error) -> Self {
        match e {
            tessera_types::Error::TypeMismatch { expected, found } => {
                Error::TypeMismatch { expected, found }
            }
            tessera_types::Error::InvalidValue(msg) => Error::InvalidValue(msg),
            tessera_types::Error::ColumnOutOfBounds(i) => Error::ColumnOutOfBounds(i),
            tessera_types::Error::DivisionByZero => Error::InvalidValue("division by zero".into()),
        }
    }
}

impl From<tessera_buffer::Error> for Error {
    fn from(e: tessera_buffer::Error) -> Self {
        match e {
            tessera_buffer::Error::Sealed => {
                Error::Internal("write to a sealed tuple buffer".into())
            }
            other => Error::Buffer(other.to_string()),
        }
    }
}
