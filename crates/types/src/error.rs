//! Error types for the data model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Column index {0} out of bounds")]
    ColumnOutOfBounds(usize),

    #[error("Division by zero")]
    DivisionByZero,
}
