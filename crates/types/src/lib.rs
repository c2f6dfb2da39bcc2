//! Data model for the tessera execution core
//!
//! This crate holds everything the execution pipeline and the buffer
//! manager share: typed values, schemas, row batches, and the sort-key
//! comparators that define ordering semantics across the engine.

mod batch;
mod data_type;
mod error;
mod ordering;
mod schema;
mod value;

pub use batch::{Batch, Row};
pub use data_type::DataType;
pub use error::{Error, Result};
pub use ordering::{compare_rows, compare_values, Direction, NullOrder, SortKey};
pub use schema::{Column, Schema};
pub use value::Value;
