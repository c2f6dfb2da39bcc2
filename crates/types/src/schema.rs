//! Schemas shared between nodes and their children

use crate::data_type::DataType;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single column descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An ordered list of column descriptors. Shared by reference between a
/// node and its children and immutable once execution begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Arc<Self> {
        Arc::new(Self { columns })
    }

    /// Number of columns (tuple arity).
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns
            .get(index)
            .ok_or(Error::ColumnOutOfBounds(index))
    }

    /// Find a column index by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The output schema of a join: left columns followed by right columns.
    pub fn joined(left: &Schema, right: &Schema) -> Arc<Schema> {
        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().cloned());
        Schema::new(columns)
    }

    /// A schema containing a subset of this schema's columns, in the
    /// given order.
    pub fn project(&self, indices: &[usize]) -> Result<Arc<Schema>> {
        let mut columns = Vec::with_capacity(indices.len());
        for &i in indices {
            columns.push(self.column(i)?.clone());
        }
        Ok(Schema::new(columns))
    }
}
