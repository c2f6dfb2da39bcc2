//! Row batches: the unit of data flow between execution nodes

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A single tuple: an ordered sequence of values matching a schema's arity.
pub type Row = Vec<Value>;

/// A contiguous, 1-based-numbered run of rows pulled from a node.
///
/// Stream invariant: `begin_row` of batch n+1 equals
/// `begin_row(n) + len(n)`; exactly one batch in a stream carries
/// `last = true` and it is the final one delivered. A stream may
/// terminate with a zero-length last batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// 1-based row number of the first row in this batch.
    pub begin_row: u64,
    pub rows: Vec<Row>,
    /// True if this is the final batch of the stream.
    pub last: bool,
}

impl Batch {
    pub fn new(begin_row: u64, rows: Vec<Row>, last: bool) -> Self {
        Self {
            begin_row,
            rows,
            last,
        }
    }

    /// An empty terminal batch beginning at the given row number.
    pub fn terminal(begin_row: u64) -> Self {
        Self {
            begin_row,
            rows: Vec::new(),
            last: true,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `begin_row` the next batch in the stream must carry.
    pub fn next_begin_row(&self) -> u64 {
        self.begin_row + self.rows.len() as u64
    }
}
