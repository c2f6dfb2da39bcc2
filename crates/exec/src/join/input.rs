//! Merge-join input materialization
//!
//! Both merge strategies consume each side as a fully materialized,
//! key-sorted tuple buffer with random access by row index. A side
//! arriving `AlreadySorted` passes straight into a buffer; the other
//! modes run through the sort utility first. Materialization is
//! resumable: a blocked child leaves everything accumulated so far in
//! place and the next attempt continues from the same point.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::join::SortOption;
use crate::node::{BoxedNode, Pull};
use crate::sort::{SortMode, SortUtility};
use std::sync::Arc;
use tessera_buffer::{BufferManager, TupleBuffer};
use tessera_types::{Row, Schema, SortKey};

pub(crate) struct JoinInput {
    mode: SortOption,
    sorter: Option<SortUtility>,
    passthrough: Option<TupleBuffer>,
    /// The materialized, sorted side. Present once `ready`.
    buffer: Option<TupleBuffer>,
    ready: bool,
}

impl JoinInput {
    pub fn new(
        mode: SortOption,
        keys: &[usize],
        schema: Arc<Schema>,
        manager: &BufferManager,
    ) -> Self {
        let (sorter, passthrough) = match mode {
            SortOption::AlreadySorted => {
                (None, Some(manager.create_tuple_buffer(schema)))
            }
            SortOption::Sort | SortOption::NotSorted => {
                let sort_keys: Vec<SortKey> = keys.iter().map(|&c| SortKey::asc(c)).collect();
                (
                    Some(SortUtility::new(schema, sort_keys, SortMode::Sort, manager)),
                    None,
                )
            }
            SortOption::SortDistinct => {
                let sort_keys: Vec<SortKey> = keys.iter().map(|&c| SortKey::asc(c)).collect();
                (
                    Some(SortUtility::new(
                        schema,
                        sort_keys,
                        SortMode::DupRemoveSort,
                        manager,
                    )),
                    None,
                )
            }
        };
        Self {
            mode,
            sorter,
            passthrough,
            buffer: None,
            ready: false,
        }
    }

    /// Whether this side was sorted with duplicate-key removal, so
    /// equal-key groups are single rows.
    pub fn is_distinct(&self) -> bool {
        self.mode == SortOption::SortDistinct
    }

    /// Drive the child until this side is fully materialized. Returns
    /// false if the child blocked; call again to continue.
    pub fn materialize(&mut self, child: &mut BoxedNode, ctx: &ExecutionContext) -> Result<bool> {
        while !self.ready {
            let batch = match child.next_batch(ctx)? {
                Pull::Ready(batch) => batch,
                Pull::Blocked => return Ok(false),
            };
            let last = batch.last;
            match (&mut self.sorter, &self.passthrough) {
                (Some(sorter), _) => sorter.push_batch(batch.rows)?,
                (None, Some(buffer)) => {
                    for row in batch.rows {
                        buffer.add_row(row)?;
                    }
                }
                (None, None) => {
                    return Err(Error::Internal("join input without a sink".into()));
                }
            }
            if last {
                let buffer = match (&mut self.sorter, self.passthrough.take()) {
                    (Some(sorter), _) => sorter.finish()?,
                    (None, Some(buffer)) => {
                        buffer.seal();
                        buffer
                    }
                    (None, None) => {
                        return Err(Error::Internal("join input without a sink".into()));
                    }
                };
                self.buffer = Some(buffer);
                self.ready = true;
            }
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.buffer.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    pub fn row(&self, index: usize) -> Result<Row> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| Error::Internal("join input read before materialization".into()))?;
        buffer
            .row(index)?
            .ok_or_else(|| Error::Internal(format!("join input row {} out of range", index)))
    }
}
