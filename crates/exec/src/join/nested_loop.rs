//! Nested-loop join strategy
//!
//! For every left row, scan all right rows and emit concatenations
//! that satisfy the residual predicate. The right side is materialized
//! into a reusable tuple buffer on the first pass, so re-scans are
//! cursor resets rather than child re-executions. O(|L| x |R|); the
//! fallback when no equality keys are available, and the only strategy
//! for a pure cross join with a residual predicate.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::expression::{matches, Expression};
use crate::join::{joined_row, pad_left, pad_right, JoinPull, JoinType};
use crate::node::{BoxedNode, Pull};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tessera_buffer::{BufferManager, TupleBuffer};
use tessera_types::{Row, Schema};

pub struct NestedLoopJoin {
    join_type: JoinType,
    predicate: Option<Expression>,
    left_arity: usize,
    right_arity: usize,
    right_schema: Arc<Schema>,
    manager: BufferManager,

    /// The materialized right side.
    right_rows: Option<TupleBuffer>,
    right_done: bool,
    /// Left rows pulled but not yet processed.
    pending_left: VecDeque<Row>,
    left_done: bool,
    /// The left row currently being matched, with the scan position
    /// into the right side. Both survive a Blocked return.
    current_left: Option<Row>,
    right_pos: usize,
    left_matched: bool,
    /// Right row indices that matched at least once (FULL only).
    matched_right: HashSet<usize>,
    emitting_unmatched_right: bool,
    unmatched_pos: usize,
}

impl NestedLoopJoin {
    pub fn new(
        join_type: JoinType,
        predicate: Option<Expression>,
        left_schema: Arc<Schema>,
        right_schema: Arc<Schema>,
        manager: &BufferManager,
    ) -> Self {
        Self {
            join_type,
            predicate,
            left_arity: left_schema.arity(),
            right_arity: right_schema.arity(),
            right_schema,
            manager: manager.clone(),
            right_rows: None,
            right_done: false,
            pending_left: VecDeque::new(),
            left_done: false,
            current_left: None,
            right_pos: 0,
            left_matched: false,
            matched_right: HashSet::new(),
            emitting_unmatched_right: false,
            unmatched_pos: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.right_rows = None;
        self.right_done = false;
        self.pending_left.clear();
        self.left_done = false;
        self.current_left = None;
        self.right_pos = 0;
        self.left_matched = false;
        self.matched_right.clear();
        self.emitting_unmatched_right = false;
        self.unmatched_pos = 0;
    }

    pub(crate) fn pull(
        &mut self,
        left: &mut BoxedNode,
        right: &mut BoxedNode,
        ctx: &ExecutionContext,
    ) -> Result<JoinPull> {
        // Phase 1: materialize the right side once.
        while !self.right_done {
            let batch = match right.next_batch(ctx)? {
                Pull::Ready(batch) => batch,
                Pull::Blocked => return Ok(JoinPull::Blocked),
            };
            let buffer = match &self.right_rows {
                Some(buffer) => buffer.clone(),
                None => {
                    let buffer = self.manager.create_tuple_buffer(self.right_schema.clone());
                    self.right_rows = Some(buffer.clone());
                    buffer
                }
            };
            for row in batch.rows {
                buffer.add_row(row)?;
            }
            if batch.last {
                buffer.seal();
                self.right_done = true;
            }
        }
        let right_len = self.right_rows.as_ref().map(|b| b.len()).unwrap_or(0);

        // Phase 3: unmatched right rows for FULL joins.
        loop {
            if self.emitting_unmatched_right {
                while self.unmatched_pos < right_len {
                    let idx = self.unmatched_pos;
                    self.unmatched_pos += 1;
                    if self.matched_right.contains(&idx) {
                        continue;
                    }
                    let right_row = self.right_row(idx)?;
                    return Ok(JoinPull::Row(pad_left(&right_row, self.left_arity)));
                }
                return Ok(JoinPull::Done);
            }

            // Phase 2: pair the current left row against the right side.
            if self.current_left.is_none() {
                match self.pending_left.pop_front() {
                    Some(row) => {
                        self.current_left = Some(row);
                        self.right_pos = 0;
                        self.left_matched = false;
                    }
                    None if self.left_done => {
                        if self.join_type == JoinType::Full {
                            self.emitting_unmatched_right = true;
                            continue;
                        }
                        return Ok(JoinPull::Done);
                    }
                    None => {
                        let batch = match left.next_batch(ctx)? {
                            Pull::Ready(batch) => batch,
                            Pull::Blocked => return Ok(JoinPull::Blocked),
                        };
                        self.pending_left.extend(batch.rows);
                        if batch.last {
                            self.left_done = true;
                        }
                        continue;
                    }
                }
            }

            let left_row = match &self.current_left {
                Some(row) => row.clone(),
                None => continue,
            };

            while self.right_pos < right_len {
                let idx = self.right_pos;
                self.right_pos += 1;
                let right_row = self.right_row(idx)?;
                let joined = joined_row(&left_row, &right_row);
                let accept = match &self.predicate {
                    Some(predicate) => matches(predicate, &joined)?,
                    None => true,
                };
                if accept {
                    self.left_matched = true;
                    if self.join_type == JoinType::Full {
                        self.matched_right.insert(idx);
                    }
                    return Ok(JoinPull::Row(joined));
                }
            }

            // Right side exhausted for this left row.
            let unmatched = !self.left_matched;
            self.current_left = None;
            if unmatched && matches!(self.join_type, JoinType::Left | JoinType::Full) {
                return Ok(JoinPull::Row(pad_right(&left_row, self.right_arity)));
            }
        }
    }

    fn right_row(&self, index: usize) -> Result<Row> {
        let buffer = self.right_rows.as_ref().ok_or_else(|| {
            crate::error::Error::Internal("right side read before materialization".into())
        })?;
        buffer.row(index)?.ok_or_else(|| {
            crate::error::Error::Internal(format!("right row {} out of range", index))
        })
    }
}
