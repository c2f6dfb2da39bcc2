//! The join subsystem
//!
//! A [`JoinNode`] owns two children and a [`JoinStrategy`] — a closed
//! set of tagged variants, each carrying its own algorithm-specific
//! state. Strategies produce joined rows one at a time through an
//! internal pull interface; the node assembles them into batches,
//! handles renumbering, and propagates `Blocked` without losing
//! progress.

mod enhanced;
mod input;
mod merge;
mod nested_loop;

pub use enhanced::EnhancedMergeJoin;
pub use merge::MergeJoin;
pub use nested_loop::NestedLoopJoin;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::expression::Expression;
use crate::node::{ensure_open, BoxedNode, ExecutionNode, NodeState, Pull};
use std::sync::Arc;
use tessera_buffer::BufferManager;
use tessera_types::{Batch, Row, Schema, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Full,
    Cross,
}

/// How a merge-join input arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOption {
    /// The child already delivers rows sorted on the join keys.
    AlreadySorted,
    /// Sort the child's output through the sort utility first.
    Sort,
    /// Sort and remove duplicate keys; downstream grouping can then
    /// assume single-row equal-key groups on this side.
    SortDistinct,
    /// No ordering guarantee at all; only the enhanced strategy
    /// accepts this and sorts internally.
    NotSorted,
}

/// One joined row, a not-ready signal, or end of stream.
pub(crate) enum JoinPull {
    Row(Row),
    Blocked,
    Done,
}

pub enum JoinStrategy {
    NestedLoop(NestedLoopJoin),
    Merge(MergeJoin),
    EnhancedMerge(EnhancedMergeJoin),
}

impl JoinStrategy {
    fn pull(
        &mut self,
        left: &mut BoxedNode,
        right: &mut BoxedNode,
        ctx: &ExecutionContext,
    ) -> Result<JoinPull> {
        match self {
            JoinStrategy::NestedLoop(s) => s.pull(left, right, ctx),
            JoinStrategy::Merge(s) => s.pull(left, right, ctx),
            JoinStrategy::EnhancedMerge(s) => s.pull(left, right, ctx),
        }
    }

    fn reset(&mut self) {
        match self {
            JoinStrategy::NestedLoop(s) => s.reset(),
            JoinStrategy::Merge(s) => s.reset(),
            JoinStrategy::EnhancedMerge(s) => s.reset(),
        }
    }
}

/// Project the join-key columns out of a row.
pub(crate) fn key_of(row: &Row, keys: &[usize]) -> Vec<Value> {
    keys.iter()
        .map(|&k| row.get(k).cloned().unwrap_or(Value::Null))
        .collect()
}

/// NULL join keys never match anything, including other NULLs.
pub(crate) fn key_is_null(key: &[Value]) -> bool {
    key.iter().any(|v| v.is_null())
}

/// Concatenate a left and right row.
pub(crate) fn joined_row(left: &Row, right: &Row) -> Row {
    let mut row = left.clone();
    row.extend(right.iter().cloned());
    row
}

/// A left row padded with NULLs on the right.
pub(crate) fn pad_right(left: &Row, right_arity: usize) -> Row {
    let mut row = left.clone();
    row.extend(std::iter::repeat(Value::Null).take(right_arity));
    row
}

/// A right row padded with NULLs on the left.
pub(crate) fn pad_left(right: &Row, left_arity: usize) -> Row {
    let mut row = vec![Value::Null; left_arity];
    row.extend(right.iter().cloned());
    row
}

pub struct JoinNode {
    left: BoxedNode,
    right: BoxedNode,
    strategy: JoinStrategy,
    schema: Arc<Schema>,
    state: NodeState,
    next_row: u64,
    finished: bool,
}

impl JoinNode {
    pub fn with_strategy(left: BoxedNode, right: BoxedNode, strategy: JoinStrategy) -> Self {
        let schema = Schema::joined(&left.schema(), &right.schema());
        Self {
            left,
            right,
            strategy,
            schema,
            state: NodeState::New,
            next_row: 1,
            finished: false,
        }
    }

    pub fn nested_loop(
        left: BoxedNode,
        right: BoxedNode,
        join_type: JoinType,
        predicate: Option<Expression>,
        manager: &BufferManager,
    ) -> Self {
        let strategy = JoinStrategy::NestedLoop(NestedLoopJoin::new(
            join_type,
            predicate,
            left.schema(),
            right.schema(),
            manager,
        ));
        Self::with_strategy(left, right, strategy)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn merge(
        left: BoxedNode,
        right: BoxedNode,
        join_type: JoinType,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        left_mode: SortOption,
        right_mode: SortOption,
        manager: &BufferManager,
    ) -> Result<Self> {
        let strategy = JoinStrategy::Merge(MergeJoin::new(
            join_type,
            left_keys,
            right_keys,
            left_mode,
            right_mode,
            left.schema(),
            right.schema(),
            manager,
        )?);
        Ok(Self::with_strategy(left, right, strategy))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn enhanced_merge(
        left: BoxedNode,
        right: BoxedNode,
        join_type: JoinType,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        left_mode: SortOption,
        right_mode: SortOption,
        memory_row_threshold: usize,
        manager: &BufferManager,
    ) -> Self {
        let strategy = JoinStrategy::EnhancedMerge(EnhancedMergeJoin::new(
            join_type,
            left_keys,
            right_keys,
            left_mode,
            right_mode,
            memory_row_threshold,
            left.schema(),
            right.schema(),
            manager,
        ));
        Self::with_strategy(left, right, strategy)
    }
}

impl ExecutionNode for JoinNode {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;
        self.state = NodeState::Open;
        Ok(())
    }

    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Pull> {
        ensure_open(self.state)?;
        ctx.check_cancelled()?;
        debug_assert!(!self.finished, "pulled past the final batch");

        let mut rows: Vec<Row> = Vec::new();
        loop {
            if rows.len() >= ctx.batch_size() {
                let out = Batch::new(self.next_row, rows, false);
                self.next_row = out.next_begin_row();
                return Ok(Pull::Ready(out));
            }
            // Timeslice expiry at a row boundary: hand back what we
            // have, or yield with all progress kept in strategy state.
            if ctx.timeslice_expired() {
                if rows.is_empty() {
                    return Ok(Pull::Blocked);
                }
                let out = Batch::new(self.next_row, rows, false);
                self.next_row = out.next_begin_row();
                return Ok(Pull::Ready(out));
            }

            match self.strategy.pull(&mut self.left, &mut self.right, ctx)? {
                JoinPull::Row(row) => rows.push(row),
                JoinPull::Blocked => {
                    if rows.is_empty() {
                        return Ok(Pull::Blocked);
                    }
                    let out = Batch::new(self.next_row, rows, false);
                    self.next_row = out.next_begin_row();
                    return Ok(Pull::Ready(out));
                }
                JoinPull::Done => {
                    self.finished = true;
                    let out = Batch::new(self.next_row, rows, true);
                    self.next_row = out.next_begin_row();
                    return Ok(Pull::Ready(out));
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.state = NodeState::Closed;
        // Close both children even if the first one fails; report the
        // first error.
        let left = self.left.close();
        let right = self.right.close();
        left.and(right)
    }

    fn reset(&mut self) -> Result<()> {
        self.left.reset()?;
        self.right.reset()?;
        self.strategy.reset();
        self.state = NodeState::New;
        self.next_row = 1;
        self.finished = false;
        Ok(())
    }
}
