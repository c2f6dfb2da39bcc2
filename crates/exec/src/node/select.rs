//! Residual predicate filtering

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::expression::{matches, Expression};
use crate::node::{ensure_open, BoxedNode, ExecutionNode, NodeState, Pull};
use std::sync::Arc;
use tessera_types::{Batch, Row, Schema};

/// Applies a predicate per input row. An evaluation failure is fatal
/// for the statement, never silently skipped.
pub struct SelectNode {
    child: BoxedNode,
    predicate: Expression,
    state: NodeState,
    next_row: u64,
}

impl SelectNode {
    pub fn new(child: BoxedNode, predicate: Expression) -> Self {
        Self {
            child,
            predicate,
            state: NodeState::New,
            next_row: 1,
        }
    }
}

impl ExecutionNode for SelectNode {
    fn schema(&self) -> Arc<Schema> {
        self.child.schema()
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = NodeState::Open;
        Ok(())
    }

    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Pull> {
        ensure_open(self.state)?;
        ctx.check_cancelled()?;

        // Keep pulling until the filter passes something through, the
        // child finishes, or the child blocks.
        loop {
            let batch = match self.child.next_batch(ctx)? {
                Pull::Ready(batch) => batch,
                Pull::Blocked => return Ok(Pull::Blocked),
            };

            let mut rows: Vec<Row> = Vec::new();
            for row in batch.rows {
                if matches(&self.predicate, &row)? {
                    rows.push(row);
                }
            }

            if rows.is_empty() && !batch.last {
                continue;
            }
            let out = Batch::new(self.next_row, rows, batch.last);
            self.next_row = out.next_begin_row();
            return Ok(Pull::Ready(out));
        }
    }

    fn close(&mut self) -> Result<()> {
        self.state = NodeState::Closed;
        self.child.close()
    }

    fn reset(&mut self) -> Result<()> {
        self.child.reset()?;
        self.state = NodeState::New;
        self.next_row = 1;
        Ok(())
    }
}
