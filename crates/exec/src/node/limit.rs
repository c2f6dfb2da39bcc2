//! Row-stream slicing: OFFSET and LIMIT

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::node::{ensure_open, BoxedNode, ExecutionNode, NodeState, Pull};
use std::sync::Arc;
use tessera_types::{Batch, Row, Schema};

/// Slices the logical row stream: skips `offset` rows, then emits at
/// most `limit` rows, renumbering output batches from row 1.
///
/// A zero limit emits a single empty final batch without pulling the
/// child; an offset beyond the available rows likewise ends in a
/// single empty final batch.
pub struct LimitNode {
    child: BoxedNode,
    offset: u64,
    limit: Option<u64>,
    state: NodeState,
    skipped: u64,
    emitted: u64,
    finished: bool,
    next_row: u64,
}

impl LimitNode {
    pub fn new(child: BoxedNode, offset: u64, limit: Option<u64>) -> Self {
        Self {
            child,
            offset,
            limit,
            state: NodeState::New,
            skipped: 0,
            emitted: 0,
            finished: false,
            next_row: 1,
        }
    }

    fn remaining(&self) -> Option<u64> {
        self.limit.map(|l| l - self.emitted)
    }
}

impl ExecutionNode for LimitNode {
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
        debug_assert!(!self.finished, "pulled past the final batch");

        if self.remaining() == Some(0) {
            self.finished = true;
            return Ok(Pull::Ready(Batch::terminal(self.next_row)));
        }

        loop {
            let batch = match self.child.next_batch(ctx)? {
                Pull::Ready(batch) => batch,
                Pull::Blocked => return Ok(Pull::Blocked),
            };

            let mut rows: Vec<Row> = batch.rows;

            // Consume the front of the stream for OFFSET.
            if self.skipped < self.offset {
                let to_skip = (self.offset - self.skipped).min(rows.len() as u64) as usize;
                rows.drain(..to_skip);
                self.skipped += to_skip as u64;
            }

            // Trim the tail for LIMIT.
            let mut last = batch.last;
            if let Some(remaining) = self.remaining() {
                if rows.len() as u64 >= remaining {
                    rows.truncate(remaining as usize);
                    last = true;
                }
            }
            self.emitted += rows.len() as u64;

            if rows.is_empty() && !last {
                continue;
            }
            self.finished = last;
            let out = Batch::new(self.next_row, rows, last);
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
        self.skipped = 0;
        self.emitted = 0;
        self.finished = false;
        self.next_row = 1;
        Ok(())
    }
}
