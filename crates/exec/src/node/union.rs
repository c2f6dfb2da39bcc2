//! UNION ALL fan-in

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::node::{ensure_open, BoxedNode, ExecutionNode, NodeState, Pull};
use std::sync::Arc;
use tessera_types::{Batch, Schema};

/// Concatenates children in child-list order: each child is fully
/// exhausted before the next one begins. A blocked child blocks the
/// whole operator; later children are never pulled ahead of an earlier
/// one (head-of-line blocking is the documented trade for stable
/// ordering).
pub struct UnionAllNode {
    children: Vec<BoxedNode>,
    schema: Arc<Schema>,
    state: NodeState,
    current: usize,
    next_row: u64,
}

impl UnionAllNode {
    pub fn new(children: Vec<BoxedNode>) -> Result<Self> {
        let schema = children
            .first()
            .map(|c| c.schema())
            .ok_or_else(|| Error::Internal("union-all requires at least one child".into()))?;
        Ok(Self {
            children,
            schema,
            state: NodeState::New,
            current: 0,
            next_row: 1,
        })
    }
}

impl ExecutionNode for UnionAllNode {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        for child in &mut self.children {
            child.open(ctx)?;
        }
        self.state = NodeState::Open;
        Ok(())
    }

    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Pull> {
        ensure_open(self.state)?;
        ctx.check_cancelled()?;

        loop {
            let child = &mut self.children[self.current];
            let batch = match child.next_batch(ctx)? {
                Pull::Ready(batch) => batch,
                Pull::Blocked => return Ok(Pull::Blocked),
            };

            let child_finished = batch.last;
            let at_last_child = self.current + 1 >= self.children.len();
            if child_finished && !at_last_child {
                self.current += 1;
            }
            let last = child_finished && at_last_child;

            if batch.is_empty() && !last {
                continue;
            }
            let out = Batch::new(self.next_row, batch.rows, last);
            self.next_row = out.next_begin_row();
            return Ok(Pull::Ready(out));
        }
    }

    fn close(&mut self) -> Result<()> {
        self.state = NodeState::Closed;
        // Close every child even if an earlier one fails; report the
        // first error.
        let mut first_error = None;
        for child in &mut self.children {
            if let Err(e) = child.close() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn reset(&mut self) -> Result<()> {
        for child in &mut self.children {
            child.reset()?;
        }
        self.state = NodeState::New;
        self.current = 0;
        self.next_row = 1;
        Ok(())
    }
}
