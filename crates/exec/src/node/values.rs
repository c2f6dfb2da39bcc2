//! Leaf source over rows known up front
//!
//! Stands in for an external data-access node in plans and tests; the
//! real scan nodes live outside this crate and conform to the same
//! protocol.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::node::{ensure_open, ExecutionNode, NodeState, Pull};
use std::sync::Arc;
use tessera_types::{Batch, Row, Schema};

pub struct ValuesNode {
    schema: Arc<Schema>,
    rows: Vec<Row>,
    state: NodeState,
    /// Next input row to deliver.
    position: usize,
    /// 1-based begin row of the next output batch.
    next_row: u64,
}

impl ValuesNode {
    pub fn new(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        Self {
            schema,
            rows,
            state: NodeState::New,
            position: 0,
            next_row: 1,
        }
    }
}

impl ExecutionNode for ValuesNode {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.state = NodeState::Open;
        Ok(())
    }

    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Pull> {
        ensure_open(self.state)?;
        ctx.check_cancelled()?;

        let end = (self.position + ctx.batch_size()).min(self.rows.len());
        let rows: Vec<Row> = self.rows[self.position..end].to_vec();
        self.position = end;
        let last = self.position >= self.rows.len();

        let batch = Batch::new(self.next_row, rows, last);
        self.next_row = batch.next_begin_row();
        Ok(Pull::Ready(batch))
    }

    fn close(&mut self) -> Result<()> {
        self.state = NodeState::Closed;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.state = NodeState::New;
        self.position = 0;
        self.next_row = 1;
        Ok(())
    }
}
