//! Expression projection

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::expression::{evaluate, Expression};
use crate::node::{ensure_open, BoxedNode, ExecutionNode, NodeState, Pull};
use std::sync::Arc;
use tessera_types::{Batch, Row, Schema};

/// Evaluates one expression per output column against every input row.
/// Conversion or evaluation failures are fatal for the statement.
pub struct ProjectNode {
    child: BoxedNode,
    expressions: Vec<Expression>,
    schema: Arc<Schema>,
    state: NodeState,
    next_row: u64,
}

impl ProjectNode {
    pub fn new(child: BoxedNode, expressions: Vec<Expression>, schema: Arc<Schema>) -> Self {
        Self {
            child,
            expressions,
            schema,
            state: NodeState::New,
            next_row: 1,
        }
    }

    /// A pure column projection: keep the named child columns in the
    /// given order.
    pub fn columns(child: BoxedNode, indices: &[usize]) -> Result<Self> {
        let schema = child.schema().project(indices).map_err(crate::error::Error::from)?;
        let expressions = indices.iter().map(|&i| Expression::Column(i)).collect();
        Ok(Self::new(child, expressions, schema))
    }
}

impl ExecutionNode for ProjectNode {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = NodeState::Open;
        Ok(())
    }

    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Pull> {
        ensure_open(self.state)?;
        ctx.check_cancelled()?;

        let batch = match self.child.next_batch(ctx)? {
            Pull::Ready(batch) => batch,
            Pull::Blocked => return Ok(Pull::Blocked),
        };

        let mut rows: Vec<Row> = Vec::with_capacity(batch.len());
        for row in &batch.rows {
            let mut out = Vec::with_capacity(self.expressions.len());
            for expr in &self.expressions {
                out.push(evaluate(expr, row)?);
            }
            rows.push(out);
        }

        let out = Batch::new(self.next_row, rows, batch.last);
        self.next_row = out.next_begin_row();
        Ok(Pull::Ready(out))
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
