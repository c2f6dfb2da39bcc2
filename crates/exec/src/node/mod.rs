//! The execution node protocol
//!
//! Every operator in the pipeline implements [`ExecutionNode`]. Data
//! flows strictly upward: each node pulls batches from its children,
//! transforms them, and is pulled from by its parent. `Blocked` is the
//! cooperative "not ready yet" signal — the caller retries the same
//! call, and every node keeps its progress in struct fields so the
//! retry resumes exactly where the blocked attempt stopped, with no
//! side effects repeated.

mod grouping;
mod limit;
mod project;
mod select;
mod union;
mod values;

pub use grouping::{AggregateFunction, AggregateSpec, GroupingNode};
pub use limit::LimitNode;
pub use project::ProjectNode;
pub use select::SelectNode;
pub use union::UnionAllNode;
pub use values::ValuesNode;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use std::sync::Arc;
use tessera_types::{Batch, Schema};

/// The result of a successful `next_batch` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Pull {
    /// One batch of output rows.
    Ready(Batch),
    /// Required upstream data has not materialized yet. Not an error;
    /// the caller must retry the same call.
    Blocked,
}

/// Node lifecycle: `New -> Open -> Closed`, with `reset` returning the
/// subtree to `New` for re-execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    New,
    Open,
    Closed,
}

pub trait ExecutionNode {
    /// The output schema. Fixed once execution begins.
    fn schema(&self) -> Arc<Schema>;

    /// Initialize state; recursively opens children.
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()>;

    /// Pull the next output batch. Only legal while open.
    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Pull>;

    /// Release owned resources and close children. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Return the node and its subtree to the pre-open state so the
    /// plan can be re-executed without being rebuilt.
    fn reset(&mut self) -> Result<()>;
}

pub type BoxedNode = Box<dyn ExecutionNode + Send>;

/// Guard for calls that are only legal on an open node. A wrong state
/// is malformed plan state: fatal, not retryable.
pub(crate) fn ensure_open(state: NodeState) -> Result<()> {
    if state == NodeState::Open {
        Ok(())
    } else {
        Err(Error::Internal(format!(
            "node pulled while {:?}, expected Open",
            state
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{Column, DataType, Value};

    #[test]
    fn test_pull_before_open_is_fatal() {
        let schema = Schema::new(vec![Column::new("v", DataType::I64)]);
        let mut node = ValuesNode::new(schema, vec![vec![Value::I64(1)]]);
        let ctx = ExecutionContext::new();
        assert!(matches!(
            node.next_batch(&ctx),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let schema = Schema::new(vec![Column::new("v", DataType::I64)]);
        let mut node = ValuesNode::new(schema, vec![vec![Value::I64(1)]]);
        let ctx = ExecutionContext::new();
        node.open(&ctx).unwrap();
        node.close().unwrap();
        node.close().unwrap();
    }

    #[test]
    fn test_reset_allows_reexecution() {
        let schema = Schema::new(vec![Column::new("v", DataType::I64)]);
        let rows = vec![vec![Value::I64(1)], vec![Value::I64(2)]];
        let mut node = ValuesNode::new(schema, rows.clone());
        let ctx = ExecutionContext::new();

        for _ in 0..2 {
            node.open(&ctx).unwrap();
            match node.next_batch(&ctx).unwrap() {
                Pull::Ready(batch) => {
                    assert_eq!(batch.rows, rows);
                    assert!(batch.last);
                    assert_eq!(batch.begin_row, 1);
                }
                Pull::Blocked => panic!("values node never blocks"),
            }
            node.close().unwrap();
            node.reset().unwrap();
        }
    }
}
