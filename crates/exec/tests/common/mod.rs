//! Shared helpers for the execution integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tessera_buffer::{BufferConfig, BufferManager};
use tessera_exec::node::NodeState;
use tessera_exec::{ExecutionContext, ExecutionNode, Pull, Result, ValuesNode};
use tessera_types::{Batch, Column, DataType, Row, Schema, Value};

/// A buffer manager with a tiny memory budget so spill paths run even
/// in small tests. The TempDir must outlive the manager.
pub fn small_manager() -> (BufferManager, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manager = BufferManager::new(BufferConfig {
        memory_rows: 4,
        spill_dir: dir.path().to_path_buf(),
    });
    (manager, dir)
}

pub fn int_schema(names: &[&str]) -> Arc<Schema> {
    Schema::new(
        names
            .iter()
            .map(|n| Column::new(*n, DataType::I64))
            .collect(),
    )
}

/// Single-column integer rows; None becomes NULL.
pub fn int_rows(values: &[Option<i64>]) -> Vec<Row> {
    values
        .iter()
        .map(|v| vec![v.map(Value::I64).unwrap_or(Value::Null)])
        .collect()
}

pub fn ints(values: &[i64]) -> Vec<Row> {
    values.iter().map(|&v| vec![Value::I64(v)]).collect()
}

pub fn int_source(name: &str, values: &[Option<i64>]) -> Box<ValuesNode> {
    Box::new(ValuesNode::new(int_schema(&[name]), int_rows(values)))
}

/// Drive a node to completion, retrying Blocked pulls with a renewed
/// timeslice. Panics if the node stops making progress.
pub fn collect(node: &mut dyn ExecutionNode, ctx: &ExecutionContext) -> Vec<Row> {
    node.open(ctx).unwrap();
    let mut rows = Vec::new();
    let mut blocked = 0u32;
    loop {
        match node.next_batch(ctx).unwrap() {
            Pull::Ready(batch) => {
                blocked = 0;
                let last = batch.last;
                rows.extend(batch.rows);
                if last {
                    break;
                }
            }
            Pull::Blocked => {
                blocked += 1;
                assert!(blocked < 10_000, "no progress after repeated retries");
                ctx.renew_timeslice();
            }
        }
    }
    node.close().unwrap();
    rows
}

/// Rows sorted into a canonical order for multiset comparison.
pub fn multiset(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort();
    rows
}

/// A leaf that releases its staged batches one at a time: every pull
/// past the released point reports Blocked. Models a child whose
/// upstream data has not arrived yet.
pub struct StagedNode {
    schema: Arc<Schema>,
    batches: Vec<Vec<Row>>,
    released: Arc<AtomicUsize>,
    delivered: usize,
    state: NodeState,
    next_row: u64,
}

impl StagedNode {
    pub fn new(schema: Arc<Schema>, batches: Vec<Vec<Row>>) -> (Self, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let node = Self {
            schema,
            batches,
            released: released.clone(),
            delivered: 0,
            state: NodeState::New,
            next_row: 1,
        };
        (node, released)
    }
}

impl ExecutionNode for StagedNode {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn open(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.state = NodeState::Open;
        Ok(())
    }

    fn next_batch(&mut self, _ctx: &ExecutionContext) -> Result<Pull> {
        if self.delivered >= self.released.load(Ordering::SeqCst) {
            return Ok(Pull::Blocked);
        }
        let rows = self.batches[self.delivered].clone();
        self.delivered += 1;
        let last = self.delivered >= self.batches.len();
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
        self.delivered = 0;
        self.next_row = 1;
        Ok(())
    }
}
