//! Grouping and aggregation
//!
//! Input rows are assumed already grouped contiguously on the
//! grouping-key columns (the prerequisite sort is the caller's
//! responsibility, matching the sort utility's output). Each
//! contiguous run of equal keys drives one accumulator per aggregate
//! expression; a key change or end of input finalizes the run into a
//! single output row. DISTINCT aggregates route their values through
//! the sort utility to drop duplicates before accumulating.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::node::{ensure_open, BoxedNode, ExecutionNode, NodeState, Pull};
use crate::sort::{SortMode, SortUtility};
use std::collections::VecDeque;
use std::sync::Arc;
use tessera_buffer::{BufferManager, TupleBuffer};
use tessera_types::{Batch, Column, DataType, Row, Schema, SortKey, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One aggregate expression over a single input column.
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    pub column: usize,
    pub distinct: bool,
}

impl AggregateSpec {
    pub fn new(function: AggregateFunction, column: usize) -> Self {
        Self {
            function,
            column,
            distinct: false,
        }
    }

    pub fn distinct(function: AggregateFunction, column: usize) -> Self {
        Self {
            function,
            column,
            distinct: true,
        }
    }

    fn label(&self, input: &Schema) -> Result<String> {
        let name = match self.function {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        let column = &input.column(self.column)?.name;
        Ok(if self.distinct {
            format!("{}(DISTINCT {})", name, column)
        } else {
            format!("{}({})", name, column)
        })
    }

    fn output_type(&self, input: &Schema) -> Result<DataType> {
        let column_type = &input.column(self.column)?.data_type;
        Ok(match self.function {
            AggregateFunction::Count => DataType::I64,
            // Integer sums widen to stay ahead of overflow.
            AggregateFunction::Sum => column_type.widened(),
            AggregateFunction::Avg | AggregateFunction::Min | AggregateFunction::Max => {
                column_type.base().clone()
            }
        })
    }
}

pub struct GroupingNode {
    child: BoxedNode,
    group_by: Vec<usize>,
    aggregates: Vec<AggregateSpec>,
    schema: Arc<Schema>,
    manager: BufferManager,
    state: NodeState,
    next_row: u64,
    /// Key of the run currently being accumulated.
    current_key: Option<Vec<Value>>,
    accumulators: Vec<Box<dyn Accumulator>>,
    /// Completed group rows not yet emitted.
    pending: VecDeque<Row>,
    input_done: bool,
    finished: bool,
}

impl GroupingNode {
    pub fn new(
        child: BoxedNode,
        group_by: Vec<usize>,
        aggregates: Vec<AggregateSpec>,
        manager: &BufferManager,
    ) -> Result<Self> {
        let input = child.schema();
        let mut columns = Vec::with_capacity(group_by.len() + aggregates.len());
        for &g in &group_by {
            columns.push(input.column(g)?.clone());
        }
        for spec in &aggregates {
            columns.push(Column::new(spec.label(&input)?, spec.output_type(&input)?));
        }
        Ok(Self {
            child,
            group_by,
            aggregates,
            schema: Schema::new(columns),
            manager: manager.clone(),
            state: NodeState::New,
            next_row: 1,
            current_key: None,
            accumulators: Vec::new(),
            pending: VecDeque::new(),
            input_done: false,
            finished: false,
        })
    }

    fn new_accumulators(&self) -> Result<Vec<Box<dyn Accumulator>>> {
        self.aggregates
            .iter()
            .map(|spec| create_accumulator(spec, &self.child.schema(), &self.manager))
            .collect()
    }

    fn process_row(&mut self, row: Row) -> Result<()> {
        let key: Vec<Value> = self
            .group_by
            .iter()
            .map(|&g| row.get(g).cloned().unwrap_or(Value::Null))
            .collect();

        if self.current_key.as_ref() != Some(&key) {
            self.flush_group()?;
            self.accumulators = self.new_accumulators()?;
            self.current_key = Some(key);
        }

        for (spec, acc) in self.aggregates.iter().zip(self.accumulators.iter_mut()) {
            let value = row
                .get(spec.column)
                .ok_or(Error::ColumnOutOfBounds(spec.column))?;
            acc.add(value)?;
        }
        Ok(())
    }

    /// Finalize the current run into a pending output row.
    fn flush_group(&mut self) -> Result<()> {
        let Some(mut key) = self.current_key.take() else {
            return Ok(());
        };
        for acc in self.accumulators.drain(..) {
            key.push(acc.finalize()?);
        }
        self.pending.push_back(key);
        Ok(())
    }

    fn finish_input(&mut self) -> Result<()> {
        self.flush_group()?;
        // A global aggregate over zero rows still emits exactly one
        // row of defaults; a grouped aggregate over zero rows emits
        // nothing.
        if self.group_by.is_empty() && self.pending.is_empty() {
            let mut row = Vec::with_capacity(self.aggregates.len());
            for acc in self.new_accumulators()? {
                row.push(acc.finalize()?);
            }
            self.pending.push_back(row);
        }
        Ok(())
    }
}

impl ExecutionNode for GroupingNode {
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
        debug_assert!(!self.finished, "pulled past the final batch");

        while !self.input_done && self.pending.len() < ctx.batch_size() {
            if ctx.timeslice_expired() {
                break;
            }
            match self.child.next_batch(ctx)? {
                Pull::Ready(batch) => {
                    let last = batch.last;
                    for row in batch.rows {
                        self.process_row(row)?;
                    }
                    if last {
                        self.finish_input()?;
                        self.input_done = true;
                    }
                }
                Pull::Blocked => break,
            }
        }

        let take = self.pending.len().min(ctx.batch_size());
        let rows: Vec<Row> = self.pending.drain(..take).collect();
        let last = self.input_done && self.pending.is_empty();

        if rows.is_empty() && !last {
            // Nothing complete yet; the child blocked or the
            // timeslice ran out with a group still open.
            return Ok(Pull::Blocked);
        }
        self.finished = last;
        let out = Batch::new(self.next_row, rows, last);
        self.next_row = out.next_begin_row();
        Ok(Pull::Ready(out))
    }

    fn close(&mut self) -> Result<()> {
        self.state = NodeState::Closed;
        self.accumulators.clear();
        self.pending.clear();
        self.child.close()
    }

    fn reset(&mut self) -> Result<()> {
        self.child.reset()?;
        self.state = NodeState::New;
        self.next_row = 1;
        self.current_key = None;
        self.accumulators.clear();
        self.pending.clear();
        self.input_done = false;
        self.finished = false;
        Ok(())
    }
}

/// Running state for one (group, aggregate-expression) pair.
trait Accumulator: Send {
    fn add(&mut self, value: &Value) -> Result<()>;
    fn finalize(self: Box<Self>) -> Result<Value>;
}

fn create_accumulator(
    spec: &AggregateSpec,
    input: &Schema,
    manager: &BufferManager,
) -> Result<Box<dyn Accumulator>> {
    let inner: Box<dyn Accumulator> = match spec.function {
        AggregateFunction::Count => Box::new(CountAccumulator { count: 0 }),
        AggregateFunction::Sum => Box::new(SumAccumulator::new()),
        AggregateFunction::Avg => Box::new(AvgAccumulator {
            sum: SumAccumulator::new(),
            count: 0,
        }),
        AggregateFunction::Min => Box::new(MinAccumulator { min: Value::Null }),
        AggregateFunction::Max => Box::new(MaxAccumulator { max: Value::Null }),
    };
    if !spec.distinct {
        return Ok(inner);
    }
    let value_schema = Schema::new(vec![input.column(spec.column)?.clone()]);
    let sorter = SortUtility::new(
        value_schema.clone(),
        vec![SortKey::asc(0)],
        SortMode::DupRemoveSort,
        manager,
    );
    Ok(Box::new(DistinctAccumulator {
        inner,
        staged: manager.create_tuple_buffer(value_schema),
        sorter,
    }))
}

/// COUNT: non-null values.
struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(Value::I64(self.count))
    }
}

/// SUM: integers accumulate in i128 and finalize to a widened integer
/// type; other numerics accumulate through checked Value arithmetic.
/// Zero non-null inputs finalize to NULL.
struct SumAccumulator {
    int_sum: i128,
    int_seen: bool,
    value_sum: Value,
}

impl SumAccumulator {
    fn new() -> Self {
        Self {
            int_sum: 0,
            int_seen: false,
            value_sum: Value::Null,
        }
    }

    fn accumulate(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if !self.value_sum.is_null() {
            self.value_sum = self.value_sum.add(value)?;
            return Ok(());
        }
        if value.is_integer() {
            self.int_sum = self
                .int_sum
                .checked_add(value.to_i128()?)
                .ok_or_else(|| Error::InvalidValue("integer overflow in SUM".into()))?;
            self.int_seen = true;
        } else {
            // First non-integer value; fold any integer prefix in.
            self.value_sum = if self.int_seen {
                Value::I128(self.int_sum).add(value)?
            } else {
                value.clone()
            };
        }
        Ok(())
    }

    fn current(&self) -> Value {
        if !self.value_sum.is_null() {
            return self.value_sum.clone();
        }
        if !self.int_seen {
            return Value::Null;
        }
        match i64::try_from(self.int_sum) {
            Ok(v) => Value::I64(v),
            Err(_) => Value::I128(self.int_sum),
        }
    }
}

impl Accumulator for SumAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        self.accumulate(value)
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(self.current())
    }
}

/// AVG: SUM divided by the non-null count; Decimal input stays
/// high-precision Decimal, integer input uses integer division.
struct AvgAccumulator {
    sum: SumAccumulator,
    count: i64,
}

impl Accumulator for AvgAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() {
            self.sum.accumulate(value)?;
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        if self.count == 0 {
            return Ok(Value::Null);
        }
        Ok(self.sum.current().divide(&Value::I64(self.count))?)
    }
}

struct MinAccumulator {
    min: Value,
}

impl Accumulator for MinAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() && (self.min.is_null() || *value < self.min) {
            self.min = value.clone();
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(self.min)
    }
}

struct MaxAccumulator {
    max: Value,
}

impl Accumulator for MaxAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() && (self.max.is_null() || *value > self.max) {
            self.max = value.clone();
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(self.max)
    }
}

/// Wraps another accumulator, de-duplicating values through the sort
/// utility before they reach it. Values are staged in a spillable
/// buffer during the run and handed to the sorter as a borrowed
/// cursor at finalization.
struct DistinctAccumulator {
    inner: Box<dyn Accumulator>,
    staged: TupleBuffer,
    sorter: SortUtility,
}

impl Accumulator for DistinctAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.staged.add_row(vec![value.clone()]).map_err(Error::from)
    }

    fn finalize(mut self: Box<Self>) -> Result<Value> {
        self.staged.seal();
        let mut source = self.staged.create_indexed_source();
        if !self.sorter.drain_source(&mut source)? {
            return Err(Error::Internal(
                "sealed distinct staging buffer not fully drained".into(),
            ));
        }
        let distinct = self.sorter.finish()?;
        let mut survivors = distinct.create_indexed_source();
        while let Some(row) = survivors.next_row().map_err(Error::from)? {
            let value = row
                .into_iter()
                .next()
                .ok_or_else(|| Error::Internal("empty row in distinct buffer".into()))?;
            self.inner.add(&value)?;
        }
        self.inner.finalize()
    }
}
