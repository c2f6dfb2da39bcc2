//! Grouping and aggregation over full pipelines, cross-checked
//! against naive in-memory references.

mod common;

use common::{collect, small_manager};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tessera_exec::{
    AggregateFunction, AggregateSpec, ExecutionContext, ExecutionNode, Expression, GroupingNode,
    SelectNode, ValuesNode,
};
use tessera_types::{Column, DataType, Row, Schema, Value};

fn pair_schema() -> Arc<Schema> {
    Schema::new(vec![
        Column::new("col1", DataType::I64),
        Column::new("col2", DataType::I64),
    ])
}

/// Deterministic pseudo-random pairs with plenty of duplicate values
/// per group.
fn generated_pairs(n: usize) -> Vec<Row> {
    let mut state: u64 = 0x9e37_79b9;
    let mut rows = Vec::with_capacity(n);
    for _ in 0..n {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let group = (state >> 33) % 7;
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let value = (state >> 33) % 11;
        rows.push(vec![Value::I64(group as i64), Value::I64(value as i64)]);
    }
    rows
}

#[test]
fn test_count_distinct_matches_naive_reference() {
    let mut rows = generated_pairs(500);
    // Grouping expects contiguous groups on the key.
    rows.sort();

    let mut expected: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for row in &rows {
        if let (Value::I64(g), Value::I64(v)) = (&row[0], &row[1]) {
            expected.entry(*g).or_default().insert(*v);
        }
    }

    let (manager, _dir) = small_manager();
    let child = Box::new(ValuesNode::new(pair_schema(), rows));
    let mut node = GroupingNode::new(
        child,
        vec![0],
        vec![AggregateSpec::distinct(AggregateFunction::Count, 1)],
        &manager,
    )
    .unwrap();
    let ctx = ExecutionContext::new().with_batch_size(16);
    let out = collect(&mut node, &ctx);

    assert_eq!(out.len(), expected.len());
    for row in out {
        let (Value::I64(g), Value::I64(count)) = (&row[0], &row[1]) else {
            panic!("unexpected output row {:?}", row);
        };
        assert_eq!(*count as usize, expected[g].len(), "group {}", g);
    }
}

#[test]
fn test_aggregates_match_naive_reference() {
    let mut rows = generated_pairs(200);
    rows.sort();

    let mut sums: BTreeMap<i64, i64> = BTreeMap::new();
    let mut mins: BTreeMap<i64, i64> = BTreeMap::new();
    let mut maxs: BTreeMap<i64, i64> = BTreeMap::new();
    let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
    for row in &rows {
        if let (Value::I64(g), Value::I64(v)) = (&row[0], &row[1]) {
            *sums.entry(*g).or_default() += v;
            *counts.entry(*g).or_default() += 1;
            mins.entry(*g)
                .and_modify(|m| *m = (*m).min(*v))
                .or_insert(*v);
            maxs.entry(*g)
                .and_modify(|m| *m = (*m).max(*v))
                .or_insert(*v);
        }
    }

    let (manager, _dir) = small_manager();
    let child = Box::new(ValuesNode::new(pair_schema(), rows));
    let mut node = GroupingNode::new(
        child,
        vec![0],
        vec![
            AggregateSpec::new(AggregateFunction::Sum, 1),
            AggregateSpec::new(AggregateFunction::Min, 1),
            AggregateSpec::new(AggregateFunction::Max, 1),
            AggregateSpec::new(AggregateFunction::Avg, 1),
        ],
        &manager,
    )
    .unwrap();
    let ctx = ExecutionContext::new().with_batch_size(32);

    for row in collect(&mut node, &ctx) {
        let Value::I64(g) = &row[0] else {
            panic!("unexpected group key {:?}", row[0]);
        };
        assert_eq!(row[1], Value::I64(sums[g]));
        assert_eq!(row[2], Value::I64(mins[g]));
        assert_eq!(row[3], Value::I64(maxs[g]));
        // Integer AVG uses integer division.
        assert_eq!(row[4], Value::I64(sums[g] / counts[g]));
    }
}

#[test]
fn test_global_aggregate_over_filtered_out_input() {
    // The filter removes every row; a global aggregate still yields
    // exactly one row with COUNT 0 and NULL for the rest.
    let rows = generated_pairs(50);
    let (manager, _dir) = small_manager();
    let source = Box::new(ValuesNode::new(pair_schema(), rows));
    let filtered = Box::new(SelectNode::new(
        source,
        Expression::Equal(
            Box::new(Expression::Column(1)),
            Box::new(Expression::Constant(Value::I64(-1))),
        ),
    ));
    let mut node = GroupingNode::new(
        filtered,
        vec![],
        vec![
            AggregateSpec::new(AggregateFunction::Count, 1),
            AggregateSpec::new(AggregateFunction::Sum, 1),
            AggregateSpec::new(AggregateFunction::Avg, 1),
            AggregateSpec::new(AggregateFunction::Min, 1),
        ],
        &manager,
    )
    .unwrap();
    let ctx = ExecutionContext::new();
    assert_eq!(
        collect(&mut node, &ctx),
        vec![vec![Value::I64(0), Value::Null, Value::Null, Value::Null]]
    );
}

#[test]
fn test_grouped_aggregate_over_empty_input_yields_no_rows() {
    let (manager, _dir) = small_manager();
    let child = Box::new(ValuesNode::new(pair_schema(), vec![]));
    let mut node = GroupingNode::new(
        child,
        vec![0],
        vec![AggregateSpec::new(AggregateFunction::Sum, 1)],
        &manager,
    )
    .unwrap();
    let ctx = ExecutionContext::new();
    assert!(collect(&mut node, &ctx).is_empty());
}

#[test]
fn test_output_schema_labels() {
    let (manager, _dir) = small_manager();
    let child = Box::new(ValuesNode::new(pair_schema(), vec![]));
    let node = GroupingNode::new(
        child,
        vec![0],
        vec![
            AggregateSpec::new(AggregateFunction::Sum, 1),
            AggregateSpec::distinct(AggregateFunction::Count, 1),
        ],
        &manager,
    )
    .unwrap();
    let schema = node.schema();
    assert_eq!(schema.column(0).unwrap().name, "col1");
    assert_eq!(schema.column(1).unwrap().name, "SUM(col2)");
    assert_eq!(schema.column(2).unwrap().name, "COUNT(DISTINCT col2)");
}
