//! Enhanced sort-merge join: repeated keys, unsorted inputs, and the
//! memory/disk group switch.

mod common;

use common::{collect, int_source, multiset, small_manager};
use tessera_exec::{ExecutionContext, Expression, JoinNode, JoinType, SortOption};
use tessera_types::Value;

const LEFT: &[Option<i64>] = &[
    Some(3),
    Some(1),
    Some(3),
    Some(3),
    Some(2),
    Some(3),
    None,
    Some(5),
];
const RIGHT: &[Option<i64>] = &[Some(3), Some(9), Some(3), Some(1), None, Some(3), Some(2)];

fn enhanced(join_type: JoinType, threshold: usize, batch_size: usize) -> Vec<Vec<Value>> {
    let (manager, _dir) = small_manager();
    let mut node = JoinNode::enhanced_merge(
        int_source("l", LEFT),
        int_source("r", RIGHT),
        join_type,
        vec![0],
        vec![0],
        SortOption::NotSorted,
        SortOption::NotSorted,
        threshold,
        &manager,
    );
    let ctx = ExecutionContext::new().with_batch_size(batch_size);
    collect(&mut node, &ctx)
}

fn reference(join_type: JoinType) -> Vec<Vec<Value>> {
    let (manager, _dir) = small_manager();
    let mut node = JoinNode::nested_loop(
        int_source("l", LEFT),
        int_source("r", RIGHT),
        join_type,
        Some(Expression::columns_equal(0, 1)),
        &manager,
    );
    let ctx = ExecutionContext::new();
    collect(&mut node, &ctx)
}

#[test]
fn test_repeated_keys_match_reference_at_every_threshold() {
    let expected = multiset(reference(JoinType::Inner));
    // Threshold 0 forces every group through the spillable buffer;
    // large thresholds keep groups in memory. Same rows either way.
    for threshold in [0, 1, 2, 1000] {
        let result = multiset(enhanced(JoinType::Inner, threshold, 3));
        assert_eq!(result, expected, "threshold {}", threshold);
    }
}

#[test]
fn test_batch_size_invariance() {
    let expected = multiset(enhanced(JoinType::Inner, 2, 100));
    for batch_size in [1, 2, 5, 64] {
        assert_eq!(
            multiset(enhanced(JoinType::Inner, 2, batch_size)),
            expected,
            "batch size {}",
            batch_size
        );
    }
}

#[test]
fn test_left_outer_matches_reference() {
    assert_eq!(
        multiset(enhanced(JoinType::Left, 0, 4)),
        multiset(reference(JoinType::Left))
    );
}

#[test]
fn test_full_outer_matches_reference() {
    assert_eq!(
        multiset(enhanced(JoinType::Full, 1, 4)),
        multiset(reference(JoinType::Full))
    );
}

#[test]
fn test_distinct_right_side_collapses_duplicate_keys() {
    let (manager, _dir) = small_manager();
    let mut node = JoinNode::enhanced_merge(
        int_source("l", &[Some(3), Some(3), Some(1)]),
        int_source("r", &[Some(3), Some(3), Some(3), Some(1)]),
        JoinType::Inner,
        vec![0],
        vec![0],
        SortOption::Sort,
        SortOption::SortDistinct,
        16,
        &manager,
    );
    let ctx = ExecutionContext::new();
    let rows = multiset(collect(&mut node, &ctx));
    // Each left row matches the deduplicated right side once.
    assert_eq!(
        rows,
        vec![
            vec![Value::I64(1), Value::I64(1)],
            vec![Value::I64(3), Value::I64(3)],
            vec![Value::I64(3), Value::I64(3)],
        ]
    );
}

#[test]
fn test_cross_join_with_empty_right_is_empty() {
    let (manager, _dir) = small_manager();
    let mut node = JoinNode::enhanced_merge(
        int_source("l", &[Some(1), Some(2)]),
        int_source("r", &[]),
        JoinType::Cross,
        vec![],
        vec![],
        SortOption::NotSorted,
        SortOption::NotSorted,
        8,
        &manager,
    );
    let ctx = ExecutionContext::new();
    assert!(collect(&mut node, &ctx).is_empty());
}

#[test]
fn test_cross_join_counts() {
    let (manager, _dir) = small_manager();
    let mut node = JoinNode::enhanced_merge(
        int_source("l", &[Some(1), Some(2), Some(3)]),
        int_source("r", &[Some(7), Some(8)]),
        JoinType::Cross,
        vec![],
        vec![],
        SortOption::NotSorted,
        SortOption::NotSorted,
        // Threshold 0: even the cross group lives in the spillable
        // buffer.
        0,
        &manager,
    );
    let ctx = ExecutionContext::new().with_batch_size(2);
    assert_eq!(collect(&mut node, &ctx).len(), 6);
}
