//! Row-batch execution core
//!
//! Pull-based operator trees over row batches:
//! - A cooperative node protocol where a not-ready child surfaces as
//!   `Pull::Blocked` and every node resumes from saved state
//! - Join strategies (nested-loop, sort-merge, enhanced sort-merge
//!   with repeated-key buffering)
//! - An external sort utility with spillable runs and duplicate
//!   removal, shared by joins and DISTINCT aggregates
//! - Grouping/aggregation plus Limit, Union-All, Select, and Project
//!
//! Execution is driven per session through an [`ExecutionContext`]
//! carrying batch size, timeslice, and cancellation.

pub mod context;
pub mod error;
pub mod expression;
pub mod join;
pub mod node;
pub mod sort;

pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use expression::Expression;
pub use join::{JoinNode, JoinType, SortOption};
pub use node::{
    AggregateFunction, AggregateSpec, BoxedNode, ExecutionNode, GroupingNode, LimitNode,
    ProjectNode, Pull, SelectNode, UnionAllNode, ValuesNode,
};
pub use sort::{SortMode, SortUtility};
