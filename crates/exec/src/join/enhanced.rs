//! Enhanced sort-merge join strategy
//!
//! Extends the plain merge join for inputs that are not guaranteed
//! sorted (a `NotSorted` side is sorted internally through the sort
//! utility) and for key distributions with heavy repetition: the last
//! equal-key group stays buffered, so a run of identical left keys
//! re-probes the buffered group instead of rescanning the right
//! cursor. A configurable row threshold decides whether a group lives
//! in memory or in a spillable tuple buffer; the decision depends only
//! on the threshold and the group size, so it is deterministic for a
//! given input.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::join::input::JoinInput;
use crate::join::{joined_row, key_is_null, key_of, pad_left, pad_right, JoinPull, JoinType, SortOption};
use crate::node::BoxedNode;
use std::sync::Arc;
use tessera_buffer::{BufferManager, TupleBuffer};
use tessera_types::{Row, Schema, Value};

/// Where an equal-key group is buffered.
enum GroupStore {
    Memory(Vec<Row>),
    Spilled(TupleBuffer),
}

impl GroupStore {
    fn len(&self) -> usize {
        match self {
            GroupStore::Memory(rows) => rows.len(),
            GroupStore::Spilled(buffer) => buffer.len(),
        }
    }

    fn row(&self, index: usize) -> Result<Row> {
        match self {
            GroupStore::Memory(rows) => rows
                .get(index)
                .cloned()
                .ok_or_else(|| Error::Internal(format!("group row {} out of range", index))),
            GroupStore::Spilled(buffer) => buffer
                .row(index)?
                .ok_or_else(|| Error::Internal(format!("group row {} out of range", index))),
        }
    }
}

/// The buffered right-side equal-key group, kept across left rows so
/// repeated keys re-match in O(1) amortized.
struct RepeatedGroup {
    key: Vec<Value>,
    rows: GroupStore,
}

pub struct EnhancedMergeJoin {
    join_type: JoinType,
    left_keys: Vec<usize>,
    right_keys: Vec<usize>,
    left_mode: SortOption,
    right_mode: SortOption,
    /// Group rows above this count move to a spillable buffer.
    memory_row_threshold: usize,
    left_schema: Arc<Schema>,
    right_schema: Arc<Schema>,
    manager: BufferManager,

    left_input: JoinInput,
    right_input: JoinInput,
    li: usize,
    ri: usize,
    group: Option<RepeatedGroup>,
    /// Emission cursor into `group` for the current left row.
    emit_pos: Option<usize>,
    cross_started: bool,
}

impl EnhancedMergeJoin {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        join_type: JoinType,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        left_mode: SortOption,
        right_mode: SortOption,
        memory_row_threshold: usize,
        left_schema: Arc<Schema>,
        right_schema: Arc<Schema>,
        manager: &BufferManager,
    ) -> Self {
        let left_input = JoinInput::new(left_mode, &left_keys, left_schema.clone(), manager);
        let right_input = JoinInput::new(right_mode, &right_keys, right_schema.clone(), manager);
        Self {
            join_type,
            left_keys,
            right_keys,
            left_mode,
            right_mode,
            memory_row_threshold,
            left_schema,
            right_schema,
            manager: manager.clone(),
            left_input,
            right_input,
            li: 0,
            ri: 0,
            group: None,
            emit_pos: None,
            cross_started: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.left_input = JoinInput::new(
            self.left_mode,
            &self.left_keys,
            self.left_schema.clone(),
            &self.manager,
        );
        self.right_input = JoinInput::new(
            self.right_mode,
            &self.right_keys,
            self.right_schema.clone(),
            &self.manager,
        );
        self.li = 0;
        self.ri = 0;
        self.group = None;
        self.emit_pos = None;
        self.cross_started = false;
    }

    pub(crate) fn pull(
        &mut self,
        left: &mut BoxedNode,
        right: &mut BoxedNode,
        ctx: &ExecutionContext,
    ) -> Result<JoinPull> {
        if !self.left_input.materialize(left, ctx)? {
            return Ok(JoinPull::Blocked);
        }
        if !self.right_input.materialize(right, ctx)? {
            return Ok(JoinPull::Blocked);
        }

        let llen = self.left_input.len();
        let rlen = self.right_input.len();

        // CROSS: one persistent group holding the whole right side,
        // which every left row then matches.
        if self.join_type == JoinType::Cross && !self.cross_started {
            self.cross_started = true;
            let mut store = self.new_store();
            for i in 0..rlen {
                let row = self.right_input.row(i)?;
                store = self.push_to_store(store, row)?;
            }
            if let GroupStore::Spilled(buffer) = &store {
                buffer.seal();
            }
            self.group = Some(RepeatedGroup {
                key: Vec::new(),
                rows: store,
            });
            self.ri = rlen;
        }

        loop {
            // Drain the active group emission for the current left row.
            if let Some(pos) = self.emit_pos {
                let group = self
                    .group
                    .as_ref()
                    .ok_or_else(|| Error::Internal("emission without a buffered group".into()))?;
                if pos < group.rows.len() {
                    let left_row = self.left_input.row(self.li)?;
                    let right_row = group.rows.row(pos)?;
                    self.emit_pos = Some(pos + 1);
                    return Ok(JoinPull::Row(joined_row(&left_row, &right_row)));
                }
                self.emit_pos = None;
                self.li += 1;
                continue;
            }

            if self.li >= llen {
                if self.join_type == JoinType::Full && self.ri < rlen {
                    let right_row = self.right_input.row(self.ri)?;
                    self.ri += 1;
                    return Ok(JoinPull::Row(pad_left(
                        &right_row,
                        self.left_schema.arity(),
                    )));
                }
                return Ok(JoinPull::Done);
            }

            let left_row = self.left_input.row(self.li)?;
            let left_key = key_of(&left_row, &self.left_keys);

            if self.join_type != JoinType::Cross && key_is_null(&left_key) {
                self.li += 1;
                if matches!(self.join_type, JoinType::Left | JoinType::Full) {
                    return Ok(JoinPull::Row(pad_right(
                        &left_row,
                        self.right_schema.arity(),
                    )));
                }
                continue;
            }

            // Repeated-merge case: the buffered group already holds
            // this key's matches.
            let group_matches = match &self.group {
                Some(group) => self.join_type == JoinType::Cross || group.key == left_key,
                None => false,
            };
            if group_matches {
                let group_len = self.group.as_ref().map(|g| g.rows.len()).unwrap_or(0);
                if group_len > 0 {
                    self.emit_pos = Some(0);
                    continue;
                }
                // Empty group only happens for CROSS with an empty
                // right side: every left row is unmatched.
                self.li += 1;
                if matches!(self.join_type, JoinType::Left | JoinType::Full) {
                    return Ok(JoinPull::Row(pad_right(
                        &left_row,
                        self.right_schema.arity(),
                    )));
                }
                continue;
            }

            // Advance the right cursor to the left key and buffer its
            // equal-key group.
            match self.advance_right(&left_key, rlen)? {
                RightAdvance::PadRight(row) => {
                    return Ok(JoinPull::Row(pad_left(&row, self.left_schema.arity())));
                }
                RightAdvance::GroupReady => {
                    self.emit_pos = Some(0);
                }
                RightAdvance::NoMatch => {
                    self.li += 1;
                    if matches!(self.join_type, JoinType::Left | JoinType::Full) {
                        return Ok(JoinPull::Row(pad_right(
                            &left_row,
                            self.right_schema.arity(),
                        )));
                    }
                }
            }
        }
    }

    fn advance_right(&mut self, left_key: &[Value], rlen: usize) -> Result<RightAdvance> {
        loop {
            if self.ri >= rlen {
                return Ok(RightAdvance::NoMatch);
            }
            let right_row = self.right_input.row(self.ri)?;
            let right_key = key_of(&right_row, &self.right_keys);

            if key_is_null(&right_key) {
                self.ri += 1;
                if self.join_type == JoinType::Full {
                    return Ok(RightAdvance::PadRight(right_row));
                }
                continue;
            }

            match right_key.as_slice().cmp(left_key) {
                std::cmp::Ordering::Less => {
                    self.ri += 1;
                    if self.join_type == JoinType::Full {
                        return Ok(RightAdvance::PadRight(right_row));
                    }
                }
                std::cmp::Ordering::Greater => return Ok(RightAdvance::NoMatch),
                std::cmp::Ordering::Equal => {
                    let mut store = self.new_store();
                    store = self.push_to_store(store, right_row)?;
                    self.ri += 1;
                    // A SortDistinct side has single-row groups by
                    // construction; skip the boundary scan.
                    if !self.right_input.is_distinct() {
                        while self.ri < rlen {
                            let row = self.right_input.row(self.ri)?;
                            if key_of(&row, &self.right_keys).as_slice() != left_key {
                                break;
                            }
                            store = self.push_to_store(store, row)?;
                            self.ri += 1;
                        }
                    }
                    if let GroupStore::Spilled(buffer) = &store {
                        buffer.seal();
                        tracing::debug!(
                            rows = buffer.len(),
                            threshold = self.memory_row_threshold,
                            "equal-key group buffered via spillable buffer"
                        );
                    }
                    self.group = Some(RepeatedGroup {
                        key: left_key.to_vec(),
                        rows: store,
                    });
                    return Ok(RightAdvance::GroupReady);
                }
            }
        }
    }

    fn new_store(&self) -> GroupStore {
        GroupStore::Memory(Vec::new())
    }

    /// Append a row to a group store, switching to the spillable
    /// buffer once the memory threshold is crossed.
    fn push_to_store(&self, store: GroupStore, row: Row) -> Result<GroupStore> {
        match store {
            GroupStore::Memory(mut rows) => {
                if rows.len() < self.memory_row_threshold {
                    rows.push(row);
                    Ok(GroupStore::Memory(rows))
                } else {
                    let buffer = self.manager.create_tuple_buffer(self.right_schema.clone());
                    for earlier in rows {
                        buffer.add_row(earlier)?;
                    }
                    buffer.add_row(row)?;
                    Ok(GroupStore::Spilled(buffer))
                }
            }
            GroupStore::Spilled(buffer) => {
                buffer.add_row(row)?;
                Ok(GroupStore::Spilled(buffer))
            }
        }
    }
}

enum RightAdvance {
    /// A right row that can no longer match; FULL pads it.
    PadRight(Row),
    /// The equal-key group is buffered and ready for emission.
    GroupReady,
    /// No right rows match the current left key.
    NoMatch,
}
