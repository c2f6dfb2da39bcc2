//! Merge-join strategy
//!
//! Both inputs must arrive key-sorted; `Sort` and `SortDistinct` modes
//! run the child through the sort utility during materialization,
//! `AlreadySorted` trusts the child. The merge advances the side with
//! the smaller key; on equality it delimits both equal-key groups and
//! emits their cross product. NULL keys never match — they are skipped
//! for INNER/CROSS output but still drive outer padding.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::join::input::JoinInput;
use crate::join::{joined_row, key_is_null, key_of, pad_left, pad_right, JoinPull, JoinType, SortOption};
use crate::node::BoxedNode;
use std::sync::Arc;
use tessera_buffer::BufferManager;
use tessera_types::Schema;

/// The cross-product emission cursor over a pair of equal-key groups.
/// Index ranges are half-open over the materialized inputs.
struct CrossGroup {
    l_end: usize,
    r_start: usize,
    r_end: usize,
    l_pos: usize,
    r_pos: usize,
}

pub struct MergeJoin {
    join_type: JoinType,
    left_keys: Vec<usize>,
    right_keys: Vec<usize>,
    left_mode: SortOption,
    right_mode: SortOption,
    left_schema: Arc<Schema>,
    right_schema: Arc<Schema>,
    manager: BufferManager,

    left_input: JoinInput,
    right_input: JoinInput,
    /// Merge cursors into the materialized inputs.
    li: usize,
    ri: usize,
    group: Option<CrossGroup>,
    cross_started: bool,
}

impl MergeJoin {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        join_type: JoinType,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        left_mode: SortOption,
        right_mode: SortOption,
        left_schema: Arc<Schema>,
        right_schema: Arc<Schema>,
        manager: &BufferManager,
    ) -> Result<Self> {
        if left_mode == SortOption::NotSorted || right_mode == SortOption::NotSorted {
            return Err(Error::Internal(
                "merge join requires sorted inputs; use the enhanced strategy for unsorted children"
                    .into(),
            ));
        }
        let left_input = JoinInput::new(left_mode, &left_keys, left_schema.clone(), manager);
        let right_input = JoinInput::new(right_mode, &right_keys, right_schema.clone(), manager);
        Ok(Self {
            join_type,
            left_keys,
            right_keys,
            left_mode,
            right_mode,
            left_schema,
            right_schema,
            manager: manager.clone(),
            left_input,
            right_input,
            li: 0,
            ri: 0,
            group: None,
            cross_started: false,
        })
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

        // CROSS degenerates into one group covering both sides.
        if self.join_type == JoinType::Cross && !self.cross_started {
            self.cross_started = true;
            if llen > 0 && rlen > 0 {
                self.group = Some(CrossGroup {
                    l_end: llen,
                    r_start: 0,
                    r_end: rlen,
                    l_pos: 0,
                    r_pos: 0,
                });
            }
            self.li = llen;
            self.ri = rlen;
        }

        loop {
            if let Some(row) = self.emit_group()? {
                return Ok(JoinPull::Row(row));
            }

            if self.li >= llen {
                // Left exhausted: FULL still owes pads for the rights
                // never consumed by a group.
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

            if key_is_null(&left_key) {
                self.li += 1;
                if matches!(self.join_type, JoinType::Left | JoinType::Full) {
                    return Ok(JoinPull::Row(pad_right(
                        &left_row,
                        self.right_schema.arity(),
                    )));
                }
                continue;
            }

            if self.ri >= rlen {
                // No right rows remain; every further left row is
                // unmatched.
                self.li += 1;
                if matches!(self.join_type, JoinType::Left | JoinType::Full) {
                    return Ok(JoinPull::Row(pad_right(
                        &left_row,
                        self.right_schema.arity(),
                    )));
                }
                return Ok(JoinPull::Done);
            }

            let right_row = self.right_input.row(self.ri)?;
            let right_key = key_of(&right_row, &self.right_keys);

            if key_is_null(&right_key) {
                self.ri += 1;
                if self.join_type == JoinType::Full {
                    return Ok(JoinPull::Row(pad_left(
                        &right_row,
                        self.left_schema.arity(),
                    )));
                }
                continue;
            }

            match left_key.cmp(&right_key) {
                std::cmp::Ordering::Less => {
                    self.li += 1;
                    if matches!(self.join_type, JoinType::Left | JoinType::Full) {
                        return Ok(JoinPull::Row(pad_right(
                            &left_row,
                            self.right_schema.arity(),
                        )));
                    }
                }
                std::cmp::Ordering::Greater => {
                    self.ri += 1;
                    if self.join_type == JoinType::Full {
                        return Ok(JoinPull::Row(pad_left(
                            &right_row,
                            self.left_schema.arity(),
                        )));
                    }
                }
                std::cmp::Ordering::Equal => {
                    // Delimit both equal-key groups, then emit the
                    // cross product row by row.
                    let mut l_end = self.li + 1;
                    while l_end < llen
                        && key_of(&self.left_input.row(l_end)?, &self.left_keys) == left_key
                    {
                        l_end += 1;
                    }
                    let mut r_end = self.ri + 1;
                    while r_end < rlen
                        && key_of(&self.right_input.row(r_end)?, &self.right_keys) == right_key
                    {
                        r_end += 1;
                    }
                    self.group = Some(CrossGroup {
                        l_end,
                        r_start: self.ri,
                        r_end,
                        l_pos: self.li,
                        r_pos: self.ri,
                    });
                    self.li = l_end;
                    self.ri = r_end;
                }
            }
        }
    }

    /// Emit the next pair of the active group cross product, if any.
    fn emit_group(&mut self) -> Result<Option<tessera_types::Row>> {
        let (l_pos, r_pos) = match &self.group {
            Some(group) => (group.l_pos, group.r_pos),
            None => return Ok(None),
        };
        let left_row = self.left_input.row(l_pos)?;
        let right_row = self.right_input.row(r_pos)?;
        let row = joined_row(&left_row, &right_row);

        if let Some(group) = &mut self.group {
            group.r_pos += 1;
            if group.r_pos >= group.r_end {
                group.r_pos = group.r_start;
                group.l_pos += 1;
                if group.l_pos >= group.l_end {
                    self.group = None;
                }
            }
        }
        Ok(Some(row))
    }
}
