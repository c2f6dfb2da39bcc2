//! External sort and duplicate removal
//!
//! Input rows accumulate in an in-memory working set bounded by the
//! buffer manager's budget; past the budget the partition is sorted
//! and spilled as a sorted run. `finish` performs an N-way merge of
//! every run plus the final partition into a fresh output buffer.
//!
//! The utility is incrementally resumable: pushing more rows after a
//! `finish` is legal, and a later `finish` merges the new data with
//! everything sorted so far. Each `finish` produces a new output
//! buffer, so cursors handed out over an earlier output keep reading
//! their snapshot untouched.

use crate::error::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tessera_buffer::{BufferManager, IndexedTupleSource, TupleBuffer};
use tessera_types::{compare_rows, Row, Schema, SortKey, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Total order over all rows by the given keys. Ties between rows
    /// with equal keys carry no arrival-order guarantee.
    Sort,
    /// Remove rows whose key was already seen, preserving *original
    /// delivery order* for the survivors. Output order is not sorted
    /// order; this is a documented contract, not an accident.
    DupRemove,
    /// Duplicates removed and the survivors returned in sorted order.
    DupRemoveSort,
}

pub struct SortUtility {
    schema: Arc<Schema>,
    keys: Vec<SortKey>,
    mode: SortMode,
    manager: BufferManager,
    /// Rows held in memory before a partition is spilled.
    budget: usize,
    /// Unsorted in-memory partition (Sort / DupRemoveSort).
    working: Vec<Row>,
    /// Sorted runs, each sealed; kept across `finish` calls so more
    /// input can still be merged in later.
    runs: Vec<TupleBuffer>,
    /// Sorted duplicate detector (DupRemove).
    seen: BTreeSet<Vec<Value>>,
    /// Arrival-order output, built incrementally (DupRemove).
    arrival_output: Option<TupleBuffer>,
}

impl SortUtility {
    pub fn new(
        schema: Arc<Schema>,
        keys: Vec<SortKey>,
        mode: SortMode,
        manager: &BufferManager,
    ) -> Self {
        Self {
            schema,
            keys,
            mode,
            manager: manager.clone(),
            budget: manager.memory_rows().max(1),
            working: Vec::new(),
            runs: Vec::new(),
            seen: BTreeSet::new(),
            arrival_output: None,
        }
    }

    /// Whether any input has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.working.is_empty() && self.runs.is_empty() && self.arrival_output.is_none()
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        match self.mode {
            SortMode::DupRemove => {
                let key = self.key_of(&row);
                if self.seen.insert(key) {
                    if self.arrival_output.is_none() {
                        self.arrival_output =
                            Some(self.manager.create_tuple_buffer(self.schema.clone()));
                    }
                    if let Some(out) = &self.arrival_output {
                        out.add_row(row)?;
                    }
                }
            }
            SortMode::Sort | SortMode::DupRemoveSort => {
                self.working.push(row);
                if self.working.len() >= self.budget {
                    self.spill_partition()?;
                }
            }
        }
        Ok(())
    }

    pub fn push_batch(&mut self, rows: Vec<Row>) -> Result<()> {
        for row in rows {
            self.push_row(row)?;
        }
        Ok(())
    }

    /// Drain whatever rows are currently available from a borrowed
    /// cursor. Returns true once the cursor is fully exhausted (its
    /// buffer sealed and read to the end).
    pub fn drain_source(&mut self, source: &mut IndexedTupleSource) -> Result<bool> {
        while let Some(row) = source.next_row().map_err(crate::error::Error::from)? {
            self.push_row(row)?;
        }
        Ok(source.is_exhausted())
    }

    /// Merge everything accepted so far into a sorted (or, for
    /// DupRemove, arrival-ordered) output buffer.
    pub fn finish(&mut self) -> Result<TupleBuffer> {
        if self.mode == SortMode::DupRemove {
            let out = match &self.arrival_output {
                Some(out) => out.clone(),
                None => self.manager.create_tuple_buffer(self.schema.clone()),
            };
            return Ok(out);
        }

        if !self.working.is_empty() {
            self.spill_partition()?;
        }

        let output = self.manager.create_tuple_buffer(self.schema.clone());
        let mut cursors: Vec<IndexedTupleSource> =
            self.runs.iter().map(|r| r.create_indexed_source()).collect();
        let mut heads: Vec<Option<Row>> = Vec::with_capacity(cursors.len());
        for cursor in &mut cursors {
            heads.push(cursor.next_row().map_err(crate::error::Error::from)?);
        }

        let dedup = self.mode == SortMode::DupRemoveSort;
        let mut last_key: Option<Row> = None;
        loop {
            // Smallest head under the sort keys wins; run index breaks
            // ties deterministically.
            let mut min: Option<usize> = None;
            for (i, head) in heads.iter().enumerate() {
                let Some(row) = head else { continue };
                min = match min {
                    Some(m) => match &heads[m] {
                        Some(best)
                            if compare_rows(&self.keys, row, best)
                                == std::cmp::Ordering::Less =>
                        {
                            Some(i)
                        }
                        _ => Some(m),
                    },
                    None => Some(i),
                };
            }
            let Some(i) = min else { break };
            let row = match heads[i].take() {
                Some(row) => row,
                None => break,
            };
            heads[i] = cursors[i].next_row().map_err(crate::error::Error::from)?;

            if dedup {
                if let Some(last) = &last_key {
                    if compare_rows(&self.keys, &row, last) == std::cmp::Ordering::Equal {
                        continue;
                    }
                }
                last_key = Some(row.clone());
            }
            output.add_row(row)?;
        }

        output.seal();
        tracing::debug!(
            runs = self.runs.len(),
            rows = output.len(),
            "merged sorted runs"
        );
        Ok(output)
    }

    fn key_of(&self, row: &Row) -> Vec<Value> {
        self.keys
            .iter()
            .map(|k| row.get(k.column).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn spill_partition(&mut self) -> Result<()> {
        let keys = self.keys.clone();
        self.working.sort_by(|a, b| compare_rows(&keys, a, b));
        let run = self.manager.create_tuple_buffer(self.schema.clone());
        for row in self.working.drain(..) {
            run.add_row(row)?;
        }
        run.seal();
        tracing::debug!(rows = run.len(), run = self.runs.len(), "spilled sorted run");
        self.runs.push(run);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_buffer::BufferConfig;
    use tessera_types::{Column, DataType};

    fn schema() -> Arc<Schema> {
        Schema::new(vec![
            Column::new("k", DataType::I64),
            Column::new("v", DataType::I64),
        ])
    }

    fn manager(memory_rows: usize) -> (BufferManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manager = BufferManager::new(BufferConfig {
            memory_rows,
            spill_dir: dir.path().to_path_buf(),
        });
        (manager, dir)
    }

    fn rows_of(buffer: &TupleBuffer) -> Vec<Row> {
        let mut source = buffer.create_indexed_source();
        let mut rows = Vec::new();
        while let Some(row) = source.next_row().unwrap() {
            rows.push(row);
        }
        rows
    }

    fn row(k: i64, v: i64) -> Row {
        vec![Value::I64(k), Value::I64(v)]
    }

    #[test]
    fn test_sort_across_spilled_runs() {
        let (manager, _dir) = manager(3);
        let mut sorter = SortUtility::new(schema(), vec![SortKey::asc(0)], SortMode::Sort, &manager);
        for k in [9, 1, 8, 2, 7, 3, 6, 4, 5, 0] {
            sorter.push_row(row(k, k * 10)).unwrap();
        }
        let out = sorter.finish().unwrap();
        let keys: Vec<i64> = rows_of(&out)
            .iter()
            .map(|r| match r[0] {
                Value::I64(k) => k,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let (manager, _dir) = manager(4);
        let input = vec![row(3, 1), row(1, 2), row(2, 3)];

        let mut first = SortUtility::new(schema(), vec![SortKey::asc(0)], SortMode::Sort, &manager);
        first.push_batch(input).unwrap();
        let sorted_once = rows_of(&first.finish().unwrap());

        let mut second = SortUtility::new(schema(), vec![SortKey::asc(0)], SortMode::Sort, &manager);
        second.push_batch(sorted_once.clone()).unwrap();
        let sorted_twice = rows_of(&second.finish().unwrap());

        assert_eq!(sorted_once, sorted_twice);
    }

    #[test]
    fn test_dup_remove_preserves_arrival_order() {
        let (manager, _dir) = manager(100);
        let mut sorter =
            SortUtility::new(schema(), vec![SortKey::asc(0)], SortMode::DupRemove, &manager);
        for (k, v) in [(5, 1), (2, 2), (5, 3), (9, 4), (2, 5), (1, 6)] {
            sorter.push_row(row(k, v)).unwrap();
        }
        let out = sorter.finish().unwrap();
        // Survivors keep delivery order, not key order.
        assert_eq!(rows_of(&out), vec![row(5, 1), row(2, 2), row(9, 4), row(1, 6)]);
    }

    #[test]
    fn test_dup_remove_sort_orders_survivors() {
        let (manager, _dir) = manager(2);
        let mut sorter = SortUtility::new(
            schema(),
            vec![SortKey::asc(0)],
            SortMode::DupRemoveSort,
            &manager,
        );
        for (k, v) in [(5, 1), (2, 2), (5, 3), (9, 4), (2, 5), (1, 6)] {
            sorter.push_row(row(k, v)).unwrap();
        }
        let out = sorter.finish().unwrap();
        let keys: Vec<i64> = rows_of(&out)
            .iter()
            .map(|r| match r[0] {
                Value::I64(k) => k,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![1, 2, 5, 9]);
    }

    #[test]
    fn test_incremental_input_after_finish() {
        let (manager, _dir) = manager(2);
        let mut sorter = SortUtility::new(schema(), vec![SortKey::asc(0)], SortMode::Sort, &manager);
        sorter.push_batch(vec![row(4, 0), row(2, 0)]).unwrap();

        let first = sorter.finish().unwrap();
        let mut early_reader = first.create_indexed_source();
        assert_eq!(early_reader.next_row().unwrap(), Some(row(2, 0)));

        // More input arrives mid-sort; a later finish folds it in.
        sorter.push_batch(vec![row(1, 0), row(3, 0)]).unwrap();
        let second = sorter.finish().unwrap();
        assert_eq!(
            rows_of(&second),
            vec![row(1, 0), row(2, 0), row(3, 0), row(4, 0)]
        );

        // The cursor opened on the first output still sees its snapshot.
        assert_eq!(early_reader.next_row().unwrap(), Some(row(4, 0)));
        assert_eq!(early_reader.next_row().unwrap(), None);
    }

    #[test]
    fn test_drain_source_resumes_until_sealed() {
        let (manager, _dir) = manager(2);
        let buffer = manager.create_tuple_buffer(schema());
        let mut cursor = buffer.create_indexed_source();
        let mut sorter = SortUtility::new(schema(), vec![SortKey::asc(0)], SortMode::Sort, &manager);

        buffer.add_row(row(3, 0)).unwrap();
        buffer.add_row(row(1, 0)).unwrap();
        // Writer still active: the cursor is drained but not exhausted.
        assert!(!sorter.drain_source(&mut cursor).unwrap());

        buffer.add_row(row(2, 0)).unwrap();
        buffer.seal();
        // The same borrowed cursor picks up where it stopped.
        assert!(sorter.drain_source(&mut cursor).unwrap());

        let out = sorter.finish().unwrap();
        assert_eq!(rows_of(&out), vec![row(1, 0), row(2, 0), row(3, 0)]);
    }

    #[test]
    fn test_descending_with_nulls_last() {
        let (manager, _dir) = manager(100);
        let key = SortKey::desc(0).with_nulls(tessera_types::NullOrder::NullsLast);
        let mut sorter = SortUtility::new(schema(), vec![key], SortMode::Sort, &manager);
        sorter
            .push_batch(vec![
                vec![Value::Null, Value::I64(0)],
                row(3, 0),
                row(7, 0),
            ])
            .unwrap();
        let out = sorter.finish().unwrap();
        assert_eq!(
            rows_of(&out),
            vec![row(7, 0), row(3, 0), vec![Value::Null, Value::I64(0)]]
        );
    }
}
