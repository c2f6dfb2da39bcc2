//! Append-only, optionally spillable tuple container

use crate::source::IndexedTupleSource;
use crate::spill::SpillFile;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_types::{Row, Schema};

/// A logically unbounded, append-only sequence of rows.
///
/// Cloning the handle is cheap and shares the underlying storage; the
/// creating operator owns the lifecycle. Rows live in memory up to the
/// manager's budget; beyond it the resident prefix is flushed to a
/// spill file and later rows follow the same path. Appends never
/// reorder rows, so readers always observe the original append order.
#[derive(Clone)]
pub struct TupleBuffer {
    schema: Arc<Schema>,
    inner: Arc<Mutex<BufferInner>>,
}

struct BufferInner {
    /// Rows not yet spilled; always the suffix of the sequence.
    resident: Vec<Row>,
    /// Rows [0, spilled_len) in append order.
    spill: Option<SpillFile>,
    spilled_len: usize,
    sealed: bool,
    memory_rows: usize,
    spill_dir: PathBuf,
}

impl TupleBuffer {
    pub(crate) fn new(schema: Arc<Schema>, memory_rows: usize, spill_dir: PathBuf) -> Self {
        Self {
            schema,
            inner: Arc::new(Mutex::new(BufferInner {
                resident: Vec::new(),
                spill: None,
                spilled_len: 0,
                sealed: false,
                memory_rows,
                spill_dir,
            })),
        }
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    /// Total rows appended so far.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.spilled_len + inner.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Append one row. Spills the resident set once it exceeds the
    /// memory budget.
    pub fn add_row(&self, row: Row) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return Err(Error::Sealed);
        }
        inner.resident.push(row);
        if inner.resident.len() > inner.memory_rows {
            inner.spill_resident()?;
        }
        Ok(())
    }

    /// Mark the buffer closed for writing. Idempotent. Readers created
    /// before or after sealing see the same rows.
    pub fn seal(&self) {
        self.inner.lock().sealed = true;
    }

    /// Random access read of a single row by append index.
    pub fn row(&self, index: usize) -> Result<Option<Row>> {
        let mut inner = self.inner.lock();
        if index < inner.spilled_len {
            let spill = inner.spill.as_mut().ok_or_else(|| {
                Error::Io(std::io::Error::other("spilled rows without a spill file"))
            })?;
            return spill.read_row(index).map(Some);
        }
        let resident_index = index - inner.spilled_len;
        Ok(inner.resident.get(resident_index).cloned())
    }

    /// A new independent rewindable cursor positioned at row 0.
    pub fn create_indexed_source(&self) -> IndexedTupleSource {
        IndexedTupleSource::new(self.clone())
    }
}

impl BufferInner {
    fn spill_resident(&mut self) -> Result<()> {
        if self.spill.is_none() {
            self.spill = Some(SpillFile::create(&self.spill_dir)?);
        }
        let spill = self.spill.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::other("spill file creation did not take effect"))
        })?;
        let count = self.resident.len();
        for row in self.resident.drain(..) {
            spill.append_row(&row)?;
        }
        self.spilled_len += count;
        tracing::debug!(rows = count, total_spilled = self.spilled_len, "spilled resident rows");
        Ok(())
    }
}
