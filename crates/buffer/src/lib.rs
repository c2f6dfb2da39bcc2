//! Buffer manager for the tessera execution core
//!
//! Operators that materialize intermediate results (sorted runs, join
//! build sides, repeated-key groups) allocate tuple buffers here. A
//! buffer holds rows in memory up to a per-manager budget and spills
//! the resident prefix to secondary storage transparently once the
//! budget is exceeded. Readers get independent rewindable cursors that
//! see a consistent append-only snapshot even while the writer is
//! still appending.

mod source;
mod spill;
mod tuple_buffer;

pub use source::IndexedTupleSource;
pub use tuple_buffer::TupleBuffer;

use std::path::PathBuf;
use std::sync::Arc;
use tessera_types::Schema;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Spill I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spill encoding error: {0}")]
    Encoding(String),

    #[error("Buffer is sealed for writing")]
    Sealed,
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

/// Configuration for a buffer manager instance.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Rows a single buffer may hold in memory before spilling.
    pub memory_rows: usize,
    /// Directory for spill files.
    pub spill_dir: PathBuf,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            memory_rows: 4096,
            spill_dir: std::env::temp_dir(),
        }
    }
}

/// Allocates tuple buffers and carries the memory budget that governs
/// the in-memory-vs-spill decision for every buffer it creates.
#[derive(Debug, Clone)]
pub struct BufferManager {
    config: BufferConfig,
}

impl BufferManager {
    pub fn new(config: BufferConfig) -> Self {
        Self { config }
    }

    /// A manager with an effectively unbounded in-memory budget.
    pub fn in_memory() -> Self {
        Self::new(BufferConfig {
            memory_rows: usize::MAX,
            ..BufferConfig::default()
        })
    }

    /// Rows a buffer may hold resident before it spills.
    pub fn memory_rows(&self) -> usize {
        self.config.memory_rows
    }

    /// Create a new, empty tuple buffer bound to this manager's budget.
    pub fn create_tuple_buffer(&self, schema: Arc<Schema>) -> TupleBuffer {
        TupleBuffer::new(schema, self.config.memory_rows, self.config.spill_dir.clone())
    }
}
