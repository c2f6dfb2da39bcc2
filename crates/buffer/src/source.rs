//! Rewindable cursors over tuple buffers

use crate::tuple_buffer::TupleBuffer;
use crate::Result;
use tessera_types::Row;

/// An independent cursor over a [`TupleBuffer`].
///
/// Multiple sources over the same buffer do not affect each other.
/// `next_row` returning `None` means no row exists at the current
/// position *yet*; for an unsealed buffer the writer may still append,
/// and a later call will then return the new row.
pub struct IndexedTupleSource {
    buffer: TupleBuffer,
    position: usize,
}

impl IndexedTupleSource {
    pub(crate) fn new(buffer: TupleBuffer) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Whether the underlying buffer can still grow.
    pub fn is_exhausted(&self) -> bool {
        self.buffer.is_sealed() && self.position >= self.buffer.len()
    }

    pub fn next_row(&mut self) -> Result<Option<Row>> {
        match self.buffer.row(self.position)? {
            Some(row) => {
                self.position += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }
}
