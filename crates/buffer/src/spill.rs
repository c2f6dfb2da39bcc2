//! Spill file format: an ordered run of bincode-encoded rows
//!
//! Rows are appended sequentially; a per-row offset index kept in
//! memory supports random access reads by row index. The file is
//! removed when the owning buffer is dropped.

use crate::Result;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::PathBuf;
use tessera_types::Row;
use uuid::Uuid;

pub(crate) struct SpillFile {
    file: File,
    path: PathBuf,
    /// Byte offset of each row in the file.
    offsets: Vec<u64>,
    /// Logical end of the file in bytes.
    end: u64,
}

impl SpillFile {
    pub fn create(dir: &std::path::Path) -> Result<Self> {
        let path = dir.join(format!("tessera-spill-{}.run", Uuid::new_v4()));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        tracing::debug!(path = %path.display(), "created spill file");
        Ok(Self {
            file,
            path,
            offsets: Vec::new(),
            end: 0,
        })
    }

    pub fn append_row(&mut self, row: &Row) -> Result<()> {
        let bytes = bincode::serialize(row)?;
        self.file.seek(SeekFrom::Start(self.end))?;
        std::io::Write::write_all(&mut self.file, &bytes)?;
        self.offsets.push(self.end);
        self.end += bytes.len() as u64;
        Ok(())
    }

    pub fn read_row(&mut self, index: usize) -> Result<Row> {
        let offset = self.offsets[index];
        self.file.seek(SeekFrom::Start(offset))?;
        let row = bincode::deserialize_from(&mut self.file)?;
        Ok(row)
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove spill file");
        }
    }
}
