//! Per-statement execution context
//!
//! Passed by reference into every node's `open` and `next_batch`. The
//! context carries the session identity, the pull batch size, an
//! optional cooperative timeslice, and the cancellation flag. Timeslice
//! expiry is a recoverable interruption: a node notices it at a batch
//! boundary and reports `Blocked`; the driver renews the slice and
//! retries. Cancellation is terminal.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 1024;

pub struct ExecutionContext {
    session_id: Uuid,
    batch_size: usize,
    timeslice: Option<Duration>,
    deadline: Mutex<Option<Instant>>,
    cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeslice: None,
            deadline: Mutex::new(None),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Give each `next_batch` call a processing time budget.
    pub fn with_timeslice(mut self, timeslice: Duration) -> Self {
        self.timeslice = Some(timeslice);
        *self.deadline.get_mut() = Some(Instant::now() + timeslice);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether the current timeslice is spent. Nodes check this at row
    /// or batch boundaries and report `Blocked` instead of continuing.
    pub fn timeslice_expired(&self) -> bool {
        matches!(*self.deadline.lock(), Some(deadline) if Instant::now() >= deadline)
    }

    /// Start a fresh timeslice. Called by the driver before retrying a
    /// blocked pull.
    pub fn renew_timeslice(&self) {
        if let Some(slice) = self.timeslice {
            *self.deadline.lock() = Some(Instant::now() + slice);
        }
    }

    /// A handle the driver can use to cancel from outside the pull loop.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail fast once the statement has been cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
