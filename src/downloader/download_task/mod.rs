//! Download task -- one item's transfer lifecycle.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state handed to every task (fetcher, events, policy)
//! - [`execution`] - Skip check, retried transfer, partial-file cleanup

mod context;
mod execution;


pub(crate) use context::TaskContext;
pub(crate) use execution::run_task;

use crate::error::{Error, Result};
use crate::types::{DownloadableItem, TaskId, TaskState};

/// One item's transfer, owned by a worker while it runs
///
/// The state only moves forward: `Pending -> Running -> terminal`, or straight
/// from `Pending` to a terminal state when the task is skipped. A terminal
/// state is set exactly once.
#[derive(Clone, Debug)]
pub struct DownloadTask {
    id: TaskId,
    item: DownloadableItem,
    state: TaskState,
    bytes_transferred: u64,
    attempts: u32,
}

impl DownloadTask {
    /// New pending task
    pub fn new(id: TaskId, item: DownloadableItem) -> Self {
        Self {
            id,
            item,
            state: TaskState::Pending,
            bytes_transferred: 0,
            attempts: 0,
        }
    }

    /// Task ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The item being transferred
    pub fn item(&self) -> &DownloadableItem {
        &self.item
    }

    /// Current state
    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Bytes written by the last attempt
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Move from `Pending` to `Running`
    pub(crate) fn start(&mut self) -> Result<()> {
        if self.state != TaskState::Pending {
            return Err(self.invalid(self.state.name(), "running"));
        }
        self.state = TaskState::Running;
        Ok(())
    }

    /// Record transfer progress of the running task
    pub(crate) fn record_progress(&mut self, attempts: u32, bytes: u64) {
        self.attempts = attempts;
        self.bytes_transferred = bytes;
    }

    /// Set the terminal state
    ///
    /// Fails if `state` is not terminal or the task already finished.
    pub(crate) fn finish(&mut self, state: TaskState) -> Result<()> {
        if !state.is_terminal() {
            return Err(self.invalid(self.state.name(), state.name()));
        }
        if self.state.is_terminal() {
            return Err(self.invalid(self.state.name(), state.name()));
        }
        self.state = state;
        Ok(())
    }

    fn invalid(&self, from: &'static str, to: &'static str) -> Error {
        Error::InvalidTransition {
            id: self.id.0,
            from,
            to,
        }
    }
}
