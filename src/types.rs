//! Core types for qmdown

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::quality::Quality;

/// Unique identifier for a download task within one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the bytes of an item come from
///
/// Opaque to the downloader: a URL plus any request headers (auth tokens,
/// cookies) the resolver attached. Two locators are the same item when both
/// the URL and the headers match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Resolved media URL
    pub url: String,
    /// Extra request headers, sorted by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Locator {
    /// Locator for a plain URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Attach a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// One resolved track, ready to be transferred
///
/// Produced by a [`Resolver`](crate::resolver::Resolver) and consumed by exactly
/// one download task. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadableItem {
    /// Display name ("Title - Artist")
    pub name: String,

    /// Source of the bytes
    pub locator: Locator,

    /// Final file path
    pub destination: PathBuf,

    /// Size announced by the source, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_size: Option<u64>,

    /// Quality tier the locator delivers, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
}

impl DownloadableItem {
    /// Create an item with no size or quality metadata
    pub fn new(name: impl Into<String>, locator: Locator, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            locator,
            destination: destination.into(),
            expected_size: None,
            quality: None,
        }
    }

    /// Set the expected size in bytes
    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Set the quality tag
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }
}

/// Why a task ended without transferring anything
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Destination already existed and overwriting is off
    AlreadyExists,
    /// The run was cancelled before the task was dispatched
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyExists => f.write_str("destination already exists"),
            SkipReason::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// Lifecycle state of a download task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TaskState {
    /// Queued and waiting for a worker
    Pending,
    /// Held by a worker
    Running,
    /// Destination fully written
    Succeeded,
    /// Gave up; carries the last error
    Failed(String),
    /// Ended without a transfer
    Skipped(SkipReason),
}

impl TaskState {
    /// Whether no further transitions may happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed(_) | TaskState::Skipped(_)
        )
    }

    /// Short lowercase name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed(_) => "failed",
            TaskState::Skipped(_) => "skipped",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Failed(reason) => write!(f, "failed: {reason}"),
            TaskState::Skipped(reason) => write!(f, "skipped: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Event emitted by the downloader
///
/// Consumers subscribe via [`Downloader::subscribe`](crate::Downloader::subscribe).
/// Events are observational only; a slow consumer loses events instead of
/// slowing the workers down.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run began with this many distinct tasks
    RunStarted {
        /// Tasks enqueued after deduplication
        total: usize,
    },

    /// A worker began an attempt on a task
    Started {
        /// Task ID
        id: TaskId,
        /// Item display name
        name: String,
        /// Attempt number, starting at 1
        attempt: u32,
        /// Size announced by the resolver
        #[serde(skip_serializing_if = "Option::is_none")]
        expected_size: Option<u64>,
    },

    /// The response announced its length
    SizeKnown {
        /// Task ID
        id: TaskId,
        /// Total bytes expected
        total: u64,
    },

    /// Bytes written so far in the current attempt
    BytesAdvanced {
        /// Task ID
        id: TaskId,
        /// Cumulative byte count
        bytes: u64,
    },

    /// An attempt failed transiently; another follows after `delay`
    Retrying {
        /// Task ID
        id: TaskId,
        /// Attempt that failed
        attempt: u32,
        /// Backoff before the next attempt
        delay: Duration,
        /// Error message
        error: String,
    },

    /// A task reached its terminal state
    Finished {
        /// Task ID
        id: TaskId,
        /// Item display name
        name: String,
        /// Terminal state
        state: TaskState,
    },

    /// Every task is terminal and all workers have exited
    RunFinished {
        /// Tasks that succeeded
        succeeded: usize,
        /// Tasks that failed
        failed: usize,
        /// Tasks that were skipped
        skipped: usize,
    },
}

/// A task that ended in `Failed`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// Task ID
    pub id: TaskId,
    /// Item display name
    pub name: String,
    /// Locator URL
    pub url: String,
    /// Last error message
    pub reason: String,
}

/// Aggregate outcome of a run
///
/// Built incrementally as tasks terminate; `failures` is in completion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Tasks that succeeded
    pub succeeded: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Tasks that were skipped (existing destination or cancellation)
    pub skipped: usize,
    /// Items dropped before enqueueing because their locator repeated
    pub deduplicated: usize,
    /// Whether the run was cancelled before all tasks were dispatched
    pub cancelled: bool,
    /// Failed tasks in completion order
    pub failures: Vec<FailedItem>,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunResult {
    /// Number of tasks accounted for
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// Count one terminal task
    ///
    /// Non-terminal states are ignored.
    pub fn record(&mut self, id: TaskId, item: &DownloadableItem, state: &TaskState) {
        match state {
            TaskState::Succeeded => self.succeeded += 1,
            TaskState::Skipped(_) => self.skipped += 1,
            TaskState::Failed(reason) => {
                self.failed += 1;
                self.failures.push(FailedItem {
                    id,
                    name: item.name.clone(),
                    url: item.locator.url.clone(),
                    reason: reason.clone(),
                });
            }
            TaskState::Pending | TaskState::Running => {}
        }
    }

    /// Aggregate status used for the process exit code
    pub fn status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Cancelled
        } else if self.failed == 0 {
            RunStatus::Success
        } else if self.failed == self.total() {
            RunStatus::Failure
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Like [`status`](Self::status), counting `unresolved` tracks as failures
    ///
    /// Tracks that never became tasks (unresolvable links, manifest entries
    /// without a usable source) still make the run partial or failed.
    pub fn status_with_unresolved(&self, unresolved: usize) -> RunStatus {
        let status = self.status();
        if unresolved == 0 || status == RunStatus::Cancelled {
            return status;
        }
        if self.succeeded + self.skipped == 0 {
            RunStatus::Failure
        } else {
            RunStatus::PartialFailure
        }
    }
}

/// Aggregate status of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No task failed (an empty run counts as success)
    Success,
    /// Some tasks failed, others did not
    PartialFailure,
    /// Every task failed
    Failure,
    /// Interrupted by the user
    Cancelled,
}

impl RunStatus {
    /// Process exit code for this status
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::PartialFailure => 2,
            RunStatus::Cancelled => 130,
        }
    }
}
