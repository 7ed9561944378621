//! Download task context - state shared by every task of a run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig};
use crate::downloader::fetcher::Fetcher;
use crate::types::Event;

/// Everything a worker needs to execute a task
///
/// Cloned once per worker; all fields are cheap handles.
#[derive(Clone)]
pub(crate) struct TaskContext {
    /// Source of bytes
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Event broadcast channel sender
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Attempt bound and backoff
    pub(crate) retry: RetryConfig,
    /// Replace destinations that already exist
    pub(crate) overwrite: bool,
    /// Minimum interval between `BytesAdvanced` events of one task
    pub(crate) progress_interval: Duration,
    /// Longest wait for the next body chunk before the attempt counts as stalled
    pub(crate) stall_timeout: Duration,
    /// Run-wide cancellation signal
    pub(crate) cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        event_tx: broadcast::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            event_tx,
            retry: config.retry.clone(),
            overwrite: config.download.overwrite,
            progress_interval: config.display.progress_interval,
            stall_timeout: config.download.request_timeout,
            cancel,
        }
    }

    /// Broadcast an event; having no subscribers is fine
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
