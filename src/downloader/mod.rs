//! Core downloader implementation split into focused submodules.
//!
//! The [`Downloader`] coordinator owns the event channel and drives one run:
//! - [`fetcher`] - Byte sources (HTTP in production, fakes in tests)
//! - [`queue`] - Shared FIFO of pending tasks
//! - [`pool`] - Fixed-size worker pool
//! - [`download_task`] - Per-item transfer lifecycle

mod download_task;
pub mod fetcher;
mod pool;
mod queue;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use download_task::DownloadTask;
pub use fetcher::{FetchResponse, Fetcher, HttpFetcher};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::types::{DownloadableItem, Event, Locator, RunResult, TaskId};
use download_task::TaskContext;

/// Run coordinator (cloneable - all fields are Arc-wrapped)
///
/// Turns resolved items into tasks, runs them through the worker pool and
/// aggregates the outcome. Progress is published on a broadcast channel;
/// see [`Downloader::subscribe`].
#[derive(Clone)]
pub struct Downloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Source of bytes for every task
    fetcher: Arc<dyn Fetcher>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
}

impl Downloader {
    /// Create a downloader fetching over HTTP
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.download)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a downloader with a custom byte source
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(config.display.event_capacity);
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            event_tx,
        })
    }

    /// Subscribe to run events
    ///
    /// Subscribe before calling [`coordinate`](Self::coordinate) to see the
    /// whole run. A receiver that falls behind by more than the channel
    /// capacity skips the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download every item and report the aggregate outcome
    ///
    /// Phases:
    /// 1. Drop items whose locator (or destination) repeats an earlier item
    /// 2. Wrap the rest in pending tasks, numbered from 1 in submission order
    /// 3. Run them through the worker pool with `num_workers` workers
    /// 4. Publish [`Event::RunFinished`] and return the [`RunResult`]
    ///
    /// Per-item failures never make this return `Err`; they are counted in
    /// the result. Cancelling `cancel` stops dispatching new tasks and winds
    /// down running ones; the partial result is still returned.
    pub async fn coordinate(
        &self,
        items: Vec<DownloadableItem>,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        // Phase 1: Deduplicate
        let submitted = items.len();
        let (items, deduplicated) = dedup(items);
        if deduplicated > 0 {
            tracing::info!(
                submitted = submitted,
                deduplicated = deduplicated,
                "Dropped duplicate items"
            );
        }

        // Phase 2: Build tasks
        let tasks: Vec<DownloadTask> = items
            .into_iter()
            .zip(1u64..)
            .map(|(item, id)| DownloadTask::new(TaskId(id), item))
            .collect();
        self.event_tx
            .send(Event::RunStarted { total: tasks.len() })
            .ok();

        // Phase 3: Run the pool
        let ctx = TaskContext::new(
            &self.config,
            Arc::clone(&self.fetcher),
            self.event_tx.clone(),
            cancel,
        );
        let mut result = pool::run(tasks, self.config.download.num_workers, ctx).await?;
        result.deduplicated = deduplicated;

        // Phase 4: Publish summary
        tracing::info!(
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            cancelled = result.cancelled,
            elapsed_ms = result.elapsed.as_millis(),
            "Run finished"
        );
        self.event_tx
            .send(Event::RunFinished {
                succeeded: result.succeeded,
                failed: result.failed,
                skipped: result.skipped,
            })
            .ok();

        Ok(result)
    }
}

/// Keep the first item per locator and per destination, preserving order
///
/// Returns the kept items and how many were dropped.
fn dedup(items: Vec<DownloadableItem>) -> (Vec<DownloadableItem>, usize) {
    let mut locators: HashSet<Locator> = HashSet::with_capacity(items.len());
    let mut destinations: HashSet<PathBuf> = HashSet::with_capacity(items.len());
    let mut dropped = 0;

    let kept = items
        .into_iter()
        .filter(|item| {
            if locators.contains(&item.locator) {
                tracing::debug!(url = %item.locator, "Duplicate locator");
                dropped += 1;
                return false;
            }
            if destinations.contains(&item.destination) {
                tracing::warn!(
                    name = %item.name,
                    destination = %item.destination.display(),
                    "Another item already writes to this destination"
                );
                dropped += 1;
                return false;
            }
            locators.insert(item.locator.clone());
            destinations.insert(item.destination.clone());
            true
        })
        .collect();

    (kept, dropped)
}
