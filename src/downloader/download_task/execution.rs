//! Download task execution - skip check, retried transfer, partial-file cleanup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::TransferError;
use crate::progress::ProgressThrottle;
use crate::retry::download_with_retry;
use crate::types::{DownloadableItem, Event, SkipReason, TaskId, TaskState};
use crate::utils::PART_SUFFIX;

use super::DownloadTask;
use super::context::TaskContext;

/// Core task execution -- drives a single task to its terminal state.
///
/// Phases:
/// 1. Skip when the run is already cancelled or the destination exists
/// 2. Transition to Running
/// 3. Transfer with retry (each attempt writes `<destination>.part`)
/// 4. Record the terminal state and broadcast it
///
/// Never fails: every error ends up in the task's terminal state.
pub(crate) async fn run_task(task: &mut DownloadTask, ctx: &TaskContext) {
    let id = task.id();

    // Phase 1: Skip check
    if let Some(reason) = skip_reason(task.item(), ctx).await {
        tracing::info!(task_id = id.0, name = %task.item().name, reason = %reason, "Skipping task");
        finish(task, ctx, TaskState::Skipped(reason));
        return;
    }

    // Phase 2: Pending -> Running
    if let Err(e) = task.start() {
        tracing::error!(task_id = id.0, error = %e, "Task cannot start");
        return;
    }

    // Phase 3: Transfer with retry
    let attempts = AtomicU32::new(0);
    let bytes = AtomicU64::new(0);
    let outcome = {
        let item = task.item();
        let attempts = &attempts;
        let bytes = &bytes;
        download_with_retry(
            &ctx.retry,
            &ctx.cancel,
            |attempt, delay, error: &TransferError| {
                ctx.emit(Event::Retrying {
                    id,
                    attempt,
                    delay,
                    error: error.to_string(),
                });
            },
            move |attempt| {
                attempts.store(attempt, Ordering::Relaxed);
                transfer_once(ctx, id, item, attempt, bytes)
            },
        )
        .await
    };
    task.record_progress(
        attempts.load(Ordering::Relaxed),
        bytes.load(Ordering::Relaxed),
    );

    // Phase 4: Terminal state
    let state = match outcome {
        Ok(()) => {
            tracing::info!(
                task_id = id.0,
                name = %task.item().name,
                bytes = task.bytes_transferred(),
                attempts = task.attempts(),
                "Download complete"
            );
            TaskState::Succeeded
        }
        Err(e) => {
            // Whatever the last attempt saw, a cancelled run reports cancellation
            let e = if ctx.cancel.is_cancelled() {
                TransferError::Cancelled
            } else {
                e
            };
            tracing::warn!(
                task_id = id.0,
                name = %task.item().name,
                attempts = task.attempts(),
                error = %e,
                "Download failed"
            );
            TaskState::Failed(e.to_string())
        }
    };
    finish(task, ctx, state);
}

async fn skip_reason(item: &DownloadableItem, ctx: &TaskContext) -> Option<SkipReason> {
    if ctx.cancel.is_cancelled() {
        return Some(SkipReason::Cancelled);
    }
    if !ctx.overwrite && matches!(tokio::fs::try_exists(&item.destination).await, Ok(true)) {
        return Some(SkipReason::AlreadyExists);
    }
    None
}

fn finish(task: &mut DownloadTask, ctx: &TaskContext, state: TaskState) {
    let id = task.id();
    if let Err(e) = task.finish(state.clone()) {
        tracing::error!(task_id = id.0, error = %e, "Rejected terminal state");
        return;
    }
    ctx.emit(Event::Finished {
        id,
        name: task.item().name.clone(),
        state,
    });
}

/// One attempt: open the source, stream it into `<destination>.part`, verify
/// the size and move the file into place.
async fn transfer_once(
    ctx: &TaskContext,
    id: TaskId,
    item: &DownloadableItem,
    attempt: u32,
    progress: &AtomicU64,
) -> Result<(), TransferError> {
    if ctx.cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    progress.store(0, Ordering::Relaxed);
    ctx.emit(Event::Started {
        id,
        name: item.name.clone(),
        attempt,
        expected_size: item.expected_size,
    });
    tracing::debug!(task_id = id.0, attempt = attempt, url = %item.locator, "Starting transfer");

    let response = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(TransferError::Cancelled),
        response = ctx.fetcher.fetch(&item.locator) => response?,
    };

    // The resolver's size wins over Content-Length
    let expected = item.expected_size.or(response.content_length);
    if let Some(total) = expected {
        ctx.emit(Event::SizeKnown { id, total });
    }

    let mut partial = PartialFile::create(&item.destination).await?;
    let mut body = response.body;
    let mut throttle = ProgressThrottle::new(ctx.progress_interval);
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(TransferError::Cancelled),
            next = tokio::time::timeout(ctx.stall_timeout, body.next()) => next,
        };
        let chunk = match next {
            Err(_) => {
                return Err(TransferError::Network(format!(
                    "no data received for {}ms",
                    ctx.stall_timeout.as_millis()
                )));
            }
            Ok(None) => break,
            Ok(Some(chunk)) => chunk?,
        };

        partial.write(&chunk).await?;
        written += chunk.len() as u64;
        progress.store(written, Ordering::Relaxed);
        if let Some(bytes) = throttle.advance(written) {
            ctx.emit(Event::BytesAdvanced { id, bytes });
        }
    }
    if let Some(bytes) = throttle.flush() {
        ctx.emit(Event::BytesAdvanced { id, bytes });
    }

    match expected {
        Some(expected) if expected != written => {
            return Err(TransferError::SizeMismatch {
                expected,
                actual: written,
            });
        }
        _ => {}
    }

    if ctx.cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    partial.commit(&item.destination).await
}

/// `<destination>.part`
pub(super) fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Scoped handle on an in-progress destination file
///
/// Dropping it without [`commit`](Self::commit) closes the handle and deletes
/// the partial file, so no exit path leaves a half-written file behind.
struct PartialFile {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    committed: bool,
}

impl PartialFile {
    async fn create(destination: &Path) -> Result<Self, TransferError> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::destination(parent, e))?;
        }
        let path = part_path(destination);
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| TransferError::destination(&path, e))?;
        Ok(Self {
            path,
            file: Some(file),
            committed: false,
        })
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        let Some(file) = self.file.as_mut() else {
            return Err(TransferError::destination(
                &self.path,
                std::io::Error::other("partial file already closed"),
            ));
        };
        file.write_all(chunk)
            .await
            .map_err(|e| TransferError::destination(&self.path, e))
    }

    /// Flush, sync and close the file, then rename it to `destination`
    async fn commit(mut self, destination: &Path) -> Result<(), TransferError> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| TransferError::destination(&self.path, e))?;
            file.sync_all()
                .await
                .map_err(|e| TransferError::destination(&self.path, e))?;
        }
        tokio::fs::rename(&self.path, destination)
            .await
            .map_err(|e| TransferError::destination(destination, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        // Close before removing
        drop(self.file.take());
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove partial file");
            }
        }
    }
}
