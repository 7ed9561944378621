//! Worker pool - a fixed number of workers draining the task queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use super::download_task::{DownloadTask, TaskContext, run_task};
use super::queue::TaskQueue;
use crate::error::{Error, Result};
use crate::types::{Event, RunResult, SkipReason, TaskState};

/// Task each worker is executing, keyed by the worker's tokio task id
type ActiveTasks = Arc<Mutex<HashMap<tokio::task::Id, DownloadTask>>>;

/// Run every task to a terminal state with at most `concurrency` running at once
///
/// Spawns `min(concurrency, tasks)` workers. Each worker pops the next pending
/// task as soon as its previous one finishes. Outcomes are aggregated in
/// completion order. Returns only after every task is terminal and every
/// worker has exited.
///
/// A worker that panics fails the task it was holding and is replaced while
/// tasks remain queued, so the pool keeps its width.
///
/// On cancellation, workers stop taking new tasks; tasks still queued become
/// `Skipped(Cancelled)` and running tasks wind down on their own.
///
/// # Errors
///
/// Returns [`Error::Config`] when `concurrency` is zero.
pub(crate) async fn run(
    tasks: Vec<DownloadTask>,
    concurrency: usize,
    ctx: TaskContext,
) -> Result<RunResult> {
    if concurrency == 0 {
        return Err(Error::config("must be at least 1", "num_workers"));
    }

    let started = Instant::now();
    let mut result = RunResult::default();
    if tasks.is_empty() {
        return Ok(result);
    }

    let total = tasks.len();
    let queue = TaskQueue::from_tasks(tasks);
    let active: ActiveTasks = Arc::new(Mutex::new(HashMap::new()));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<DownloadTask>();

    let worker_count = concurrency.min(total);
    tracing::info!(tasks = total, workers = worker_count, "Starting worker pool");

    let mut workers = JoinSet::new();
    let spawn = |workers: &mut JoinSet<()>, worker: usize| {
        workers.spawn(worker_loop(
            worker,
            queue.clone(),
            ctx.clone(),
            Arc::clone(&active),
            done_tx.clone(),
        ));
    };
    for worker in 0..worker_count {
        spawn(&mut workers, worker);
    }

    let mut next_worker = worker_count;
    loop {
        tokio::select! {
            biased;
            Some(task) = done_rx.recv() => {
                result.record(task.id(), task.item(), task.state());
            }
            joined = workers.join_next() => match joined {
                None => break,
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Download worker terminated abnormally");
                    let orphan = active.lock().await.remove(&e.id());
                    if let Some(task) = orphan {
                        settle(&mut result, &ctx, task, TaskState::Failed("worker panicked".to_string()));
                    }
                    if !ctx.cancel.is_cancelled() && queue.len().await > 0 {
                        tracing::info!(worker = next_worker, "Replacing download worker");
                        spawn(&mut workers, next_worker);
                        next_worker += 1;
                    }
                }
            },
        }
    }

    // Every worker has exited; collect what they sent last
    drop(done_tx);
    while let Some(task) = done_rx.recv().await {
        result.record(task.id(), task.item(), task.state());
    }

    // Tasks no worker picked up
    let leftover = queue.drain().await;
    if !leftover.is_empty() {
        tracing::info!(tasks = leftover.len(), "Settling undispatched tasks");
    }
    for task in leftover {
        let state = if ctx.cancel.is_cancelled() {
            TaskState::Skipped(SkipReason::Cancelled)
        } else {
            TaskState::Failed("no worker available".to_string())
        };
        settle(&mut result, &ctx, task, state);
    }

    result.cancelled = ctx.cancel.is_cancelled();
    result.elapsed = started.elapsed();
    Ok(result)
}

/// One worker: pop, execute, report, repeat until the queue is empty or the run is cancelled
async fn worker_loop(
    worker: usize,
    queue: TaskQueue,
    ctx: TaskContext,
    active: ActiveTasks,
    done_tx: mpsc::UnboundedSender<DownloadTask>,
) {
    tracing::debug!(worker = worker, "Worker started");
    loop {
        if ctx.cancel.is_cancelled() {
            tracing::debug!(worker = worker, "Worker stopping: run cancelled");
            break;
        }
        let Some(mut task) = queue.pop().await else {
            break;
        };
        // Register a snapshot so a panic below does not lose the task
        let worker_id = tokio::task::id();
        active.lock().await.insert(worker_id, task.clone());

        run_task(&mut task, &ctx).await;

        active.lock().await.remove(&worker_id);
        if done_tx.send(task).is_err() {
            // Aggregator gone; nothing left to report to
            break;
        }
    }
    tracing::debug!(worker = worker, "Worker exited");
}

/// Force a terminal state on a task that never got one and count it
fn settle(result: &mut RunResult, ctx: &TaskContext, mut task: DownloadTask, state: TaskState) {
    let id = task.id();
    if let Err(e) = task.finish(state.clone()) {
        tracing::error!(task_id = id.0, error = %e, "Task already terminal");
    }
    ctx.emit(Event::Finished {
        id,
        name: task.item().name.clone(),
        state: task.state().clone(),
    });
    result.record(id, task.item(), task.state());
}
