//! FIFO queue of pending tasks shared by the workers of one run.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::download_task::DownloadTask;

/// Task queue (cloneable handle, protected by a Mutex)
///
/// Each pop removes the task under the lock, so no two workers can ever
/// receive the same task.
#[derive(Clone, Default)]
pub(crate) struct TaskQueue {
    inner: Arc<Mutex<VecDeque<DownloadTask>>>,
}

impl TaskQueue {
    /// Queue holding `tasks` in submission order
    pub(crate) fn from_tasks(tasks: impl IntoIterator<Item = DownloadTask>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tasks.into_iter().collect())),
        }
    }

    /// Take the oldest task, if any
    pub(crate) async fn pop(&self) -> Option<DownloadTask> {
        self.inner.lock().await.pop_front()
    }

    /// Number of tasks still waiting
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Remove and return every remaining task
    pub(crate) async fn drain(&self) -> Vec<DownloadTask> {
        self.inner.lock().await.drain(..).collect()
    }
}
