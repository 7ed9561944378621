//! Shared test helpers: a scriptable in-memory fetcher and config/item builders.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use tokio::sync::broadcast;

use crate::config::{Config, RetryConfig};
use crate::downloader::fetcher::{FetchResponse, Fetcher};
use crate::error::TransferError;
use crate::types::{DownloadableItem, Event, Locator};

/// What the fake source does for one URL
#[derive(Clone, Debug)]
pub(crate) enum Behavior {
    /// Serve the body (Content-Length announced)
    Serve(Vec<u8>),
    /// Announce `announced` bytes but deliver only `body`
    Truncate { announced: u64, body: Vec<u8> },
    /// Answer with an HTTP status
    Status(u16),
    /// Reset the connection `times` times, then serve `body`
    Flaky { times: u32, body: Vec<u8> },
    /// Deliver `body` then never finish
    Stall(Vec<u8>),
}

/// In-memory [`Fetcher`] scripted per URL
///
/// Unscripted URLs serve a small body derived from the URL. Tracks calls per
/// URL and how many responses were open at the same time.
#[derive(Clone)]
pub(crate) struct FakeFetcher {
    inner: Arc<Inner>,
}

struct Inner {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, u32>>,
    chunk_size: usize,
    chunk_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::with_chunk_delay(Duration::ZERO)
    }

    /// Sleep `delay` before every body chunk, so transfers overlap
    pub(crate) fn with_chunk_delay(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                behaviors: Mutex::new(HashMap::new()),
                calls: Mutex::new(HashMap::new()),
                chunk_size: 64,
                chunk_delay: delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn on(&self, url: &str, behavior: Behavior) -> &Self {
        self.inner
            .behaviors
            .lock()
            .unwrap()
            .insert(url.to_string(), behavior);
        self
    }

    pub(crate) fn calls(&self, url: &str) -> u32 {
        self.inner
            .calls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.inner.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn distinct_urls(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, content_length: Option<u64>, body: Vec<u8>, stall: bool) -> FetchResponse {
        let guard = InFlight::enter(Arc::clone(&self.inner));
        let delay = self.inner.chunk_delay;
        let chunks: Vec<Result<Bytes, TransferError>> = body
            .chunks(self.inner.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let paced = stream::iter(chunks).then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            chunk
        });
        let body = if stall {
            paced.chain(stream::pending()).boxed()
        } else {
            paced.boxed()
        };
        // The guard lives exactly as long as the body stream
        let body = body
            .map(move |chunk| {
                let _open = &guard;
                chunk
            })
            .boxed();

        FetchResponse {
            content_length,
            body,
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, locator: &Locator) -> Result<FetchResponse, TransferError> {
        let call = {
            let mut calls = self.inner.calls.lock().unwrap();
            let count = calls.entry(locator.url.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let behavior = self
            .inner
            .behaviors
            .lock()
            .unwrap()
            .get(&locator.url)
            .cloned()
            .unwrap_or_else(|| Behavior::Serve(default_body(&locator.url)));

        match behavior {
            Behavior::Status(status) => Err(TransferError::HttpStatus {
                status,
                url: locator.url.clone(),
            }),
            Behavior::Flaky { times, .. } if call <= times => {
                Err(TransferError::Network("connection reset by peer".to_string()))
            }
            Behavior::Serve(body) | Behavior::Flaky { body, .. } => {
                Ok(self.respond(Some(body.len() as u64), body, false))
            }
            Behavior::Truncate { announced, body } => Ok(self.respond(Some(announced), body, false)),
            Behavior::Stall(body) => Ok(self.respond(None, body, true)),
        }
    }
}

struct InFlight {
    inner: Arc<Inner>,
}

impl InFlight {
    fn enter(inner: Arc<Inner>) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Body served for unscripted URLs
pub(crate) fn default_body(url: &str) -> Vec<u8> {
    url.as_bytes().repeat(8)
}

/// Config with fast retries and the given worker count
pub(crate) fn test_config(workers: usize) -> Config {
    let mut config = Config::default();
    config.download.num_workers = workers;
    config.retry = fast_retry(3);
    config.display.progress_interval = Duration::ZERO;
    config
}

pub(crate) fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Item `name` served from a fake CDN URL, saved under `dir`
pub(crate) fn item(dir: &Path, name: &str) -> DownloadableItem {
    DownloadableItem::new(
        name,
        Locator::new(url(name)),
        dir.join(format!("{name}.mp3")),
    )
}

pub(crate) fn url(name: &str) -> String {
    format!("https://cdn.example.com/{name}.mp3")
}

/// Everything currently buffered in the receiver
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Files under `dir` whose name ends in `.part`
pub(crate) fn partial_files(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "part"))
                .collect()
        })
        .unwrap_or_default()
}
