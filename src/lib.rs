//! # qmdown
//!
//! Concurrent downloader for music-platform links.
//!
//! Links are turned into [`DownloadableItem`]s by a [`Resolver`]; the
//! [`Downloader`] fans them out to a fixed number of workers, retries
//! transient failures and reports every task's lifecycle on an event channel
//! that a [`ProgressReporter`](progress::ProgressReporter) renders.
//!
//! ## Quick Start
//!
//! ```no_run
//! use qmdown::resolver::{ChainResolver, resolve_all};
//! use qmdown::{Config, Downloader};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let resolver = ChainResolver::standard(&config.download);
//!     let urls = vec!["https://cdn.example.com/Song%20-%20Artist.mp3".to_string()];
//!     let resolution = resolve_all(&resolver, &urls).await;
//!
//!     let downloader = Downloader::new(config)?;
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let result = downloader
//!         .coordinate(resolution.items, CancellationToken::new())
//!         .await?;
//!     std::process::exit(result.status().exit_code());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line interface
pub mod cli;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Platform link classification
pub mod link;
/// Progress reporting
pub mod progress;
/// Quality tiers and fallback
pub mod quality;
/// Link resolvers
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DisplayConfig, DownloadConfig, RetryConfig};
pub use downloader::{Downloader, FetchResponse, Fetcher, HttpFetcher};
pub use error::{Error, ResolutionError, Result, TransferError};
pub use link::LinkKind;
pub use quality::Quality;
pub use resolver::{Resolution, Resolved, Resolver};
pub use types::{
    DownloadableItem, Event, FailedItem, Locator, RunResult, RunStatus, SkipReason, TaskId,
    TaskState,
};

use tokio_util::sync::CancellationToken;

/// Cancel `cancel` when the process receives a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns the listener task; abort it once the run is over.
///
/// # Example
///
/// ```no_run
/// use qmdown::cancel_on_signal;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let cancel = CancellationToken::new();
///     let listener = cancel_on_signal(cancel.clone());
///     // ... run downloads with `cancel` ...
///     listener.abort();
/// }
/// ```
pub fn cancel_on_signal(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("Cancelling run; in-flight downloads are being stopped");
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                ctrl_c_or_never().await;
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                ctrl_c_or_never().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}

/// A failed listener must not look like a signal
#[cfg(unix)]
async fn ctrl_c_or_never() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
