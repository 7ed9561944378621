//! Error types for qmdown
//!
//! This module provides error handling for the library, including:
//! - The crate-level [`Error`] used by configuration, resolution and run setup
//! - [`ResolutionError`] for links that cannot be turned into downloadable items
//! - [`TransferError`] for failures while moving one track to disk
//!
//! Only [`TransferError`] is retried; see [`crate::retry`] for how it is
//! classified.

use std::path::PathBuf;
use thiserror::Error;

use crate::quality::Quality;

/// Result type alias for qmdown operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qmdown
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "num_workers")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of a task transfer (client construction, redirects)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A link could not be resolved into downloadable items
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// A transfer failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Serialization error (config files, manifests)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A task was asked to make a state transition its lifecycle forbids
    #[error("task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The task whose transition was rejected
        id: u64,
        /// Current state name
        from: &'static str,
        /// Requested state name
        to: &'static str,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] naming the offending key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors raised while turning a user-supplied link into downloadable items
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The link is well-formed but no configured resolver handles it
    #[error("unsupported link: {url}")]
    Unsupported {
        /// The link as given by the user
        url: String,
    },

    /// The link could not be parsed
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The link as given by the user
        url: String,
        /// Parser message
        reason: String,
    },

    /// The referenced resource does not exist (deleted track, empty playlist)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The source backing the resolver could not be reached or returned an error payload
    #[error("source unreachable for {url}: {reason}")]
    Unreachable {
        /// The link being resolved
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// None of the qualities in the fallback chain is offered for a track
    #[error("no quality at or below {requested} available for {track}")]
    NoQualityAvailable {
        /// Track display name
        track: String,
        /// Quality the user asked for
        requested: Quality,
    },

    /// A local manifest could not be read or parsed
    #[error("invalid manifest {path}: {reason}")]
    InvalidManifest {
        /// Manifest location
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },
}

/// Errors raised while transferring one item to disk
#[derive(Debug, Error)]
pub enum TransferError {
    /// The server answered with a non-success status code
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// Connection, timeout or body-stream failure
    #[error("network error: {0}")]
    Network(String),

    /// The body ended before the expected number of bytes arrived (or overran it)
    #[error("size mismatch: expected {expected} bytes, received {actual}")]
    SizeMismatch {
        /// Bytes the item (or Content-Length) announced
        expected: u64,
        /// Bytes actually written
        actual: u64,
    },

    /// The resolver handed over a locator that cannot be requested
    #[error("invalid locator {locator}: {reason}")]
    InvalidLocator {
        /// The offending locator URL
        locator: String,
        /// Why it was rejected
        reason: String,
    },

    /// The destination could not be created, written or finalized
    #[error("cannot write {}: {source}", path.display())]
    Destination {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled while this transfer was in flight
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Classify a `reqwest` failure raised while requesting `url`
    pub fn from_request(url: &str, err: reqwest::Error) -> Self {
        if err.is_builder() {
            return TransferError::InvalidLocator {
                locator: url.to_string(),
                reason: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return TransferError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            };
        }
        TransferError::Network(err.to_string())
    }

    /// Wrap an I/O error on the destination path
    pub fn destination(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Destination {
            path: path.into(),
            source,
        }
    }
}
