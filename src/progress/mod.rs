//! Progress reporting.
//!
//! Reporters are pure consumers of the downloader's event channel. They run
//! on their own task, never hold anything a worker waits on, and tolerate
//! missed events:
//! - [`reporter`] - The [`ProgressReporter`] trait, terminal and no-op implementations
//! - [`throttle`] - Rate limiting of byte-progress events at the source

pub mod reporter;
pub mod throttle;

pub use reporter::{NoopReporter, ProgressReporter, TerminalReporter, observe, spawn_reporter};
pub use throttle::ProgressThrottle;

use crate::config::DisplayConfig;

/// Reporter matching the display settings
pub fn reporter_for(display: &DisplayConfig) -> Box<dyn ProgressReporter> {
    if display.progress {
        Box::new(TerminalReporter::new())
    } else {
        Box::new(NoopReporter)
    }
}
