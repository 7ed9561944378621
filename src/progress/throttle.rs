//! Rate limiting for byte-progress events.

use std::time::{Duration, Instant};

/// Decides when a task's running byte count is worth broadcasting
///
/// The first update always goes out; after that at most one per
/// `min_interval`. [`flush`](Self::flush) returns the final count if it was
/// held back, so consumers always see where the transfer ended.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
    latest: u64,
    emitted: u64,
}

impl ProgressThrottle {
    /// Throttle emitting at most once per `min_interval`
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
            latest: 0,
            emitted: 0,
        }
    }

    /// Record the cumulative byte count; returns it if it should be emitted now
    pub fn advance(&mut self, bytes: u64) -> Option<u64> {
        self.latest = bytes;
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => None,
            _ => {
                self.last_emit = Some(now);
                self.emitted = bytes;
                Some(bytes)
            }
        }
    }

    /// The latest count, if it has not been emitted yet
    pub fn flush(&mut self) -> Option<u64> {
        if self.latest == self.emitted && self.last_emit.is_some() {
            return None;
        }
        self.last_emit = Some(Instant::now());
        self.emitted = self.latest;
        Some(self.latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_is_emitted() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert_eq!(throttle.advance(10), Some(10));
    }

    #[test]
    fn updates_inside_interval_are_held_back() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(50));
        assert_eq!(throttle.advance(10), Some(10));
        assert_eq!(throttle.advance(20), None);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(throttle.advance(30), Some(30));
    }

    #[test]
    fn flush_returns_held_back_count_once() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        throttle.advance(10);
        throttle.advance(25);
        assert_eq!(throttle.flush(), Some(25));
        assert_eq!(throttle.flush(), None);
    }

    #[test]
    fn flush_after_emitted_update_is_silent() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        throttle.advance(10);
        assert_eq!(throttle.flush(), None);
    }

    #[test]
    fn flush_without_updates_reports_zero() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert_eq!(throttle.flush(), Some(0));
    }
}
