//! Per-key sliding-window request rate tracking.
//!
//! The tier middleware compares a key's request rate over the last minute
//! against the tier's `rate_per_minute`. State is process-local: when scaled
//! to multiple processes each enforces its own window, which the platform
//! accepts for soft limiting.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Sliding-window request counter keyed by API key hash.
pub struct ApiRateWindow {
    entries: RwLock<HashMap<String, Vec<Instant>>>,
    window: Duration,
}

impl ApiRateWindow {
    /// Create a tracker with the standard one-minute window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(60))
    }

    /// Create a tracker with a custom window duration (for testing).
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            window,
        }
    }

    /// Requests recorded for `key` within the window. Does not record.
    #[must_use]
    pub fn current_rate(&self, key: &str) -> u32 {
        let now = Instant::now();
        let entries = self.entries.read().expect("rate window lock poisoned");
        match entries.get(key) {
            None => 0,
            Some(timestamps) => {
                let recent = timestamps
                    .iter()
                    .filter(|&&t| now.duration_since(t) < self.window)
                    .count();
                u32::try_from(recent).unwrap_or(u32::MAX)
            }
        }
    }

    /// Record a request for `key`, pruning expired timestamps while the
    /// lock is held.
    pub fn record(&self, key: &str) {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("rate window lock poisoned");
        let timestamps = entries.entry(key.to_string()).or_default();
        timestamps.retain(|&t| now.duration_since(t) < self.window);
        timestamps.push(now);
    }
}

impl Default for ApiRateWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_recent_requests() {
        let window = ApiRateWindow::new();
        assert_eq!(window.current_rate("k"), 0);

        window.record("k");
        window.record("k");
        assert_eq!(window.current_rate("k"), 2);
        assert_eq!(window.current_rate("other"), 0);
    }

    #[test]
    fn expired_requests_fall_out() {
        let window = ApiRateWindow::with_window(Duration::from_millis(30));
        window.record("k");
        assert_eq!(window.current_rate("k"), 1);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(window.current_rate("k"), 0);
    }
}
