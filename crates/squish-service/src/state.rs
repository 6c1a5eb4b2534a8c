//! Application state.

use std::sync::Arc;

use squish_core::Clock;
use squish_store::Store;

use crate::cache::{self, FileCache};
use crate::config::ServiceConfig;
use crate::ratelimit::ApiRateWindow;
use crate::tracker::UsageTracker;

/// Application state shared across handlers.
///
/// Constructed explicitly with an injected store and clock so tests swap in
/// the in-memory backend and a manual clock.
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// The clock every time-dependent component reads from.
    pub clock: Arc<dyn Clock>,

    /// Usage accounting over the store and clock.
    pub tracker: UsageTracker,

    /// Session file cache.
    pub cache: Arc<FileCache>,

    /// Per-key request rate window for the tier middleware.
    pub rate: ApiRateWindow,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: ServiceConfig) -> Self {
        let tracker = UsageTracker::new(store.clone(), clock.clone());
        let cache = Arc::new(FileCache::new(config.file_cache.clone(), clock.clone()));

        Self {
            store,
            config,
            clock,
            tracker,
            cache,
            rate: ApiRateWindow::new(),
        }
    }

    /// Start the background TTL sweep for the file cache. Called once at
    /// startup; the task runs for the life of the process.
    pub fn spawn_cache_sweeper(&self) {
        cache::spawn_sweeper(self.cache.clone());
    }
}
