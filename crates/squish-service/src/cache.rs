//! Session file cache.
//!
//! Uploaded files are spooled to disk and indexed in this in-memory map so a
//! convert-then-compress sequence reuses one upload. Entries expire after 30
//! minutes (a periodic sweep unlinks them), and the cache sheds its oldest
//! 20% whenever an insert pushes it past capacity.
//!
//! IDs are a deterministic content-tuple hash prefix plus a ULID: identical
//! (session, name, size, mime) uploads share the prefix, which powers
//! de-duplication, while the ULID keeps distinct uploads of the same file
//! from colliding.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use ulid::Ulid;

use squish_core::{Clock, SessionId};

/// Hex characters of the content hash kept in the ID prefix.
const CONTENT_PREFIX_LEN: usize = 16;

/// Denominator of the capacity eviction: oldest 1/5 (20%) of entries go.
const CAPACITY_EVICT_DIVISOR: usize = 5;

/// File cache tuning knobs.
#[derive(Debug, Clone)]
pub struct FileCacheConfig {
    /// Seconds an entry stays resolvable after upload.
    pub ttl_seconds: u64,
    /// Entry count above which the capacity eviction kicks in.
    pub max_entries: usize,
    /// Seconds between background sweeps.
    pub sweep_seconds: u64,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 30 * 60,
            max_entries: 100,
            sweep_seconds: 5 * 60,
        }
    }
}

/// A cached upload.
#[derive(Debug, Clone, Serialize)]
pub struct CachedFile {
    /// Cache identifier: content-hash prefix + ULID.
    pub id: String,
    /// The session that uploaded the file.
    pub session: SessionId,
    /// Original upload filename.
    pub original_name: String,
    /// MIME type as declared by the upload.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Where the bytes are spooled on disk.
    pub path: PathBuf,
    /// When the entry was cached.
    pub stored_at: DateTime<Utc>,
}

/// In-memory cache of uploaded files, keyed by ID.
pub struct FileCache {
    entries: RwLock<HashMap<String, CachedFile>>,
    ttl: Duration,
    max_entries: usize,
    sweep_interval: StdDuration,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    /// Create an empty cache.
    ///
    /// # Panics
    ///
    /// Panics if the configured TTL does not fit a `chrono::Duration`, which
    /// cannot happen for any realistic configuration value.
    #[must_use]
    pub fn new(config: FileCacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl_seconds =
            i64::try_from(config.ttl_seconds).expect("file cache TTL out of range");
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds),
            max_entries: config.max_entries,
            sweep_interval: StdDuration::from_secs(config.sweep_seconds),
            clock,
        }
    }

    /// The configured entry TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Deterministic content prefix for a (session, name, size, mime) tuple.
    #[must_use]
    pub fn content_prefix(
        session: &SessionId,
        original_name: &str,
        size_bytes: u64,
        mime_type: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(session.as_bytes());
        hasher.update(original_name.as_bytes());
        hasher.update(size_bytes.to_be_bytes());
        hasher.update(mime_type.as_bytes());
        let mut prefix = hex::encode(hasher.finalize());
        prefix.truncate(CONTENT_PREFIX_LEN);
        prefix
    }

    /// Mint a cache ID: deterministic prefix, then a ULID so re-uploads of
    /// the same file get distinct IDs.
    #[must_use]
    pub fn file_id(
        session: &SessionId,
        original_name: &str,
        size_bytes: u64,
        mime_type: &str,
    ) -> String {
        format!(
            "{}-{}",
            Self::content_prefix(session, original_name, size_bytes, mime_type),
            Ulid::new()
        )
    }

    fn is_expired(&self, entry: &CachedFile, now: DateTime<Utc>) -> bool {
        now - entry.stored_at >= self.ttl
    }

    /// Insert an entry, evicting the oldest 20% if the cache is over
    /// capacity afterwards. Returns the stored entry and whatever was
    /// evicted, so the caller can unlink spooled bytes.
    pub fn insert(&self, mut entry: CachedFile) -> (CachedFile, Vec<CachedFile>) {
        let now = self.clock.now();
        entry.stored_at = now;

        let mut entries = self.entries.write().expect("file cache lock poisoned");
        entries.insert(entry.id.clone(), entry.clone());

        let mut evicted = Vec::new();
        if entries.len() > self.max_entries {
            let evict_count = entries.len() / CAPACITY_EVICT_DIVISOR;
            let mut by_age: Vec<(String, DateTime<Utc>)> = entries
                .iter()
                .map(|(id, e)| (id.clone(), e.stored_at))
                .collect();
            by_age.sort_by(|a, b| a.1.cmp(&b.1));

            for (id, _) in by_age.into_iter().take(evict_count) {
                if let Some(old) = entries.remove(&id) {
                    evicted.push(old);
                }
            }

            tracing::debug!(
                evicted = evicted.len(),
                remaining = entries.len(),
                "File cache over capacity, evicted oldest entries"
            );
        }

        (entry, evicted)
    }

    /// Resolve an ID. Expired entries are removed on the way out and read as
    /// absent.
    pub fn get(&self, id: &str) -> Option<CachedFile> {
        let now = self.clock.now();
        let mut entries = self.entries.write().expect("file cache lock poisoned");

        match entries.get(id) {
            Some(entry) if self.is_expired(entry, now) => {
                entries.remove(id);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Find a live entry with the same content tuple, newest first.
    pub fn find_duplicate(
        &self,
        session: &SessionId,
        original_name: &str,
        size_bytes: u64,
        mime_type: &str,
    ) -> Option<CachedFile> {
        let prefix = Self::content_prefix(session, original_name, size_bytes, mime_type);
        let now = self.clock.now();
        let entries = self.entries.read().expect("file cache lock poisoned");

        entries
            .values()
            .filter(|e| {
                e.session == *session && e.id.starts_with(&prefix) && !self.is_expired(e, now)
            })
            .max_by_key(|e| e.stored_at)
            .cloned()
    }

    /// All live entries for a session.
    pub fn list_session(&self, session: &SessionId) -> Vec<CachedFile> {
        let now = self.clock.now();
        let entries = self.entries.read().expect("file cache lock poisoned");

        let mut files: Vec<CachedFile> = entries
            .values()
            .filter(|e| e.session == *session && !self.is_expired(e, now))
            .cloned()
            .collect();
        files.sort_by_key(|e| e.stored_at);
        files
    }

    /// Remove and return every entry for a session.
    pub fn clear_session(&self, session: &SessionId) -> Vec<CachedFile> {
        let mut entries = self.entries.write().expect("file cache lock poisoned");

        let ids: Vec<String> = entries
            .values()
            .filter(|e| e.session == *session)
            .map(|e| e.id.clone())
            .collect();

        ids.into_iter()
            .filter_map(|id| entries.remove(&id))
            .collect()
    }

    /// Remove and return every expired entry.
    pub fn sweep(&self) -> Vec<CachedFile> {
        let now = self.clock.now();
        let mut entries = self.entries.write().expect("file cache lock poisoned");

        let ids: Vec<String> = entries
            .values()
            .filter(|e| self.is_expired(e, now))
            .map(|e| e.id.clone())
            .collect();

        ids.into_iter()
            .filter_map(|id| entries.remove(&id))
            .collect()
    }

    /// Current entry count, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().expect("file cache lock poisoned").len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the TTL sweep on a fixed interval for the life of the process,
/// unlinking the spooled bytes of everything the sweep removes.
pub fn spawn_sweeper(cache: Arc<FileCache>) {
    let interval = cache.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the sweep cadence
        // starts one interval after boot.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.sweep();
            if removed.is_empty() {
                continue;
            }
            tracing::debug!(removed = removed.len(), "File cache sweep evicted entries");
            for file in removed {
                if let Err(e) = tokio::fs::remove_file(&file.path).await {
                    tracing::debug!(path = %file.path.display(), error = %e, "Failed to unlink swept file");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use squish_core::ManualClock;

    fn cache_with_clock() -> (FileCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = FileCache::new(FileCacheConfig::default(), clock.clone());
        (cache, clock)
    }

    fn entry(session: SessionId, name: &str, size: u64) -> CachedFile {
        CachedFile {
            id: FileCache::file_id(&session, name, size, "image/jpeg"),
            session,
            original_name: name.to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: size,
            path: PathBuf::from(format!("/tmp/{name}")),
            stored_at: Utc::now(),
        }
    }

    #[test]
    fn same_tuple_gets_distinct_ids_with_shared_prefix() {
        let session = SessionId::generate();
        let a = FileCache::file_id(&session, "photo.jpg", 1000, "image/jpeg");
        let b = FileCache::file_id(&session, "photo.jpg", 1000, "image/jpeg");

        assert_ne!(a, b);
        assert_eq!(&a[..CONTENT_PREFIX_LEN], &b[..CONTENT_PREFIX_LEN]);

        let other = FileCache::file_id(&session, "photo.jpg", 1001, "image/jpeg");
        assert_ne!(&a[..CONTENT_PREFIX_LEN], &other[..CONTENT_PREFIX_LEN]);
    }

    #[test]
    fn both_duplicates_resolve_until_expiry() {
        let (cache, clock) = cache_with_clock();
        let session = SessionId::generate();

        let (first, _) = cache.insert(entry(session, "photo.jpg", 1000));
        let (second, _) = cache.insert(entry(session, "photo.jpg", 1000));
        assert_ne!(first.id, second.id);
        assert!(cache.get(&first.id).is_some());
        assert!(cache.get(&second.id).is_some());

        // 30 minutes plus one tick: both gone.
        clock.advance(Duration::minutes(30) + Duration::seconds(1));
        assert!(cache.get(&first.id).is_none());
        assert!(cache.get(&second.id).is_none());
    }

    #[test]
    fn find_duplicate_matches_live_tuple_only() {
        let (cache, clock) = cache_with_clock();
        let session = SessionId::generate();

        let (stored, _) = cache.insert(entry(session, "photo.jpg", 1000));
        let found = cache
            .find_duplicate(&session, "photo.jpg", 1000, "image/jpeg")
            .unwrap();
        assert_eq!(found.id, stored.id);

        assert!(cache
            .find_duplicate(&session, "other.jpg", 1000, "image/jpeg")
            .is_none());

        clock.advance(Duration::minutes(31));
        assert!(cache
            .find_duplicate(&session, "photo.jpg", 1000, "image/jpeg")
            .is_none());
    }

    #[test]
    fn capacity_eviction_removes_oldest_fifth() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = FileCache::new(FileCacheConfig::default(), clock.clone());
        let session = SessionId::generate();

        let mut ids = Vec::new();
        for i in 0..101 {
            let (stored, evicted) = cache.insert(entry(session, &format!("f{i}.jpg"), 10));
            ids.push(stored.id);
            // Distinct timestamps make the age ordering deterministic.
            clock.advance(Duration::seconds(1));
            if i < 100 {
                assert!(evicted.is_empty());
            } else {
                assert_eq!(evicted.len(), 20);
            }
        }

        assert_eq!(cache.len(), 81);
        for id in &ids[..20] {
            assert!(cache.get(id).is_none(), "oldest entries should be evicted");
        }
        for id in &ids[20..] {
            assert!(cache.get(id).is_some());
        }
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (cache, clock) = cache_with_clock();
        let session = SessionId::generate();

        cache.insert(entry(session, "old.jpg", 10));
        clock.advance(Duration::minutes(20));
        let (fresh, _) = cache.insert(entry(session, "fresh.jpg", 10));

        clock.advance(Duration::minutes(11)); // old: 31m, fresh: 11m
        let removed = cache.sweep();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].original_name, "old.jpg");
        assert!(cache.get(&fresh.id).is_some());
    }

    #[test]
    fn clear_session_is_scoped() {
        let (cache, _clock) = cache_with_clock();
        let mine = SessionId::generate();
        let theirs = SessionId::generate();

        cache.insert(entry(mine, "a.jpg", 10));
        cache.insert(entry(mine, "b.jpg", 10));
        let (kept, _) = cache.insert(entry(theirs, "c.jpg", 10));

        let removed = cache.clear_session(&mine);
        assert_eq!(removed.len(), 2);
        assert!(cache.list_session(&mine).is_empty());
        assert!(cache.get(&kept.id).is_some());
    }
}
