//! Storage layer for the squish image service.
//!
//! Two backends implement the same `Store` trait:
//!
//! - `RocksStore`: `RocksDB` with column families and CBOR values, for
//!   production.
//! - `MemoryStore`: plain in-process maps, for tests and embedding.
//!
//! # Atomic usage recording
//!
//! `record_operation` is the storage-layer conditional increment: it rolls
//! elapsed windows, checks every window of the operation class against the
//! plan limits, and either applies all increments or fails without writing.
//! Backends serialize the read-modify-write internally, so `used` can never
//! exceed `limit` in any window regardless of caller interleaving.
//!
//! # Example
//!
//! ```no_run
//! use squish_store::{RocksStore, Store};
//! use squish_core::{Identity, OperationClass, PlanId, TierConfig, UserId};
//!
//! let store = RocksStore::open("/tmp/squish-db").unwrap();
//! let identity = Identity::User(UserId::generate());
//! let config = TierConfig::resolve(PlanId::Free);
//!
//! let record = store
//!     .record_operation(&identity, OperationClass::Regular, 150_000, config, chrono::Utc::now())
//!     .unwrap();
//! assert_eq!(record.monthly.regular, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use squish_core::{
    ApiKeyRecord, Identity, Job, JobId, OperationClass, TierConfig, UsageRecord, Window,
};

/// The storage trait defining all database operations.
///
/// Object-safe so services can hold an `Arc<dyn Store>` and swap backends.
pub trait Store: Send + Sync {
    // =========================================================================
    // Usage Records
    // =========================================================================

    /// Get the usage record for an identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_usage(&self, identity: &Identity) -> Result<Option<UsageRecord>>;

    /// Insert or replace a usage record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Count one operation against an identity, conditionally.
    ///
    /// Rolls elapsed windows, then checks the hourly, daily, and monthly
    /// counters of `class` against `limits`; on headroom in all three, all
    /// counters and the bandwidth accumulator are updated in one atomic
    /// write and the new record is returned.
    ///
    /// # Errors
    ///
    /// - `StoreError::QuotaExceeded` naming the first exhausted window; the
    ///   stored record is left untouched.
    /// - `StoreError::Database` if the backend fails.
    fn record_operation(
        &self,
        identity: &Identity,
        class: OperationClass,
        bytes: u64,
        limits: &TierConfig,
        now: DateTime<Utc>,
    ) -> Result<UsageRecord>;

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Insert a job record and its identity index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_job(&self, job: &Job) -> Result<()>;

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_job(&self, id: &JobId) -> Result<Option<Job>>;

    /// List jobs for an identity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_jobs(&self, identity: &Identity, limit: usize, offset: usize) -> Result<Vec<Job>>;

    // =========================================================================
    // API Keys
    // =========================================================================

    /// Insert or replace an API key record, keyed by its hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_api_key(&self, record: &ApiKeyRecord) -> Result<()>;

    /// Look up an API key record by the hash of the presented key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>>;

    /// Mark an API key inactive.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such key exists.
    fn revoke_api_key(&self, key_hash: &str) -> Result<()>;
}

/// Shared conditional-increment logic used by both backends.
///
/// Mutates `record` in place on success; on a full window the record is left
/// exactly as loaded (only lazy rolls have been applied, which are
/// observationally neutral) and the exhausted window is reported.
pub(crate) fn apply_operation(
    record: &mut UsageRecord,
    class: OperationClass,
    bytes: u64,
    limits: &TierConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    record.roll_windows(now);

    let class_limits = limits.limits(class);
    for window in Window::ALL {
        if record.window(window).used(class) >= class_limits.limit(window) {
            return Err(StoreError::QuotaExceeded { window });
        }
    }

    record.record(class, bytes, now);
    Ok(())
}
