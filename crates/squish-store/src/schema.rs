//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Usage records, keyed by the identity's byte encoding.
    pub const USAGE_RECORDS: &str = "usage_records";

    /// Job records, keyed by `job_id` (ULID).
    pub const JOBS: &str = "jobs";

    /// Index: jobs by identity, keyed by `identity || 0x00 || job_id`.
    /// Value is empty (index only).
    pub const JOBS_BY_IDENTITY: &str = "jobs_by_identity";

    /// API key records, keyed by the hex SHA-256 of the key.
    pub const API_KEYS: &str = "api_keys";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USAGE_RECORDS,
        cf::JOBS,
        cf::JOBS_BY_IDENTITY,
        cf::API_KEYS,
    ]
}
