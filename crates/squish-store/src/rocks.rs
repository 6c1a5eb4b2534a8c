//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use chrono::{DateTime, Utc};

use squish_core::{
    ApiKeyRecord, Identity, Job, JobId, OperationClass, TierConfig, UsageRecord,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{apply_operation, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes the read-check-write of `record_operation` so the quota
    /// check and the increment cannot interleave across callers.
    usage_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!("RocksDB store opened");

        Ok(Self {
            db: Arc::new(db),
            usage_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Usage Records
    // =========================================================================

    fn get_usage(&self, identity: &Identity) -> Result<Option<UsageRecord>> {
        let cf = self.cf(cf::USAGE_RECORDS)?;
        let key = keys::usage_key(identity);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_usage(&self, record: &UsageRecord) -> Result<()> {
        let cf = self.cf(cf::USAGE_RECORDS)?;
        let key = keys::usage_key(&record.identity);
        let value = Self::serialize(record)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn record_operation(
        &self,
        identity: &Identity,
        class: OperationClass,
        bytes: u64,
        limits: &TierConfig,
        now: DateTime<Utc>,
    ) -> Result<UsageRecord> {
        let _guard = self
            .usage_lock
            .lock()
            .map_err(|_| StoreError::Database("usage lock poisoned".into()))?;

        let mut record = self
            .get_usage(identity)?
            .unwrap_or_else(|| UsageRecord::new(identity.clone(), now));

        apply_operation(&mut record, class, bytes, limits, now)?;

        let cf = self.cf(cf::USAGE_RECORDS)?;
        let key = keys::usage_key(identity);
        let value = Self::serialize(&record)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(record)
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    fn put_job(&self, job: &Job) -> Result<()> {
        let cf_jobs = self.cf(cf::JOBS)?;
        let cf_index = self.cf(cf::JOBS_BY_IDENTITY)?;

        let job_key = keys::job_key(&job.id);
        let index_key = keys::identity_job_key(&job.identity, &job.id);
        let value = Self::serialize(job)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_jobs, &job_key, &value);
        batch.put_cf(&cf_index, &index_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        let cf = self.cf(cf::JOBS)?;
        let key = keys::job_key(id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_jobs(&self, identity: &Identity, limit: usize, offset: usize) -> Result<Vec<Job>> {
        let cf_index = self.cf(cf::JOBS_BY_IDENTITY)?;
        let prefix = keys::identity_jobs_prefix(identity);

        // ULIDs sort chronologically, so a forward scan over the prefix is
        // oldest first; collect and reverse for newest first.
        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        all_keys.reverse();

        let mut jobs = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if jobs.len() >= limit {
                break;
            }

            let job_id = keys::extract_job_id_from_index_key(&key);
            if let Some(job) = self.get_job(&job_id)? {
                jobs.push(job);
            }
        }

        Ok(jobs)
    }

    // =========================================================================
    // API Keys
    // =========================================================================

    fn put_api_key(&self, record: &ApiKeyRecord) -> Result<()> {
        let cf = self.cf(cf::API_KEYS)?;
        let key = keys::api_key_key(&record.key_hash);
        let value = Self::serialize(record)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>> {
        let cf = self.cf(cf::API_KEYS)?;
        let key = keys::api_key_key(key_hash);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn revoke_api_key(&self, key_hash: &str) -> Result<()> {
        let mut record = self.get_api_key(key_hash)?.ok_or(StoreError::NotFound)?;
        record.active = false;
        self.put_api_key(&record)
    }
}
