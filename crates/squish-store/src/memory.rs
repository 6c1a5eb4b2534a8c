//! In-memory storage implementation.
//!
//! Backs the service tests and embedded deployments. Same conditional
//! increment semantics as the `RocksDB` backend; a single mutex over the
//! tables stands in for the write batch.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use squish_core::{
    ApiKeyRecord, Identity, Job, JobId, OperationClass, TierConfig, UsageRecord,
};

use crate::error::{Result, StoreError};
use crate::{apply_operation, Store};

#[derive(Default)]
struct Tables {
    usage: HashMap<Vec<u8>, UsageRecord>,
    jobs: HashMap<JobId, Job>,
    api_keys: HashMap<String, ApiKeyRecord>,
}

/// In-process storage backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn get_usage(&self, identity: &Identity) -> Result<Option<UsageRecord>> {
        let tables = self.lock()?;
        Ok(tables.usage.get(&identity.key_bytes()).cloned())
    }

    fn put_usage(&self, record: &UsageRecord) -> Result<()> {
        let mut tables = self.lock()?;
        tables
            .usage
            .insert(record.identity.key_bytes(), record.clone());
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
        // The table lock is held across check and write, giving the same
        // no-interleaving guarantee as the RocksDB usage lock.
        let mut tables = self.lock()?;
        let key = identity.key_bytes();

        let mut record = tables
            .usage
            .get(&key)
            .cloned()
            .unwrap_or_else(|| UsageRecord::new(identity.clone(), now));

        apply_operation(&mut record, class, bytes, limits, now)?;

        tables.usage.insert(key, record.clone());
        Ok(record)
    }

    fn put_job(&self, job: &Job) -> Result<()> {
        let mut tables = self.lock()?;
        tables.jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        let tables = self.lock()?;
        Ok(tables.jobs.get(id).cloned())
    }

    fn list_jobs(&self, identity: &Identity, limit: usize, offset: usize) -> Result<Vec<Job>> {
        let tables = self.lock()?;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| job.identity == *identity)
            .cloned()
            .collect();

        // ULIDs sort chronologically; newest first.
        jobs.sort_by(|a, b| b.id.to_bytes().cmp(&a.id.to_bytes()));

        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    fn put_api_key(&self, record: &ApiKeyRecord) -> Result<()> {
        let mut tables = self.lock()?;
        tables
            .api_keys
            .insert(record.key_hash.clone(), record.clone());
        Ok(())
    }

    fn get_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>> {
        let tables = self.lock()?;
        Ok(tables.api_keys.get(key_hash).cloned())
    }

    fn revoke_api_key(&self, key_hash: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let record = tables
            .api_keys
            .get_mut(key_hash)
            .ok_or(StoreError::NotFound)?;
        record.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squish_core::{PlanId, UserId, Window};

    #[test]
    fn used_never_exceeds_limit() {
        let store = MemoryStore::new();
        let identity = Identity::User(UserId::generate());
        let config = TierConfig::resolve(PlanId::Free);
        let now = Utc::now();

        let mut denials = 0;
        for _ in 0..(config.regular.hourly + 10) {
            if store
                .record_operation(&identity, OperationClass::Regular, 0, config, now)
                .is_err()
            {
                denials += 1;
            }
        }

        let record = store.get_usage(&identity).unwrap().unwrap();
        assert_eq!(record.hourly.regular, config.regular.hourly);
        assert_eq!(denials, 10);
    }

    #[test]
    fn denied_increment_names_the_exhausted_window() {
        let store = MemoryStore::new();
        let identity = Identity::Session(squish_core::SessionId::generate());
        let config = TierConfig::resolve(PlanId::Free);
        let now = Utc::now();

        for _ in 0..config.regular.hourly {
            store
                .record_operation(&identity, OperationClass::Regular, 0, config, now)
                .unwrap();
        }

        match store.record_operation(&identity, OperationClass::Regular, 0, config, now) {
            Err(StoreError::QuotaExceeded { window }) => assert_eq!(window, Window::Hourly),
            other => panic!("expected quota denial, got {other:?}"),
        }
    }

    #[test]
    fn window_roll_frees_capacity() {
        let store = MemoryStore::new();
        let identity = Identity::User(UserId::generate());
        let config = TierConfig::resolve(PlanId::Free);
        let now = Utc::now();

        for _ in 0..config.regular.hourly {
            store
                .record_operation(&identity, OperationClass::Regular, 0, config, now)
                .unwrap();
        }
        assert!(store
            .record_operation(&identity, OperationClass::Regular, 0, config, now)
            .is_err());

        let next_hour = now + chrono::Duration::minutes(61);
        let record = store
            .record_operation(&identity, OperationClass::Regular, 0, config, next_hour)
            .unwrap();
        assert_eq!(record.hourly.regular, 1);
        assert_eq!(record.daily.regular, config.regular.hourly + 1);
    }
}
