//! Key encoding utilities for `RocksDB`.
//!
//! Identity encodings are variable length (page identifiers carry a string),
//! so compound index keys separate the identity from the ULID with a `0x00`
//! byte, which never appears inside an identity encoding.

use squish_core::{Identity, JobId};

/// Separator between the identity encoding and the ULID in index keys.
const INDEX_SEPARATOR: u8 = 0x00;

/// Create a usage record key from an identity.
#[must_use]
pub fn usage_key(identity: &Identity) -> Vec<u8> {
    identity.key_bytes()
}

/// Create a job key from a job ID.
#[must_use]
pub fn job_key(job_id: &JobId) -> Vec<u8> {
    job_id.to_bytes().to_vec()
}

/// Create an identity-job index key.
///
/// Format: `identity bytes || 0x00 || job_id (16 bytes)`
///
/// Since ULIDs are time-ordered, a prefix scan yields an identity's jobs in
/// chronological order.
#[must_use]
pub fn identity_job_key(identity: &Identity, job_id: &JobId) -> Vec<u8> {
    let mut key = identity.key_bytes();
    key.push(INDEX_SEPARATOR);
    key.extend_from_slice(&job_id.to_bytes());
    key
}

/// Create the prefix for iterating all jobs for an identity.
#[must_use]
pub fn identity_jobs_prefix(identity: &Identity) -> Vec<u8> {
    let mut key = identity.key_bytes();
    key.push(INDEX_SEPARATOR);
    key
}

/// Extract the job ID from the tail of an identity-job index key.
///
/// # Panics
///
/// Panics if the key is shorter than 16 bytes.
#[must_use]
pub fn extract_job_id_from_index_key(key: &[u8]) -> JobId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[key.len() - 16..]);
    JobId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create an API key record key from the key hash.
#[must_use]
pub fn api_key_key(key_hash: &str) -> Vec<u8> {
    key_hash.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use squish_core::{SessionId, UserId};

    #[test]
    fn identity_job_key_format() {
        let identity = Identity::User(UserId::generate());
        let job_id = JobId::generate();
        let key = identity_job_key(&identity, &job_id);

        assert_eq!(key.len(), 17 + 1 + 16);
        assert!(key.starts_with(&identity.key_bytes()));
        assert_eq!(&key[key.len() - 16..], job_id.to_bytes());
    }

    #[test]
    fn extract_job_id_roundtrip() {
        let identity = Identity::Session(SessionId::generate());
        let job_id = JobId::generate();
        let key = identity_job_key(&identity, &job_id);

        assert_eq!(extract_job_id_from_index_key(&key), job_id);
    }

    #[test]
    fn page_prefixes_do_not_collide() {
        let a = Identity::Page("compress".parse().unwrap());
        let b = Identity::Page("compress-jpeg".parse().unwrap());
        let prefix_a = identity_jobs_prefix(&a);
        let key_b = identity_job_key(&b, &JobId::generate());
        // "compress" + separator is not a prefix of any "compress-jpeg" key.
        assert!(!key_b.starts_with(&prefix_a));
    }
}
