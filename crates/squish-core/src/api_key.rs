//! API key records.
//!
//! Keys are stored by their SHA-256 hash; the plaintext exists only in the
//! one response that mints it. A record binds the key to its owning user,
//! an API plan, and a subscription flag checked by the tier middleware.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{PlanId, UserId};

/// A stored API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Hex SHA-256 of the plaintext key.
    pub key_hash: String,
    /// The user the key belongs to; API usage is accounted against them.
    pub user_id: UserId,
    /// The API plan the key resolves to.
    pub plan: PlanId,
    /// Free-form label shown in dashboards.
    pub label: String,
    /// Whether the owning subscription is currently paid up. Tiers with a
    /// payment requirement are refused while this is false.
    pub subscription_active: bool,
    /// Whether the key is usable at all.
    pub active: bool,
    /// When the key was minted.
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    /// Build a record for a freshly minted plaintext key.
    #[must_use]
    pub fn new(
        plaintext: &str,
        user_id: UserId,
        plan: PlanId,
        label: String,
        subscription_active: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key_hash: hash_api_key(plaintext),
            user_id,
            plan,
            label,
            subscription_active,
            active: true,
            created_at: now,
        }
    }
}

/// Hex SHA-256 of a presented API key, the lookup key for `ApiKeyRecord`.
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
