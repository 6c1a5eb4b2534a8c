//! Admin API key provisioning handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use squish_core::{hash_api_key, ApiKeyRecord, PlanId, UserId};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// API key creation request.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    /// The user the key belongs to.
    pub user_id: String,
    /// The plan the key resolves to (e.g. "starter", "professional").
    pub plan: String,
    /// Free-form label.
    pub label: Option<String>,
    /// Whether the owning subscription is paid up (default true).
    pub subscription_active: Option<bool>,
}

/// API key creation response. The plaintext key appears here and nowhere
/// else; only its hash is stored.
#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    /// The plaintext API key.
    pub api_key: String,
    /// The owning user.
    pub user_id: String,
    /// The resolved plan.
    pub plan: String,
}

/// `POST /admin/api-keys`
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<CreateApiKeyRequest>,
) -> Result<Json<CreateApiKeyResponse>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid user id".into()))?;

    let plan = PlanId::parse(&body.plan)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown plan: {}", body.plan)))?;

    let plaintext = format!(
        "sq_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );

    let record = ApiKeyRecord::new(
        &plaintext,
        user_id,
        plan,
        body.label.unwrap_or_default(),
        body.subscription_active.unwrap_or(true),
        state.clock.now(),
    );
    state.store.put_api_key(&record)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        plan = %plan,
        "API key minted"
    );

    Ok(Json(CreateApiKeyResponse {
        api_key: plaintext,
        user_id: user_id.to_string(),
        plan: plan.as_str().to_string(),
    }))
}

/// `DELETE /admin/api-keys/{key}`
///
/// Revoke a key by its plaintext.
pub async fn revoke_api_key(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key_hash = hash_api_key(&key);
    state
        .store
        .revoke_api_key(&key_hash)
        .map_err(|_| ApiError::NotFound("api key not found".into()))?;

    tracing::info!(admin_id = %admin.admin_id, "API key revoked");

    Ok(Json(serde_json::json!({ "revoked": true })))
}
