//! Tier middleware for the API surface.
//!
//! Every `/v1` request walks the same chain: resolve the API key, attach the
//! tier, validate quota and rate, invoke the handler, then record usage.
//! Each stage can short-circuit with a terminal error (401 missing/unknown
//! key, 403 inactive subscription, 429 exhausted quota or rate). Usage is
//! recorded only after a 2xx response, off the request path; a failed
//! recording is logged and never surfaced.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use squish_core::{
    hash_api_key, upgrade_for_feature, validate_access, Identity, OperationClass, TierConfig,
    TierFeature, UserId,
};

use crate::error::ApiError;
use crate::state::AppState;

/// The tier resolved for a request, attached to request extensions for
/// handlers downstream of the middleware.
#[derive(Debug, Clone, Copy)]
pub struct ApiTier {
    /// The user owning the presented API key; usage is accounted against
    /// them.
    pub user_id: UserId,
    /// The static tier configuration.
    pub config: &'static TierConfig,
}

impl ApiTier {
    /// The identity API usage is recorded under.
    #[must_use]
    pub const fn identity(&self) -> Identity {
        Identity::User(self.user_id)
    }
}

/// Usage to record once the response turns out 2xx. Handlers insert this
/// into response extensions; the middleware consumes it.
#[derive(Debug, Clone)]
pub struct RecordedOperation {
    /// One entry per performed operation: class and bytes moved.
    pub entries: Vec<(OperationClass, u64)>,
}

impl RecordedOperation {
    /// A single-operation record.
    #[must_use]
    pub fn single(class: OperationClass, bytes: u64) -> Self {
        Self {
            entries: vec![(class, bytes)],
        }
    }
}

/// The tier gating chain applied to `/v1` routes.
pub async fn tier_gate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Stage 1: resolve the API key.
    let api_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let key_hash = hash_api_key(api_key);
    let record = state
        .store
        .get_api_key(&key_hash)?
        .ok_or(ApiError::Unauthorized)?;

    if !record.active {
        return Err(ApiError::Unauthorized);
    }

    // Stage 2: attach the tier.
    let config = TierConfig::resolve(record.plan);
    if config.requires_payment && !record.subscription_active {
        return Err(ApiError::SubscriptionRequired);
    }

    let tier = ApiTier {
        user_id: record.user_id,
        config,
    };
    let identity = tier.identity();

    // Stage 3: validate quota and rate.
    let monthly_used = state
        .tracker
        .monthly_used(&identity, OperationClass::Regular)?;
    let current_rate = state.rate.current_rate(&key_hash);

    let decision = validate_access(config, monthly_used, current_rate);
    if !decision.allowed {
        return Err(ApiError::QuotaExceeded {
            reason: decision
                .reason
                .unwrap_or_else(|| "limit reached".to_string()),
            upgrade: decision.upgrade_required,
        });
    }

    state.rate.record(&key_hash);
    req.extensions_mut().insert(tier);

    // Stage 4: invoke the handler.
    let mut response = next.run(req).await;
    attach_tier_headers(&mut response, config);

    // Stage 5: record usage after a 2xx, without blocking the response.
    if response.status().is_success() {
        if let Some(recorded) = response.extensions().get::<RecordedOperation>().cloned() {
            let tracker = state.tracker.clone();
            tokio::spawn(async move {
                for (class, bytes) in recorded.entries {
                    if let Err(e) = tracker.record_operation(&identity, class, bytes, config) {
                        tracing::warn!(
                            identity = %identity,
                            class = class.as_str(),
                            error = %e,
                            "Failed to record usage"
                        );
                    }
                }
            });
        }
    }

    Ok(response)
}

/// Attach the tier display headers to an outgoing response.
fn attach_tier_headers(response: &mut Response, config: &'static TierConfig) {
    let headers = response.headers_mut();
    headers.insert("x-api-tier", HeaderValue::from_static(config.plan.as_str()));
    headers.insert(
        "x-api-tier-display",
        HeaderValue::from_static(config.plan.display_name()),
    );
    headers.insert("x-api-rate-limit", HeaderValue::from(config.rate_per_minute));
    headers.insert(
        "x-api-monthly-limit",
        HeaderValue::from(config.regular.monthly),
    );
}

/// Deny with 403 and an upgrade hint when the attached tier lacks `feature`.
fn check_feature(req: &Request, feature: TierFeature) -> Result<(), ApiError> {
    let tier = req
        .extensions()
        .get::<ApiTier>()
        .ok_or_else(|| ApiError::Internal("tier middleware not applied".into()))?;

    if tier.config.has_feature(feature) {
        Ok(())
    } else {
        Err(ApiError::FeatureNotAvailable {
            feature,
            upgrade: upgrade_for_feature(feature),
        })
    }
}

/// Route layer requiring the batch-processing feature.
pub async fn require_batch(req: Request, next: Next) -> Result<Response, ApiError> {
    check_feature(&req, TierFeature::BatchProcessing)?;
    Ok(next.run(req).await)
}
