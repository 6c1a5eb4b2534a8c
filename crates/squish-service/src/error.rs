//! API error types and responses.
//!
//! The taxonomy maps straight onto status codes: authentication failures are
//! 401, subscription/feature denials are 403, exhausted quotas are 429 with
//! a `reason` and an `upgrade_required` hint, and anything unexpected is a
//! generic 500 with the detail kept server-side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use squish_core::{PlanId, TierFeature};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Valid key, but the tier requires an active paid subscription.
    #[error("subscription required")]
    SubscriptionRequired,

    /// The attached tier does not bundle the required feature.
    #[error("feature not available on this tier: {feature}")]
    FeatureNotAvailable {
        /// The missing feature.
        feature: TierFeature,
        /// The tier that bundles it.
        upgrade: PlanId,
    },

    /// A usage window or rate limit is exhausted.
    #[error("{reason}")]
    QuotaExceeded {
        /// The denial reason, e.g. "monthly limit reached".
        reason: String,
        /// The tier that would lift the limit, when one exists.
        upgrade: Option<PlanId>,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::SubscriptionRequired => (
                StatusCode::FORBIDDEN,
                "subscription_required",
                self.to_string(),
                None,
            ),
            Self::FeatureNotAvailable { feature, upgrade } => (
                StatusCode::FORBIDDEN,
                "feature_not_available",
                self.to_string(),
                Some(serde_json::json!({
                    "feature": feature.as_str(),
                    "upgrade_required": upgrade.as_str(),
                })),
            ),
            Self::QuotaExceeded { reason, upgrade } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                reason.clone(),
                upgrade
                    .as_ref()
                    .map(|plan| serde_json::json!({ "upgrade_required": plan.as_str() })),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<squish_store::StoreError> for ApiError {
    fn from(err: squish_store::StoreError) -> Self {
        match err {
            squish_store::StoreError::NotFound => Self::NotFound("resource not found".into()),
            squish_store::StoreError::QuotaExceeded { window } => Self::QuotaExceeded {
                reason: format!("{window} limit reached"),
                upgrade: None,
            },
            squish_store::StoreError::Database(msg)
            | squish_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
