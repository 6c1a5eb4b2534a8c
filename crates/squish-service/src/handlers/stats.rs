//! Usage statistics and pre-flight check handlers.
//!
//! These are the endpoints the frontend widgets poll. Identity resolution
//! order is user, then session, then (where accepted) page identifier, and
//! none of them consume quota: reads never write usage records.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use squish_core::{Identity, OperationClass, PageId, PlanId, TierConfig, WindowStatus};

use crate::auth::{AuthUser, ClientSession};
use crate::error::ApiError;
use crate::state::AppState;
use crate::tracker::UsageReport;

/// Query parameters accepted by the stats endpoints.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Plan whose limits the response is rendered against. Display only;
    /// gating always uses the resolved plan.
    #[serde(rename = "planId")]
    pub plan_id: Option<String>,

    /// Page identifier for anonymous per-page tracking.
    #[serde(rename = "pageId")]
    pub page_id: Option<String>,
}

/// One operation class's position against its limits.
///
/// `used`/`limit`/`remaining` mirror the monthly window (the widgets'
/// headline numbers); the three window fields carry the full picture.
#[derive(Debug, Serialize)]
pub struct OperationsStats {
    /// Monthly operations used.
    pub used: u64,
    /// Monthly operation limit.
    pub limit: u64,
    /// Monthly headroom.
    pub remaining: u64,
    /// Hourly window status.
    pub hourly: WindowStatus,
    /// Daily window status.
    pub daily: WindowStatus,
    /// Monthly window status.
    pub monthly: WindowStatus,
}

impl From<squish_core::UsageSnapshot> for OperationsStats {
    fn from(snapshot: squish_core::UsageSnapshot) -> Self {
        Self {
            used: snapshot.monthly.used,
            limit: snapshot.monthly.limit,
            remaining: snapshot.monthly.remaining,
            hourly: snapshot.hourly,
            daily: snapshot.daily,
            monthly: snapshot.monthly,
        }
    }
}

/// Monthly bandwidth position.
#[derive(Debug, Serialize)]
pub struct BandwidthStats {
    /// Bytes processed in the current monthly window.
    pub monthly_used_bytes: u64,
    /// The plan's monthly bandwidth allowance.
    pub monthly_limit_bytes: u64,
}

/// Usage statistics response.
#[derive(Debug, Serialize)]
pub struct UsageStatsResponse {
    /// The identity the stats are scoped to, e.g. `"session:<uuid>"`.
    pub identity: String,
    /// The plan the limits were rendered against.
    pub plan: String,
    /// Regular operation usage.
    pub operations: OperationsStats,
    /// RAW operation usage.
    pub raw_operations: OperationsStats,
    /// Bandwidth usage.
    pub bandwidth: BandwidthStats,
}

fn build_response(
    identity: &Identity,
    config: &'static TierConfig,
    report: UsageReport,
) -> UsageStatsResponse {
    UsageStatsResponse {
        identity: identity.to_string(),
        plan: config.plan.as_str().to_string(),
        operations: report.regular.into(),
        raw_operations: report.raw.into(),
        bandwidth: BandwidthStats {
            monthly_used_bytes: report.monthly_bytes,
            monthly_limit_bytes: config.monthly_bandwidth_bytes,
        },
    }
}

/// Resolve the plan to render limits against: an explicit `planId` must be
/// known, no `planId` means free.
fn resolve_plan(plan_id: Option<&str>) -> Result<&'static TierConfig, ApiError> {
    match plan_id {
        None => Ok(TierConfig::resolve(PlanId::Free)),
        Some(s) => TierConfig::resolve_str(s)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown plan: {s}"))),
    }
}

/// `GET /api/usage-stats[?planId=...]`
///
/// Stats for the authenticated user, or for the caller's session.
pub async fn usage_stats(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
    session: Option<ClientSession>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<UsageStatsResponse>, ApiError> {
    let identity = user
        .map(|u| Identity::User(u.user_id))
        .or_else(|| session.map(|s| Identity::Session(s.session_id)))
        .ok_or_else(|| {
            ApiError::BadRequest("supply a bearer token or an X-Session-Id header".into())
        })?;

    let config = resolve_plan(query.plan_id.as_deref())?;
    let report = state.tracker.report(&identity, config)?;

    Ok(Json(build_response(&identity, config, report)))
}

/// `GET /api/universal-usage-stats[?pageId=...]`
///
/// Same shape as `usage_stats`, but also accepts a page identifier so
/// landing pages can render an indicator before any session exists.
/// Anonymous identities are always rendered against the free plan.
pub async fn universal_usage_stats(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
    session: Option<ClientSession>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<UsageStatsResponse>, ApiError> {
    let page = query
        .page_id
        .as_deref()
        .map(str::parse::<PageId>)
        .transpose()
        .map_err(|_| ApiError::BadRequest("invalid pageId".into()))?;

    let (identity, config) = match (user, session, page) {
        (Some(u), _, _) => (
            Identity::User(u.user_id),
            resolve_plan(query.plan_id.as_deref())?,
        ),
        (None, Some(s), _) => (
            Identity::Session(s.session_id),
            TierConfig::resolve(PlanId::Free),
        ),
        (None, None, Some(p)) => (Identity::Page(p), TierConfig::resolve(PlanId::Free)),
        (None, None, None) => {
            return Err(ApiError::BadRequest(
                "supply a bearer token, an X-Session-Id header, or a pageId".into(),
            ))
        }
    };

    let report = state.tracker.report(&identity, config)?;

    Ok(Json(build_response(&identity, config, report)))
}

/// Pre-flight check request.
#[derive(Debug, Deserialize)]
pub struct CheckOperationRequest {
    /// The filename the client intends to process.
    pub filename: String,

    /// Size of the file in bytes.
    #[serde(rename = "fileSize", default)]
    pub file_size: u64,

    /// Page identifier for anonymous tracking.
    #[serde(rename = "pageIdentifier")]
    pub page_identifier: Option<String>,

    /// Plan to evaluate against; defaults to free.
    #[serde(rename = "planId")]
    pub plan_id: Option<String>,
}

/// Pre-flight check response.
#[derive(Debug, Serialize)]
pub struct CheckOperationResponse {
    /// Whether the operation would be allowed right now.
    pub allowed: bool,
    /// The denial reason, when denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Headroom in the binding window.
    pub remaining: u64,
    /// The binding window's limit.
    pub limit: u64,
    /// The class the filename resolved to.
    pub operation_class: String,
}

/// `POST /api/check-operation`
///
/// Evaluates all three windows for the class inferred from the filename.
/// Never consumes quota.
pub async fn check_operation(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
    session: Option<ClientSession>,
    Json(body): Json<CheckOperationRequest>,
) -> Result<Json<CheckOperationResponse>, ApiError> {
    if body.filename.trim().is_empty() {
        return Err(ApiError::BadRequest("filename is required".into()));
    }

    let page = body
        .page_identifier
        .as_deref()
        .map(str::parse::<PageId>)
        .transpose()
        .map_err(|_| ApiError::BadRequest("invalid pageIdentifier".into()))?;

    let identity = user
        .map(|u| Identity::User(u.user_id))
        .or_else(|| session.map(|s| Identity::Session(s.session_id)))
        .or_else(|| page.map(Identity::Page))
        .ok_or_else(|| {
            ApiError::BadRequest(
                "supply a bearer token, an X-Session-Id header, or a pageIdentifier".into(),
            )
        })?;

    let config = resolve_plan(body.plan_id.as_deref())?;
    let class = OperationClass::from_filename(&body.filename);
    let decision = state.tracker.check_operation(&identity, class, config)?;

    tracing::debug!(
        identity = %identity,
        class = class.as_str(),
        file_size = body.file_size,
        allowed = decision.allowed,
        "Pre-flight operation check"
    );

    Ok(Json(CheckOperationResponse {
        allowed: decision.allowed,
        reason: decision.reason,
        remaining: decision.remaining,
        limit: decision.limit,
        operation_class: class.as_str().to_string(),
    }))
}
