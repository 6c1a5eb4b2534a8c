//! Tier-gated processing operation handlers.
//!
//! Operations reference a cached upload by ID, pass the usage gate, and are
//! recorded as jobs for the external codec pipeline. The handler sets a
//! `RecordedOperation` response extension; the tier middleware turns it into
//! an asynchronous usage record once the response is out.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use squish_core::{Job, JobId, JobKind, OperationClass, TierFeature};

use crate::auth::ClientSession;
use crate::cache::CachedFile;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tiers::{ApiTier, RecordedOperation};

/// Default page size for job listings.
const DEFAULT_JOBS_LIMIT: usize = 20;

/// Maximum page size for job listings.
const MAX_JOBS_LIMIT: usize = 100;

/// The operation named in a request.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedOperation {
    /// Re-encode at reduced size.
    Compress,
    /// Convert to another format.
    Convert,
}

/// Single-operation request.
#[derive(Debug, Deserialize)]
pub struct OperationRequest {
    /// Cached file to process.
    pub file_id: String,
    /// What to do with it.
    pub operation: RequestedOperation,
    /// Target format for conversions.
    pub target_format: Option<String>,
}

/// A job as returned to clients.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    /// Job identifier.
    pub id: String,
    /// Lifecycle state.
    pub status: String,
    /// Operation kind.
    pub operation: String,
    /// Target format for conversions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    /// Operation class the input resolved to.
    pub operation_class: String,
    /// Original upload filename.
    pub original_name: String,
    /// Input size in bytes.
    pub input_bytes: u64,
    /// When the job was accepted.
    pub created_at: String,
}

impl From<&Job> for JobResponse {
    fn from(job: &Job) -> Self {
        let (operation, target_format) = match &job.kind {
            JobKind::Compress => ("compress".to_string(), None),
            JobKind::Convert { target } => ("convert".to_string(), Some(target.clone())),
        };

        Self {
            id: job.id.to_string(),
            status: format!("{:?}", job.status).to_lowercase(),
            operation,
            target_format,
            operation_class: job.class.as_str().to_string(),
            original_name: job.original_name.clone(),
            input_bytes: job.input_bytes,
            created_at: job.created_at.to_rfc3339(),
        }
    }
}

fn job_kind(
    operation: RequestedOperation,
    target_format: Option<String>,
) -> Result<JobKind, ApiError> {
    match operation {
        RequestedOperation::Compress => Ok(JobKind::Compress),
        RequestedOperation::Convert => {
            let target = target_format
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest("target_format is required for convert".into())
                })?;
            Ok(JobKind::Convert { target })
        }
    }
}

/// Resolve, gate, and persist one operation. Returns the accepted job.
fn accept_operation(
    state: &AppState,
    tier: &ApiTier,
    session: &ClientSession,
    file_id: &str,
    kind: JobKind,
) -> Result<Job, ApiError> {
    let file: CachedFile = state
        .cache
        .get(file_id)
        .filter(|f| f.session == session.session_id)
        .ok_or_else(|| ApiError::NotFound(format!("file not found or expired: {file_id}")))?;

    let class = OperationClass::from_filename(&file.original_name);
    if class == OperationClass::Raw && !tier.config.has_feature(TierFeature::RawProcessing) {
        return Err(ApiError::FeatureNotAvailable {
            feature: TierFeature::RawProcessing,
            upgrade: squish_core::upgrade_for_feature(TierFeature::RawProcessing),
        });
    }

    // The middleware already validated tier-level access; this re-check
    // covers the per-class windows the middleware does not see.
    let decision = state
        .tracker
        .check_operation(&tier.identity(), class, tier.config)?;
    if !decision.allowed {
        return Err(ApiError::QuotaExceeded {
            reason: decision
                .reason
                .unwrap_or_else(|| "limit reached".to_string()),
            upgrade: tier.config.plan.next_tier(),
        });
    }

    let job = Job::accepted(
        tier.identity(),
        kind,
        file.id.clone(),
        file.original_name.clone(),
        file.size_bytes,
        state.clock.now(),
    );
    state.store.put_job(&job)?;

    tracing::info!(
        job_id = %job.id,
        user_id = %tier.user_id,
        operation = job.kind.as_str(),
        class = class.as_str(),
        input_bytes = job.input_bytes,
        "Operation accepted"
    );

    Ok(job)
}

/// `POST /v1/operations`
pub async fn submit_operation(
    State(state): State<Arc<AppState>>,
    Extension(tier): Extension<ApiTier>,
    session: ClientSession,
    Json(body): Json<OperationRequest>,
) -> Result<Response, ApiError> {
    let kind = job_kind(body.operation, body.target_format)?;
    let job = accept_operation(&state, &tier, &session, &body.file_id, kind)?;

    let mut response =
        (StatusCode::ACCEPTED, Json(JobResponse::from(&job))).into_response();
    response
        .extensions_mut()
        .insert(RecordedOperation::single(job.class, job.input_bytes));

    Ok(response)
}

/// Batch operation request.
#[derive(Debug, Deserialize)]
pub struct BatchOperationRequest {
    /// Cached files to process.
    pub file_ids: Vec<String>,
    /// What to do with each of them.
    pub operation: RequestedOperation,
    /// Target format for conversions.
    pub target_format: Option<String>,
}

/// Result for a single file in a batch.
#[derive(Debug, Serialize)]
pub struct BatchOperationResult {
    /// The file the result refers to.
    pub file_id: String,
    /// Whether a job was accepted.
    pub success: bool,
    /// The accepted job, when successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobResponse>,
    /// Error message when not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch operation response.
#[derive(Debug, Serialize)]
pub struct BatchOperationResponse {
    /// Per-file results.
    pub results: Vec<BatchOperationResult>,
    /// Files accepted.
    pub accepted: usize,
    /// Files rejected.
    pub failed: usize,
}

/// `POST /v1/operations/batch` (requires the batch feature)
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    Extension(tier): Extension<ApiTier>,
    session: ClientSession,
    Json(body): Json<BatchOperationRequest>,
) -> Result<Response, ApiError> {
    if body.file_ids.is_empty() {
        return Err(ApiError::BadRequest("file_ids must not be empty".into()));
    }

    let mut results = Vec::with_capacity(body.file_ids.len());
    let mut recorded = Vec::new();
    let mut accepted = 0;
    let mut failed = 0;

    for file_id in body.file_ids {
        let kind = job_kind(body.operation, body.target_format.clone())?;
        match accept_operation(&state, &tier, &session, &file_id, kind) {
            Ok(job) => {
                recorded.push((job.class, job.input_bytes));
                results.push(BatchOperationResult {
                    file_id,
                    success: true,
                    job: Some(JobResponse::from(&job)),
                    error: None,
                });
                accepted += 1;
            }
            Err(e) => {
                results.push(BatchOperationResult {
                    file_id,
                    success: false,
                    job: None,
                    error: Some(e.to_string()),
                });
                failed += 1;
            }
        }
    }

    let mut response = Json(BatchOperationResponse {
        results,
        accepted,
        failed,
    })
    .into_response();

    if !recorded.is_empty() {
        response
            .extensions_mut()
            .insert(RecordedOperation { entries: recorded });
    }

    Ok(response)
}

/// Query parameters for job listings.
#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    /// Page size (default 20, max 100).
    pub limit: Option<usize>,
    /// Offset into the newest-first listing.
    pub offset: Option<usize>,
}

/// Job listing response.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    /// Jobs, newest first.
    pub jobs: Vec<JobResponse>,
    /// Number of jobs in this page.
    pub count: usize,
}

/// `GET /v1/jobs`
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Extension(tier): Extension<ApiTier>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_JOBS_LIMIT).min(MAX_JOBS_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let jobs: Vec<JobResponse> = state
        .store
        .list_jobs(&tier.identity(), limit, offset)?
        .iter()
        .map(JobResponse::from)
        .collect();

    let count = jobs.len();
    Ok(Json(JobListResponse { jobs, count }))
}

/// `GET /v1/jobs/{id}`
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Extension(tier): Extension<ApiTier>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id: JobId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid job id".into()))?;

    let job = state
        .store
        .get_job(&job_id)?
        .filter(|job| job.identity == tier.identity())
        .ok_or_else(|| ApiError::NotFound(format!("job not found: {id}")))?;

    Ok(Json(JobResponse::from(&job)))
}
