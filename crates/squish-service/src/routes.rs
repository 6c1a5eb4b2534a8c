//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, files, health, operations, stats};
use crate::state::AppState;
use crate::tiers;

/// Maximum concurrent requests for the session (`/api`) surface; uploads
/// make these the heaviest requests in the service.
const SESSION_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for tier-gated (`/v1`) routes.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Session surface (`X-Session-Id` / optional bearer token)
/// - `GET /api/usage-stats` - Usage stats for the caller
/// - `GET /api/universal-usage-stats` - Same, accepting page identifiers
/// - `POST /api/check-operation` - Pre-flight quota check
/// - `POST /api/files` - Cache an upload
/// - `GET /api/files` - List cached files
/// - `DELETE /api/files` - Clear the session's files
/// - `GET /api/files/{id}` - Cached file metadata
///
/// ## Tier-gated API (`X-API-Key`, tier middleware)
/// - `POST /v1/operations` - Submit an operation
/// - `POST /v1/operations/batch` - Submit a batch (batch feature)
/// - `GET /v1/jobs` - Job history
/// - `GET /v1/jobs/{id}` - Single job
///
/// ## Admin (`X-Admin-Key`)
/// - `POST /admin/api-keys` - Mint an API key
/// - `DELETE /admin/api-keys/{key}` - Revoke an API key
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let session_routes = Router::new()
        .route("/usage-stats", get(stats::usage_stats))
        .route("/universal-usage-stats", get(stats::universal_usage_stats))
        .route("/check-operation", post(stats::check_operation))
        .route(
            "/files",
            post(files::upload_file)
                .get(files::list_files)
                .delete(files::clear_files),
        )
        .route("/files/:id", get(files::get_file))
        .layer(ConcurrencyLimitLayer::new(SESSION_MAX_CONCURRENT_REQUESTS));

    // Batch routes carry their own feature gate inside the tier chain.
    let batch_routes = Router::new()
        .route("/operations/batch", post(operations::submit_batch))
        .layer(from_fn(tiers::require_batch));

    let api_routes = Router::new()
        .route("/operations", post(operations::submit_operation))
        .route("/jobs", get(operations::list_jobs))
        .route("/jobs/:id", get(operations::get_job))
        .merge(batch_routes)
        .layer(from_fn_with_state(state.clone(), tiers::tier_gate))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    let admin_routes = Router::new()
        .route("/api-keys", post(admin::create_api_key))
        .route("/api-keys/:key", delete(admin::revoke_api_key));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", session_routes)
        .nest("/v1", api_routes)
        .nest("/admin", admin_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
