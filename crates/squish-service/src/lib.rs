//! Squish HTTP API Service.
//!
//! This crate provides the HTTP API for the squish image platform,
//! including:
//!
//! - Usage statistics and pre-flight operation checks
//! - The session file cache (upload, list, clear)
//! - Tier-gated processing operations and job history
//! - Admin API key provisioning
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **Dashboard JWT tokens** - For end-user requests (usage widgets, etc.)
//! 2. **API keys** - For tier-gated API requests (`X-API-Key`)
//! 3. **Admin keys** - For key provisioning (`X-Admin-Key`)
//!
//! Anonymous traffic is identified by the `X-Session-Id` header or a page
//! identifier, and tracked against the free plan's limits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers need async for consistency

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod tiers;
pub mod tracker;

pub use cache::{CachedFile, FileCache, FileCacheConfig};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use ratelimit::ApiRateWindow;
pub use routes::create_router;
pub use state::AppState;
pub use tiers::{ApiTier, RecordedOperation};
pub use tracker::{Decision, UsageReport, UsageTracker};
