//! Core types and utilities for the squish image service.
//!
//! This crate provides the foundational types used throughout the squish
//! platform:
//!
//! - **Identifiers**: `UserId`, `SessionId`, `PageId`, `JobId`, `Identity`
//! - **Usage accounting**: `UsageRecord`, `WindowUsage`, `Window`,
//!   `OperationClass`, `UsageSnapshot`
//! - **Tiers**: `PlanId`, `TierConfig`, `TierFeature`, `validate_access`
//! - **Jobs**: `Job`, `JobKind`, `JobStatus`
//! - **API keys**: `ApiKeyRecord`, `hash_api_key`
//! - **Clock**: `Clock`, `SystemClock`, `ManualClock`
//!
//! # Windows
//!
//! Usage is counted per identity over three rolling windows (hourly, daily,
//! monthly), split by operation class (regular vs. RAW-format processing).
//! Windows reset lazily: a counter is treated as zero once its reset
//! timestamp has elapsed, and the timestamp only advances when the record is
//! next written.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api_key;
pub mod clock;
pub mod ids;
pub mod job;
pub mod tier;
pub mod usage;

pub use api_key::{hash_api_key, ApiKeyRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{IdError, Identity, JobId, PageId, SessionId, UserId};
pub use job::{Job, JobKind, JobStatus};
pub use tier::{
    upgrade_for_feature, validate_access, AccessDecision, PlanId, TierConfig, TierFeature,
    TierLimits,
};
pub use usage::{
    OperationClass, UsageRecord, UsageSnapshot, Window, WindowStatus, WindowUsage,
};
