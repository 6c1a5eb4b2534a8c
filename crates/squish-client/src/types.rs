//! Response types mirroring the squish API.

use serde::{Deserialize, Serialize};

/// A single window's position against its limit.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowStatus {
    /// Operations counted in the window.
    pub used: u64,
    /// The window's limit.
    pub limit: u64,
    /// Headroom left.
    pub remaining: u64,
}

/// One operation class's usage across all windows.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsStats {
    /// Monthly operations used (the headline number).
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

/// Monthly bandwidth position.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BandwidthStats {
    /// Bytes processed in the current monthly window.
    pub monthly_used_bytes: u64,
    /// The plan's monthly allowance.
    pub monthly_limit_bytes: u64,
}

/// Usage statistics for one identity.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageStats {
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

/// Pre-flight check result.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckOperation {
    /// Whether the operation would be allowed right now.
    pub allowed: bool,
    /// The denial reason, when denied.
    #[serde(default)]
    pub reason: Option<String>,
    /// Headroom in the binding window.
    pub remaining: u64,
    /// The binding window's limit.
    pub limit: u64,
    /// The class the filename resolved to ("regular" or "raw").
    pub operation_class: String,
}

/// The operation to submit.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Re-encode at reduced size.
    Compress,
    /// Convert to another format.
    Convert,
}

/// An accepted processing job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInfo {
    /// Job identifier.
    pub id: String,
    /// Lifecycle state ("accepted", "completed", "failed").
    pub status: String,
    /// Operation kind.
    pub operation: String,
    /// Target format for conversions.
    #[serde(default)]
    pub target_format: Option<String>,
    /// Operation class the input resolved to.
    pub operation_class: String,
    /// Original upload filename.
    pub original_name: String,
    /// Input size in bytes.
    pub input_bytes: u64,
    /// When the job was accepted (RFC 3339).
    pub created_at: String,
}
