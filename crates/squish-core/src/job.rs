//! Processing job records.
//!
//! The service records what was asked for and hands the work to the external
//! codec pipeline; it never transcodes. A `Job` is therefore bookkeeping: the
//! cached input, the requested transformation, and the lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Identity, JobId, OperationClass};

/// The requested transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JobKind {
    /// Re-encode at reduced size in the source format.
    Compress,
    /// Convert to another output format.
    Convert {
        /// Target format, e.g. `"webp"`.
        target: String,
    },
}

impl JobKind {
    /// The kind as a lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Convert { .. } => "convert",
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and queued for the codec pipeline.
    Accepted,
    /// Processed successfully.
    Completed,
    /// Processing failed.
    Failed,
}

/// A recorded processing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Time-ordered job identifier.
    pub id: JobId,
    /// The identity the job is accounted against.
    pub identity: Identity,
    /// The requested transformation.
    pub kind: JobKind,
    /// Operation class derived from the input filename.
    pub class: OperationClass,
    /// The cached file the job reads from.
    pub source_file: String,
    /// Original upload filename.
    pub original_name: String,
    /// Size of the input in bytes.
    pub input_bytes: u64,
    /// Lifecycle state.
    pub status: JobStatus,
    /// When the job was accepted.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Record a freshly accepted job.
    #[must_use]
    pub fn accepted(
        identity: Identity,
        kind: JobKind,
        source_file: String,
        original_name: String,
        input_bytes: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let class = OperationClass::from_filename(&original_name);
        Self {
            id: JobId::generate(),
            identity,
            kind,
            class,
            source_file,
            original_name,
            input_bytes,
            status: JobStatus::Accepted,
            created_at: now,
        }
    }
}
