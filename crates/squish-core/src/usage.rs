//! Usage accounting types.
//!
//! A `UsageRecord` holds six counters (regular/RAW × hourly/daily/monthly)
//! behind three shared reset timestamps, plus a monthly bandwidth
//! accumulator. Counters only ever increase within a window; once a window's
//! reset timestamp has elapsed the counter reads as zero, and the next write
//! rolls the timestamp forward by whole window lengths.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Identity;

/// File extensions treated as RAW camera formats.
const RAW_EXTENSIONS: &[&str] = &[
    "cr2", "cr3", "nef", "nrw", "arw", "srf", "sr2", "dng", "orf", "raf", "rw2", "pef", "srw",
    "x3f", "raw",
];

/// The class of a processing operation.
///
/// RAW-format processing is metered separately from regular image work
/// because it is far more expensive for the downstream codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Standard image compression/conversion (JPEG, PNG, WebP, ...).
    Regular,
    /// RAW camera format processing (CR2, NEF, ARW, DNG, ...).
    Raw,
}

impl OperationClass {
    /// Classify an operation by the input filename's extension.
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename.rsplit('.').next().unwrap_or_default().to_lowercase();
        if filename.contains('.') && RAW_EXTENSIONS.contains(&ext.as_str()) {
            Self::Raw
        } else {
            Self::Regular
        }
    }

    /// The class as a lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Raw => "raw",
        }
    }
}

/// A fixed-duration counting period after which usage resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// One hour.
    Hourly,
    /// Twenty-four hours.
    Daily,
    /// Thirty days.
    Monthly,
}

impl Window {
    /// All windows, in the order they are evaluated when gating.
    pub const ALL: [Self; 3] = [Self::Hourly, Self::Daily, Self::Monthly];

    /// The window length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            Self::Hourly => Duration::hours(1),
            Self::Daily => Duration::hours(24),
            Self::Monthly => Duration::days(30),
        }
    }

    /// The window as a lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one window, shared by both operation classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowUsage {
    /// Regular operations counted in the current window.
    pub regular: u64,
    /// RAW operations counted in the current window.
    pub raw: u64,
    /// When the current window ends and both counters read as zero.
    pub resets_at: DateTime<Utc>,
}

impl WindowUsage {
    /// Fresh counters for a window starting at `now`.
    #[must_use]
    pub fn new(window: Window, now: DateTime<Utc>) -> Self {
        Self {
            regular: 0,
            raw: 0,
            resets_at: now + window.duration(),
        }
    }

    /// The stored counter for `class`, ignoring expiry.
    #[must_use]
    pub const fn used(&self, class: OperationClass) -> u64 {
        match class {
            OperationClass::Regular => self.regular,
            OperationClass::Raw => self.raw,
        }
    }

    /// The counter for `class` as observed at `now`: zero once the window
    /// has elapsed, the stored value otherwise. Reads never mutate.
    #[must_use]
    pub fn effective_used(&self, class: OperationClass, now: DateTime<Utc>) -> u64 {
        if now >= self.resets_at {
            0
        } else {
            self.used(class)
        }
    }

    /// Roll the window forward if it has elapsed: zero both counters and
    /// advance `resets_at` by whole window lengths until it is in the
    /// future. Returns whether a roll happened.
    pub fn roll(&mut self, window: Window, now: DateTime<Utc>) -> bool {
        if now < self.resets_at {
            return false;
        }
        self.regular = 0;
        self.raw = 0;
        while self.resets_at <= now {
            self.resets_at += window.duration();
        }
        true
    }

    /// Increment the counter for `class`.
    pub fn increment(&mut self, class: OperationClass) {
        match class {
            OperationClass::Regular => self.regular += 1,
            OperationClass::Raw => self.raw += 1,
        }
    }
}

/// Per-identity usage state: six counters behind three reset timestamps,
/// plus the monthly bandwidth accumulator.
///
/// Records are owned by the accounting store and mutated only through the
/// record-operation path; they are never deleted by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Who this usage belongs to.
    pub identity: Identity,
    /// The hourly window.
    pub hourly: WindowUsage,
    /// The daily window.
    pub daily: WindowUsage,
    /// The monthly window.
    pub monthly: WindowUsage,
    /// Bytes processed in the current monthly window.
    pub monthly_bytes: u64,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl UsageRecord {
    /// A zeroed record with all three windows starting at `now`.
    #[must_use]
    pub fn new(identity: Identity, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            hourly: WindowUsage::new(Window::Hourly, now),
            daily: WindowUsage::new(Window::Daily, now),
            monthly: WindowUsage::new(Window::Monthly, now),
            monthly_bytes: 0,
            updated_at: now,
        }
    }

    /// The counters for `window`.
    #[must_use]
    pub const fn window(&self, window: Window) -> &WindowUsage {
        match window {
            Window::Hourly => &self.hourly,
            Window::Daily => &self.daily,
            Window::Monthly => &self.monthly,
        }
    }

    /// The counter for (`window`, `class`) as observed at `now`.
    #[must_use]
    pub fn effective_used(&self, window: Window, class: OperationClass, now: DateTime<Utc>) -> u64 {
        self.window(window).effective_used(class, now)
    }

    /// Apply lazy resets to every elapsed window. The bandwidth accumulator
    /// is zeroed together with the monthly counters.
    pub fn roll_windows(&mut self, now: DateTime<Utc>) {
        self.hourly.roll(Window::Hourly, now);
        self.daily.roll(Window::Daily, now);
        if self.monthly.roll(Window::Monthly, now) {
            self.monthly_bytes = 0;
        }
    }

    /// Count one operation of `class` moving `bytes` through the service.
    ///
    /// Rolls elapsed windows first, then increments the class counter in all
    /// three windows and accumulates bandwidth.
    pub fn record(&mut self, class: OperationClass, bytes: u64, now: DateTime<Utc>) {
        self.roll_windows(now);
        self.hourly.increment(class);
        self.daily.increment(class);
        self.monthly.increment(class);
        self.monthly_bytes += bytes;
        self.updated_at = now;
    }
}

/// A single window's position against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStatus {
    /// Operations counted in the window.
    pub used: u64,
    /// The window's limit for the plan.
    pub limit: u64,
    /// Headroom left in the window.
    pub remaining: u64,
}

impl WindowStatus {
    /// Build a status from a counter and its limit.
    #[must_use]
    pub const fn new(used: u64, limit: u64) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }
}

/// The three-window view of one operation class, as returned by the
/// usage-stats endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Hourly window status.
    pub hourly: WindowStatus,
    /// Daily window status.
    pub daily: WindowStatus,
    /// Monthly window status.
    pub monthly: WindowStatus,
}
