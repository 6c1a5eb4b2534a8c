//! Usage tracking service.
//!
//! `UsageTracker` is the read side and the write side of usage accounting:
//! `check_operation` evaluates all three windows without writing anything,
//! and `record_operation` delegates to the store's conditional increment.
//! Both take the clock and storage backend the tracker was constructed with,
//! so tests drive them with a manual clock and the in-memory store.

use std::sync::Arc;

use squish_core::{
    Clock, Identity, OperationClass, TierConfig, UsageRecord, UsageSnapshot, Window, WindowStatus,
};
use squish_store::{Result, Store};

/// The outcome of a pre-flight operation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Headroom in the binding window (the failing one when denied, the
    /// monthly window otherwise).
    pub remaining: u64,
    /// The binding window's limit.
    pub limit: u64,
    /// Why the operation was denied, when it was.
    pub reason: Option<String>,
}

/// Usage snapshots for both operation classes plus bandwidth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    /// Regular operation windows.
    pub regular: UsageSnapshot,
    /// RAW operation windows.
    pub raw: UsageSnapshot,
    /// Bytes processed in the current monthly window.
    pub monthly_bytes: u64,
}

/// Multi-window usage accounting over an injected store and clock.
#[derive(Clone)]
pub struct UsageTracker {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl UsageTracker {
    /// Create a tracker over the given backend and clock.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn load(&self, identity: &Identity) -> Result<UsageRecord> {
        Ok(self
            .store
            .get_usage(identity)?
            .unwrap_or_else(|| UsageRecord::new(identity.clone(), self.clock.now())))
    }

    /// Evaluate every window for an operation of `class` under `config`.
    ///
    /// Windows are checked hourly, daily, monthly; the first exhausted one
    /// denies with its reason, independent of headroom in the others. Reads
    /// apply lazy resets in memory only, so checks outside active windows
    /// never write.
    pub fn check_operation(
        &self,
        identity: &Identity,
        class: OperationClass,
        config: &TierConfig,
    ) -> Result<Decision> {
        let now = self.clock.now();
        let record = self.load(identity)?;
        let limits = config.limits(class);

        for window in Window::ALL {
            let used = record.effective_used(window, class, now);
            let limit = limits.limit(window);
            if used >= limit {
                return Ok(Decision {
                    allowed: false,
                    remaining: 0,
                    limit,
                    reason: Some(format!("{window} limit reached")),
                });
            }
        }

        let monthly_used = record.effective_used(Window::Monthly, class, now);
        Ok(Decision {
            allowed: true,
            remaining: limits.monthly.saturating_sub(monthly_used),
            limit: limits.monthly,
            reason: None,
        })
    }

    /// Count one operation against an identity. Fails with the exhausted
    /// window when a racing request took the last slot; callers on the
    /// response path log that instead of surfacing it.
    pub fn record_operation(
        &self,
        identity: &Identity,
        class: OperationClass,
        bytes: u64,
        config: &TierConfig,
    ) -> Result<UsageRecord> {
        self.store
            .record_operation(identity, class, bytes, config, self.clock.now())
    }

    /// Effective monthly usage of `class` for an identity.
    pub fn monthly_used(&self, identity: &Identity, class: OperationClass) -> Result<u64> {
        let now = self.clock.now();
        let record = self.load(identity)?;
        Ok(record.effective_used(Window::Monthly, class, now))
    }

    /// Full per-window report for the stats endpoints.
    pub fn report(&self, identity: &Identity, config: &TierConfig) -> Result<UsageReport> {
        let now = self.clock.now();
        let mut record = self.load(identity)?;
        // Roll in memory so the report and the bandwidth figure agree; the
        // stored record is untouched.
        record.roll_windows(now);

        Ok(UsageReport {
            regular: snapshot(&record, OperationClass::Regular, config, now),
            raw: snapshot(&record, OperationClass::Raw, config, now),
            monthly_bytes: record.monthly_bytes,
        })
    }
}

fn snapshot(
    record: &UsageRecord,
    class: OperationClass,
    config: &TierConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> UsageSnapshot {
    let limits = config.limits(class);
    UsageSnapshot {
        hourly: WindowStatus::new(
            record.effective_used(Window::Hourly, class, now),
            limits.hourly,
        ),
        daily: WindowStatus::new(
            record.effective_used(Window::Daily, class, now),
            limits.daily,
        ),
        monthly: WindowStatus::new(
            record.effective_used(Window::Monthly, class, now),
            limits.monthly,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use squish_core::{ManualClock, PlanId, UserId};
    use squish_store::MemoryStore;

    fn tracker() -> (UsageTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryStore::new());
        (UsageTracker::new(store, clock.clone()), clock)
    }

    #[test]
    fn free_plan_denies_501st_monthly_operation() {
        let (tracker, clock) = tracker();
        let identity = Identity::User(UserId::generate());
        let config = TierConfig::resolve(PlanId::Free);

        // 500 operations spread to stay inside the hourly (20) and daily
        // (100) windows: 5 days of 5 hourly batches of 20.
        let mut recorded = 0;
        for _ in 0..5 {
            for _ in 0..5 {
                for _ in 0..20 {
                    tracker
                        .record_operation(&identity, OperationClass::Regular, 0, config)
                        .unwrap();
                    recorded += 1;
                }
                clock.advance(Duration::hours(1));
            }
            clock.advance(Duration::hours(20));
        }
        assert_eq!(recorded, 500);

        let decision = tracker
            .check_operation(&identity, OperationClass::Regular, config)
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("monthly limit reached"));
        assert_eq!(decision.limit, 500);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn denies_on_any_exhausted_window() {
        let (tracker, _clock) = tracker();
        let identity = Identity::User(UserId::generate());
        let config = TierConfig::resolve(PlanId::Free);

        // Exhaust only the hourly window; daily and monthly have headroom.
        for _ in 0..config.regular.hourly {
            tracker
                .record_operation(&identity, OperationClass::Regular, 0, config)
                .unwrap();
        }

        let decision = tracker
            .check_operation(&identity, OperationClass::Regular, config)
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("hourly limit reached"));
        assert_eq!(decision.limit, config.regular.hourly);
    }

    #[test]
    fn window_reset_restores_allowance() {
        let (tracker, clock) = tracker();
        let identity = Identity::User(UserId::generate());
        let config = TierConfig::resolve(PlanId::Free);

        for _ in 0..config.regular.hourly {
            tracker
                .record_operation(&identity, OperationClass::Regular, 0, config)
                .unwrap();
        }
        assert!(!tracker
            .check_operation(&identity, OperationClass::Regular, config)
            .unwrap()
            .allowed);

        clock.advance(Duration::minutes(61));
        let decision = tracker
            .check_operation(&identity, OperationClass::Regular, config)
            .unwrap();
        assert!(decision.allowed);
    }

    #[test]
    fn classes_are_metered_separately() {
        let (tracker, _clock) = tracker();
        let identity = Identity::User(UserId::generate());
        let config = TierConfig::resolve(PlanId::Free);

        for _ in 0..config.raw.hourly {
            tracker
                .record_operation(&identity, OperationClass::Raw, 0, config)
                .unwrap();
        }

        assert!(!tracker
            .check_operation(&identity, OperationClass::Raw, config)
            .unwrap()
            .allowed);
        assert!(tracker
            .check_operation(&identity, OperationClass::Regular, config)
            .unwrap()
            .allowed);
    }

    #[test]
    fn report_includes_bandwidth() {
        let (tracker, _clock) = tracker();
        let identity = Identity::User(UserId::generate());
        let config = TierConfig::resolve(PlanId::Premium);

        tracker
            .record_operation(&identity, OperationClass::Regular, 1_000_000, config)
            .unwrap();

        let report = tracker.report(&identity, config).unwrap();
        assert_eq!(report.regular.monthly.used, 1);
        assert_eq!(report.regular.monthly.limit, config.regular.monthly);
        assert_eq!(report.raw.monthly.used, 0);
        assert_eq!(report.monthly_bytes, 1_000_000);
    }
}
