//! Subscription tiers and plan limits.
//!
//! Tier configurations are static and immutable: one fixed table, built into
//! the binary, resolved by plan identifier at request time. The web plans
//! (free/premium/enterprise) gate the browser product; the API tiers
//! (starter/professional/enterprise) additionally carry a per-minute rate
//! limit and a payment requirement.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::usage::{OperationClass, Window};

// ============================================================================
// Plans
// ============================================================================

/// A named subscription level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    /// Free web plan.
    Free,
    /// Premium web plan.
    Premium,
    /// Enterprise web plan.
    Enterprise,
    /// API starter tier.
    ApiStarter,
    /// API professional tier.
    ApiProfessional,
    /// API enterprise tier.
    ApiEnterprise,
}

impl PlanId {
    /// Parse a plan identifier from its wire string.
    ///
    /// Returns `None` for unknown identifiers rather than defaulting, so
    /// callers can distinguish "no plan" from "bad plan".
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "premium" => Some(Self::Premium),
            "enterprise" => Some(Self::Enterprise),
            "starter" | "api-starter" => Some(Self::ApiStarter),
            "professional" | "api-professional" => Some(Self::ApiProfessional),
            "api-enterprise" => Some(Self::ApiEnterprise),
            _ => None,
        }
    }

    /// The wire string for this plan.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
            Self::ApiStarter => "starter",
            Self::ApiProfessional => "professional",
            Self::ApiEnterprise => "api-enterprise",
        }
    }

    /// Human-readable plan name for display headers.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Premium => "Premium",
            Self::Enterprise => "Enterprise",
            Self::ApiStarter => "API Starter",
            Self::ApiProfessional => "API Professional",
            Self::ApiEnterprise => "API Enterprise",
        }
    }

    /// The next tier up within the same family, if any. Used for upgrade
    /// recommendations in quota denials.
    #[must_use]
    pub const fn next_tier(&self) -> Option<Self> {
        match self {
            Self::Free => Some(Self::Premium),
            Self::Premium => Some(Self::Enterprise),
            Self::ApiStarter => Some(Self::ApiProfessional),
            Self::ApiProfessional => Some(Self::ApiEnterprise),
            Self::Enterprise | Self::ApiEnterprise => None,
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gated capability bundled into a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierFeature {
    /// RAW camera format processing.
    RawProcessing,
    /// Multi-file batch operations.
    BatchProcessing,
    /// Priority placement in the processing queue.
    PriorityQueue,
    /// Job-completion webhooks.
    Webhooks,
}

impl TierFeature {
    /// The feature as a lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RawProcessing => "raw",
            Self::BatchProcessing => "batch",
            Self::PriorityQueue => "priority",
            Self::Webhooks => "webhooks",
        }
    }
}

impl fmt::Display for TierFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Limits
// ============================================================================

/// Per-window operation limits for one operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Operations per hour.
    pub hourly: u64,
    /// Operations per day.
    pub daily: u64,
    /// Operations per month.
    pub monthly: u64,
}

impl TierLimits {
    /// The limit for a window.
    #[must_use]
    pub const fn limit(&self, window: Window) -> u64 {
        match window {
            Window::Hourly => self.hourly,
            Window::Daily => self.daily,
            Window::Monthly => self.monthly,
        }
    }
}

/// A static limits/permissions record for one plan.
///
/// Created once as part of the fixed table below; never mutated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierConfig {
    /// The plan this configuration belongs to.
    pub plan: PlanId,
    /// Limits for regular operations.
    pub regular: TierLimits,
    /// Limits for RAW-format operations.
    pub raw: TierLimits,
    /// Maximum requests per minute on the API surface.
    pub rate_per_minute: u32,
    /// Monthly bandwidth allowance in bytes.
    pub monthly_bandwidth_bytes: u64,
    /// Capabilities bundled into the tier.
    pub features: &'static [TierFeature],
    /// Whether the tier is only usable with an active paid subscription.
    pub requires_payment: bool,
}

const GIB: u64 = 1024 * 1024 * 1024;

static FREE: TierConfig = TierConfig {
    plan: PlanId::Free,
    regular: TierLimits { hourly: 20, daily: 100, monthly: 500 },
    raw: TierLimits { hourly: 5, daily: 20, monthly: 50 },
    rate_per_minute: 5,
    monthly_bandwidth_bytes: GIB,
    features: &[],
    requires_payment: false,
};

static PREMIUM: TierConfig = TierConfig {
    plan: PlanId::Premium,
    regular: TierLimits { hourly: 200, daily: 1_000, monthly: 10_000 },
    raw: TierLimits { hourly: 50, daily: 250, monthly: 2_500 },
    rate_per_minute: 30,
    monthly_bandwidth_bytes: 25 * GIB,
    features: &[TierFeature::RawProcessing, TierFeature::BatchProcessing],
    requires_payment: true,
};

static ENTERPRISE: TierConfig = TierConfig {
    plan: PlanId::Enterprise,
    regular: TierLimits { hourly: 1_000, daily: 10_000, monthly: 100_000 },
    raw: TierLimits { hourly: 500, daily: 5_000, monthly: 50_000 },
    rate_per_minute: 120,
    monthly_bandwidth_bytes: 250 * GIB,
    features: &[
        TierFeature::RawProcessing,
        TierFeature::BatchProcessing,
        TierFeature::PriorityQueue,
        TierFeature::Webhooks,
    ],
    requires_payment: true,
};

static API_STARTER: TierConfig = TierConfig {
    plan: PlanId::ApiStarter,
    regular: TierLimits { hourly: 50, daily: 500, monthly: 5_000 },
    raw: TierLimits { hourly: 10, daily: 100, monthly: 1_000 },
    rate_per_minute: 10,
    monthly_bandwidth_bytes: 10 * GIB,
    features: &[],
    requires_payment: false,
};

static API_PROFESSIONAL: TierConfig = TierConfig {
    plan: PlanId::ApiProfessional,
    regular: TierLimits { hourly: 300, daily: 3_000, monthly: 50_000 },
    raw: TierLimits { hourly: 100, daily: 1_000, monthly: 10_000 },
    rate_per_minute: 60,
    monthly_bandwidth_bytes: 100 * GIB,
    features: &[
        TierFeature::RawProcessing,
        TierFeature::BatchProcessing,
        TierFeature::Webhooks,
    ],
    requires_payment: true,
};

static API_ENTERPRISE: TierConfig = TierConfig {
    plan: PlanId::ApiEnterprise,
    regular: TierLimits { hourly: 1_000, daily: 20_000, monthly: 500_000 },
    raw: TierLimits { hourly: 500, daily: 10_000, monthly: 100_000 },
    rate_per_minute: 300,
    monthly_bandwidth_bytes: 1024 * GIB,
    features: &[
        TierFeature::RawProcessing,
        TierFeature::BatchProcessing,
        TierFeature::PriorityQueue,
        TierFeature::Webhooks,
    ],
    requires_payment: true,
};

impl TierConfig {
    /// The configuration for a plan.
    #[must_use]
    pub const fn resolve(plan: PlanId) -> &'static Self {
        match plan {
            PlanId::Free => &FREE,
            PlanId::Premium => &PREMIUM,
            PlanId::Enterprise => &ENTERPRISE,
            PlanId::ApiStarter => &API_STARTER,
            PlanId::ApiProfessional => &API_PROFESSIONAL,
            PlanId::ApiEnterprise => &API_ENTERPRISE,
        }
    }

    /// Resolve a plan from its wire string; `None` for unknown plans.
    #[must_use]
    pub fn resolve_str(s: &str) -> Option<&'static Self> {
        PlanId::parse(s).map(Self::resolve)
    }

    /// The limits for an operation class.
    #[must_use]
    pub const fn limits(&self, class: OperationClass) -> &TierLimits {
        match class {
            OperationClass::Regular => &self.regular,
            OperationClass::Raw => &self.raw,
        }
    }

    /// Whether this tier bundles `feature`.
    #[must_use]
    pub fn has_feature(&self, feature: TierFeature) -> bool {
        self.features.contains(&feature)
    }
}

// ============================================================================
// Access validation
// ============================================================================

/// The outcome of tier-level access validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Why it was denied, when it was.
    pub reason: Option<String>,
    /// The tier that would lift the denial, when one exists.
    pub upgrade_required: Option<PlanId>,
}

impl AccessDecision {
    const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            upgrade_required: None,
        }
    }

    fn deny(reason: impl Into<String>, upgrade: Option<PlanId>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            upgrade_required: upgrade,
        }
    }
}

/// Validate tier-level access for a request: denies when monthly usage has
/// reached the plan's monthly limit or the caller's current request rate has
/// reached the per-minute limit.
#[must_use]
pub fn validate_access(config: &TierConfig, monthly_used: u64, current_rate: u32) -> AccessDecision {
    if monthly_used >= config.regular.monthly {
        return AccessDecision::deny("monthly limit reached", config.plan.next_tier());
    }
    if current_rate >= config.rate_per_minute {
        return AccessDecision::deny("rate limit exceeded", config.plan.next_tier());
    }
    AccessDecision::allow()
}

/// The tier that unlocks `feature`: the lowest tier in the static table that
/// bundles it on the API surface.
#[must_use]
pub const fn upgrade_for_feature(feature: TierFeature) -> PlanId {
    match feature {
        TierFeature::RawProcessing | TierFeature::BatchProcessing | TierFeature::Webhooks => {
            PlanId::ApiProfessional
        }
        TierFeature::PriorityQueue => PlanId::ApiEnterprise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for plan in [
            PlanId::Free,
            PlanId::Premium,
            PlanId::Enterprise,
            PlanId::ApiStarter,
            PlanId::ApiProfessional,
            PlanId::ApiEnterprise,
        ] {
            assert_eq!(PlanId::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(PlanId::parse("platinum"), None);
    }

    #[test]
    fn resolve_str_unknown_is_none() {
        assert!(TierConfig::resolve_str("free").is_some());
        assert!(TierConfig::resolve_str("not-a-plan").is_none());
    }

    #[test]
    fn free_plan_monthly_regular_limit() {
        let config = TierConfig::resolve(PlanId::Free);
        assert_eq!(config.regular.monthly, 500);
        assert_eq!(config.regular.limit(crate::Window::Monthly), 500);
    }

    #[test]
    fn starter_lacks_batch() {
        let starter = TierConfig::resolve(PlanId::ApiStarter);
        assert!(!starter.has_feature(TierFeature::BatchProcessing));
        assert_eq!(
            upgrade_for_feature(TierFeature::BatchProcessing),
            PlanId::ApiProfessional
        );
        assert_eq!(upgrade_for_feature(TierFeature::BatchProcessing).as_str(), "professional");
    }

    #[test]
    fn validate_access_denies_exhausted_monthly() {
        let config = TierConfig::resolve(PlanId::Free);
        let decision = validate_access(config, 500, 0);
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("monthly limit reached"));
        assert_eq!(decision.upgrade_required, Some(PlanId::Premium));
    }

    #[test]
    fn validate_access_denies_rate() {
        let config = TierConfig::resolve(PlanId::ApiStarter);
        let decision = validate_access(config, 0, config.rate_per_minute);
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("rate limit exceeded"));
    }

    #[test]
    fn validate_access_allows_headroom() {
        let config = TierConfig::resolve(PlanId::ApiProfessional);
        let decision = validate_access(config, 10, 1);
        assert!(decision.allowed);
        assert!(decision.reason.is_none());
    }
}
