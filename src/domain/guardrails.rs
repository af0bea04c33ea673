use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::platform::{CampaignRef, PlatformId};

/// Thresholds the Guardrail Gate evaluates proposals against (§4.4, §6).
/// Loaded from configuration at startup and held immutably for the
/// process lifetime; an operator changes these by restarting with new
/// config, not by mutating a running instance, keeping every decision
/// within a tick reproducible from the same snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guardrails {
    pub confidence_threshold: f64,
    pub max_daily_adjustments: u32,
    pub max_budget_reallocation_fraction_per_day: Decimal,
    pub max_single_budget_increase_fraction: Decimal,
    pub min_campaign_runtime_hours_before_pause: i64,
    pub major_change_fraction: Decimal,
    /// Per-campaign overrides of the fields above, keyed by campaign. Only
    /// the fields present are overridden; everything else falls back to
    /// the top-level value.
    pub overrides: HashMap<CampaignRef, GuardrailOverride>,
    /// Per-platform ceiling on the sum of confirmed daily budgets across
    /// `ENABLED` campaigns (I3). Absent entries mean "no ceiling".
    pub platform_budget_ceilings: HashMap<PlatformId, Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GuardrailOverride {
    pub confidence_threshold: Option<f64>,
    pub max_daily_adjustments: Option<u32>,
    pub max_budget_reallocation_fraction_per_day: Option<Decimal>,
    pub max_single_budget_increase_fraction: Option<Decimal>,
    pub min_campaign_runtime_hours_before_pause: Option<i64>,
    pub major_change_fraction: Option<Decimal>,
}

impl Guardrails {
    pub fn confidence_threshold_for(&self, campaign_ref: &CampaignRef) -> f64 {
        self.overrides
            .get(campaign_ref)
            .and_then(|o| o.confidence_threshold)
            .unwrap_or(self.confidence_threshold)
    }

    pub fn max_daily_adjustments_for(&self, campaign_ref: &CampaignRef) -> u32 {
        self.overrides
            .get(campaign_ref)
            .and_then(|o| o.max_daily_adjustments)
            .unwrap_or(self.max_daily_adjustments)
    }

    pub fn max_single_budget_increase_fraction_for(&self, campaign_ref: &CampaignRef) -> Decimal {
        self.overrides
            .get(campaign_ref)
            .and_then(|o| o.max_single_budget_increase_fraction)
            .unwrap_or(self.max_single_budget_increase_fraction)
    }

    pub fn max_budget_reallocation_fraction_per_day_for(&self, campaign_ref: &CampaignRef) -> Decimal {
        self.overrides
            .get(campaign_ref)
            .and_then(|o| o.max_budget_reallocation_fraction_per_day)
            .unwrap_or(self.max_budget_reallocation_fraction_per_day)
    }

    pub fn min_campaign_runtime_hours_before_pause_for(&self, campaign_ref: &CampaignRef) -> i64 {
        self.overrides
            .get(campaign_ref)
            .and_then(|o| o.min_campaign_runtime_hours_before_pause)
            .unwrap_or(self.min_campaign_runtime_hours_before_pause)
    }

    pub fn major_change_fraction_for(&self, campaign_ref: &CampaignRef) -> Decimal {
        self.overrides
            .get(campaign_ref)
            .and_then(|o| o.major_change_fraction)
            .unwrap_or(self.major_change_fraction)
    }

    pub fn platform_budget_ceiling_for(&self, platform_id: &PlatformId) -> Option<Decimal> {
        self.platform_budget_ceilings.get(platform_id).copied()
    }
}

/// Per-campaign, per-day tallies the Guardrail Gate consults for rules R3
/// and R5 (§4.4). Reconstructed at startup by scanning the Action Ledger
/// back to local midnight (§4.5 recovery contract) rather than persisted
/// directly, so there is exactly one source of truth for "what happened
/// today".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyCounters {
    pub adjustments_made: u32,
    pub budget_reallocated_fraction: Decimal,
    /// Local midnight this counter set was accumulated since, in the
    /// configured timezone (§6 `timezone`).
    pub since: Option<DateTime<Utc>>,
}

impl DailyCounters {
    pub fn would_exceed_adjustment_cap(&self, cap: u32) -> bool {
        self.adjustments_made >= cap
    }

    pub fn would_exceed_reallocation_cap(&self, additional: Decimal, cap: Decimal) -> bool {
        self.budget_reallocated_fraction + additional > cap
    }
}
