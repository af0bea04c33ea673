use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::platform::CampaignRef;

/// One aggregated performance reading for a campaign over a tick's
/// collection window. Written exactly once by the Decision Engine at each
/// tick (§3); immutable afterwards; discovered by range scan on
/// `(campaign_ref, sample_time)`, never traversed from `Campaign`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub campaign_ref: CampaignRef,
    pub sample_time: DateTime<Utc>,
    pub impressions: u64,
    pub clicks: u64,
    /// Spend in the canonical currency's minor unit.
    pub spend: Decimal,
    pub conversions: u64,
    /// Revenue in the canonical currency's minor unit.
    pub revenue: Decimal,
    /// Set by the Metric Normaliser when this is the first sample ever
    /// observed for the campaign.
    pub newly_seen: bool,
    pub last_seen_at: DateTime<Utc>,
}

impl MetricSample {
    /// `revenue / spend`, 0 when spend is 0 (never infinity, never an
    /// error — §8 boundary behaviour).
    pub fn roas(&self) -> Decimal {
        ratio_or_zero(self.revenue, self.spend)
    }

    /// `spend / clicks`, 0 when clicks is 0.
    pub fn cpc(&self) -> Decimal {
        ratio_or_zero(self.spend, Decimal::from(self.clicks))
    }

    /// `clicks / impressions`, 0 when impressions is 0.
    pub fn ctr(&self) -> Decimal {
        ratio_or_zero(Decimal::from(self.clicks), Decimal::from(self.impressions))
    }

    /// `spend / conversions`, 0 when conversions is 0.
    pub fn cpa(&self) -> Decimal {
        ratio_or_zero(self.spend, Decimal::from(self.conversions))
    }
}

fn ratio_or_zero(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::PlatformId;

    fn sample(spend: i64, revenue: i64, clicks: u64, impressions: u64, conversions: u64) -> MetricSample {
        MetricSample {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            sample_time: Utc::now(),
            impressions,
            clicks,
            spend: Decimal::new(spend, 2),
            conversions,
            revenue: Decimal::new(revenue, 2),
            newly_seen: false,
            last_seen_at: Utc::now(),
        }
    }

    #[test]
    fn zero_spend_yields_zero_derived_metrics_not_infinity() {
        let s = sample(0, 0, 0, 0, 0);
        assert_eq!(s.roas(), Decimal::ZERO);
        assert_eq!(s.cpc(), Decimal::ZERO);
        assert_eq!(s.ctr(), Decimal::ZERO);
        assert_eq!(s.cpa(), Decimal::ZERO);
    }

    #[test]
    fn roas_is_revenue_over_spend() {
        let s = sample(10000, 48000, 500, 10000, 50);
        assert_eq!(s.roas(), Decimal::new(48, 1));
    }

    #[test]
    fn cpc_is_spend_over_clicks() {
        let s = sample(10000, 0, 500, 10000, 0);
        assert_eq!(s.cpc(), Decimal::new(20, 2));
    }
}
