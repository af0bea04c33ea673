//! Folds heterogeneous raw adapter output into [`MetricSample`]s with
//! uniform semantics (§4.2). A pure function of adapter output plus an FX
//! table — it holds no state of its own, matching the per-tick data it's
//! handed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::MetricSample;

/// Daily FX table: canonical-currency-per-unit-of-native-currency, keyed
/// by ISO 4217 code. A rate of `1.0` for the canonical currency itself is
/// always implicitly present.
#[derive(Debug, Clone, Default)]
pub struct FxTable {
    rates: HashMap<String, Decimal>,
}

impl FxTable {
    pub fn new(rates: HashMap<String, Decimal>) -> Self {
        Self { rates }
    }

    pub fn rate_for(&self, currency: &str) -> Decimal {
        self.rates.get(currency).copied().unwrap_or(Decimal::ONE)
    }
}

/// One adapter's raw reading for a campaign before currency conversion and
/// `last_seen_at`/`newly_seen` bookkeeping are applied.
#[derive(Debug, Clone)]
pub struct RawMetric {
    pub campaign_ref: crate::domain::CampaignRef,
    pub sample_time: DateTime<Utc>,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: Decimal,
    pub conversions: u64,
    pub revenue: Decimal,
    pub currency: String,
}

/// Tracks, per campaign, the last time a sample was observed — the only
/// state the Metric Normaliser threads across ticks, and it's owned by the
/// caller (the Decision Engine), not by the normaliser itself.
pub struct MetricNormalizer {
    fx_table: FxTable,
}

impl MetricNormalizer {
    pub fn new(fx_table: FxTable) -> Self {
        Self { fx_table }
    }

    /// Converts `raw` into a canonical `MetricSample`. `previously_seen`
    /// should be `true` iff this campaign has appeared in a prior sample;
    /// the normaliser does not consult storage itself.
    pub fn normalize(
        &self,
        raw: RawMetric,
        previously_seen: bool,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> MetricSample {
        let rate = self.fx_table.rate_for(&raw.currency);
        MetricSample {
            campaign_ref: raw.campaign_ref,
            sample_time: raw.sample_time,
            impressions: raw.impressions,
            clicks: raw.clicks,
            spend: raw.spend * rate,
            conversions: raw.conversions,
            revenue: raw.revenue * rate,
            newly_seen: !previously_seen,
            last_seen_at: last_seen_at.unwrap_or(raw.sample_time),
        }
    }

    pub fn normalize_all(
        &self,
        raw_metrics: Vec<RawMetric>,
        previously_seen: impl Fn(&crate::domain::CampaignRef) -> bool,
        last_seen_at: impl Fn(&crate::domain::CampaignRef) -> Option<DateTime<Utc>>,
    ) -> Vec<MetricSample> {
        raw_metrics
            .into_iter()
            .map(|raw| {
                let seen = previously_seen(&raw.campaign_ref);
                let last_seen = last_seen_at(&raw.campaign_ref);
                self.normalize(raw, seen, last_seen)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignRef, PlatformId};

    fn raw(currency: &str) -> RawMetric {
        RawMetric {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            sample_time: Utc::now(),
            impressions: 1000,
            clicks: 50,
            spend: Decimal::new(10000, 2),
            conversions: 5,
            revenue: Decimal::new(48000, 2),
            currency: currency.to_string(),
        }
    }

    #[test]
    fn unknown_currency_passes_through_unconverted() {
        let normalizer = MetricNormalizer::new(FxTable::default());
        let sample = normalizer.normalize(raw("USD"), true, None);
        assert_eq!(sample.spend, Decimal::new(10000, 2));
    }

    #[test]
    fn known_currency_is_converted_against_the_fx_table() {
        let mut rates = HashMap::new();
        rates.insert("EUR".to_string(), Decimal::new(108, 2));
        let normalizer = MetricNormalizer::new(FxTable::new(rates));
        let sample = normalizer.normalize(raw("EUR"), true, None);
        assert_eq!(sample.spend, Decimal::new(10000, 2) * Decimal::new(108, 2));
    }

    #[test]
    fn first_observation_is_marked_newly_seen() {
        let normalizer = MetricNormalizer::new(FxTable::default());
        let sample = normalizer.normalize(raw("USD"), false, None);
        assert!(sample.newly_seen);
    }

    #[test]
    fn last_seen_at_falls_back_to_sample_time_when_absent() {
        let normalizer = MetricNormalizer::new(FxTable::default());
        let r = raw("USD");
        let sample_time = r.sample_time;
        let sample = normalizer.normalize(r, true, None);
        assert_eq!(sample.last_seen_at, sample_time);
    }
}
