//! Deterministic in-memory fixture served when credentials are absent, so
//! the Decision Engine can be exercised end-to-end with no external
//! dependency (§4.1).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{Campaign, CampaignRef, CampaignStatus, CoreError, PlatformId, Result};
use crate::normalizer::RawMetric;

use super::{AdPlatformAdapter, AdapterHealth};

struct FixtureCampaign {
    campaign: Campaign,
    trailing_roas: Decimal,
}

pub struct MockAdapter {
    platform_id: PlatformId,
    campaigns: Mutex<HashMap<String, FixtureCampaign>>,
}

impl MockAdapter {
    pub fn new(platform_id: PlatformId) -> Self {
        let seeded_at = Utc::now() - chrono::Duration::days(10);
        let mut campaigns = HashMap::new();
        campaigns.insert(
            "FIXTURE-1".to_string(),
            FixtureCampaign {
                campaign: Campaign {
                    campaign_ref: CampaignRef::new(platform_id.clone(), "FIXTURE-1"),
                    name: format!("{} mock campaign", platform_id.as_str()),
                    status: CampaignStatus::Enabled,
                    daily_budget: Decimal::new(10000, 2),
                    objective: "conversions".to_string(),
                    created_at: seeded_at,
                    updated_at: seeded_at,
                },
                trailing_roas: Decimal::new(32, 1),
            },
        );
        Self { platform_id, campaigns: Mutex::new(campaigns) }
    }

    fn campaigns_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FixtureCampaign>> {
        self.campaigns.lock().expect("mock adapter mutex poisoned")
    }
}

#[async_trait]
impl AdPlatformAdapter for MockAdapter {
    fn platform_id(&self) -> PlatformId {
        self.platform_id.clone()
    }

    fn is_mock(&self) -> bool {
        true
    }

    async fn list_campaigns(&self, _since: Option<DateTime<Utc>>) -> Result<Vec<Campaign>> {
        Ok(self.campaigns_lock().values().map(|f| f.campaign.clone()).collect())
    }

    async fn get_performance(
        &self,
        range: (DateTime<Utc>, DateTime<Utc>),
        ids: Option<&[String]>,
    ) -> Result<Vec<RawMetric>> {
        let campaigns = self.campaigns_lock();
        // Stamped from the end of the requested range, not wall-clock
        // `now()`: §4.1 requires `get_performance` be idempotent, so a
        // retried call against the same `range` must return the same
        // reading, timestamp included.
        let sample_time = range.1;
        Ok(campaigns
            .values()
            .filter(|f| ids.map_or(true, |ids| ids.iter().any(|id| id == &f.campaign.campaign_ref.external_id)))
            .map(|f| {
                let spend = f.campaign.daily_budget;
                let revenue = spend * f.trailing_roas;
                RawMetric {
                    campaign_ref: f.campaign.campaign_ref.clone(),
                    sample_time,
                    impressions: 10_000,
                    clicks: 500,
                    spend,
                    conversions: 50,
                    revenue,
                    currency: "USD".to_string(),
                }
            })
            .collect())
    }

    async fn update_budget(&self, campaign_ref: &CampaignRef, new_daily_budget: Decimal) -> Result<()> {
        let mut campaigns = self.campaigns_lock();
        let fixture = campaigns
            .get_mut(&campaign_ref.external_id)
            .ok_or_else(|| CoreError::NotFound(campaign_ref.clone()))?;
        fixture.campaign.daily_budget = new_daily_budget;
        fixture.campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn set_status(&self, campaign_ref: &CampaignRef, status: CampaignStatus) -> Result<()> {
        let mut campaigns = self.campaigns_lock();
        let fixture = campaigns
            .get_mut(&campaign_ref.external_id)
            .ok_or_else(|| CoreError::NotFound(campaign_ref.clone()))?;
        fixture.campaign.status = status;
        fixture.campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn health(&self) -> AdapterHealth {
        AdapterHealth::Ok
    }
}
