use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::platform::CampaignRef;

/// Confirmed platform state of a campaign, as last read back from its
/// adapter. Owned exclusively by the Adapter Registry (§3): inserts happen
/// on first sight, updates happen only after a confirmed status/budget
/// change, and campaigns are never deleted — only transitioned to
/// `Removed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub campaign_ref: CampaignRef,
    pub name: String,
    pub status: CampaignStatus,
    /// Daily budget in the canonical currency's minor unit (e.g. cents).
    pub daily_budget: Decimal,
    pub objective: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CampaignStatus {
    Enabled,
    Paused,
    Removed,
}

impl Campaign {
    /// Age at `now`, used by guardrail rule R2 (§4.4) and invariant I6.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    pub fn is_enabled(&self) -> bool {
        self.status == CampaignStatus::Enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::PlatformId;

    fn sample_campaign(created_at: DateTime<Utc>) -> Campaign {
        Campaign {
            campaign_ref: CampaignRef::new(PlatformId::TiktokAds, "T1"),
            name: "test".to_string(),
            status: CampaignStatus::Enabled,
            daily_budget: Decimal::new(10000, 2),
            objective: "conversions".to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn age_is_measured_from_created_at() {
        let created = Utc::now() - chrono::Duration::hours(40);
        let campaign = sample_campaign(created);
        let age = campaign.age(Utc::now());
        assert!(age >= chrono::Duration::hours(39) && age <= chrono::Duration::hours(41));
    }
}
