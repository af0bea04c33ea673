use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one of the ad platforms the Adapter Registry fronts.
///
/// The set is open at the edges (`Custom`) so a new platform can be wired
/// in without a breaking change to every call site that matches on it, but
/// closed enough that the well-known platforms get exhaustive handling
/// where it matters (canonicalisation, default rate-limit tuning).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlatformId {
    GoogleAds,
    MetaAds,
    TiktokAds,
    LinkedinAds,
    Custom(String),
}

impl PlatformId {
    pub fn as_str(&self) -> &str {
        match self {
            PlatformId::GoogleAds => "google_ads",
            PlatformId::MetaAds => "meta_ads",
            PlatformId::TiktokAds => "tiktok_ads",
            PlatformId::LinkedinAds => "linkedin_ads",
            PlatformId::Custom(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "google_ads" => PlatformId::GoogleAds,
            "meta_ads" => PlatformId::MetaAds,
            "tiktok_ads" => PlatformId::TiktokAds,
            "linkedin_ads" => PlatformId::LinkedinAds,
            other => PlatformId::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compound identity of a campaign: unique within a platform, stable across
/// the campaign's lifetime. `MetricSample` and `Proposal` reference
/// campaigns only by this key — there is deliberately no back-pointer from
/// a campaign to its samples (they are found by range scan, per §9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CampaignRef {
    pub platform_id: PlatformId,
    pub external_id: String,
}

impl CampaignRef {
    pub fn new(platform_id: PlatformId, external_id: impl Into<String>) -> Self {
        Self { platform_id, external_id: external_id.into() }
    }
}

impl fmt::Display for CampaignRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform_id, self.external_id)
    }
}
