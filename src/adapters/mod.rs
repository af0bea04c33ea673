//! One capability set over every ad platform, independent of native
//! protocol, units, or auth scheme (§4.1). Adapters are registered by
//! [`PlatformId`] and the Decision Engine never talks to a platform
//! directly — only through [`AdapterRegistry`].

mod auth;
mod mock;
mod rate_limit;
pub mod retry;

pub use auth::AuthRefresher;
pub use mock::MockAdapter;
pub use rate_limit::{RateLimitDecision, TokenBucket};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{Campaign, CampaignRef, CampaignStatus, CoreError, PlatformId, Result};
use crate::normalizer::RawMetric;

/// Health as reported by an adapter's own `health()` call. Never an `Err` —
/// a failing platform reports `Unavailable`, it does not propagate an
/// error up through `health()` itself (§4.1: "never throws").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterHealth {
    Ok,
    Degraded { reason: String },
    Unavailable { reason: String },
}

impl AdapterHealth {
    pub fn is_usable(&self) -> bool {
        !matches!(self, AdapterHealth::Unavailable { .. })
    }
}

/// The capability set every ad platform must present (§4.1's table).
/// Implementations own their own rate-limit bucket and auth-refresh state;
/// `CoreError` variants returned here are exactly the error taxonomy in §7.
#[async_trait]
pub trait AdPlatformAdapter: Send + Sync {
    fn platform_id(&self) -> PlatformId;

    /// Whether this instance is serving the §4.1 mock fixture rather than
    /// a live platform, surfaced so the Decision Engine can tag ledger
    /// rows and metrics accordingly.
    fn is_mock(&self) -> bool {
        false
    }

    /// Idempotent, read-only. `since` is an optional watermark; omitting
    /// it returns every campaign currently known to the platform.
    async fn list_campaigns(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Campaign>>;

    /// Aggregated per campaign over `range`; monotone in `range` (a wider
    /// range never omits a sample a narrower range would have returned).
    /// Returns raw readings, still in the platform's native currency — the
    /// [`crate::normalizer::MetricNormalizer`] converts and stamps
    /// `newly_seen`/`last_seen_at` (§4.2); this boundary only owns
    /// sub-unit-to-decimal conversion (§4.1's canonicalisation contract).
    async fn get_performance(
        &self,
        range: (DateTime<Utc>, DateTime<Utc>),
        ids: Option<&[String]>,
    ) -> Result<Vec<RawMetric>>;

    /// `new_daily_budget` is in the canonical currency; the adapter
    /// converts to the platform's native sub-unit internally. Returns only
    /// once the platform has confirmed the change.
    async fn update_budget(&self, campaign_ref: &CampaignRef, new_daily_budget: Decimal) -> Result<()>;

    async fn set_status(&self, campaign_ref: &CampaignRef, status: CampaignStatus) -> Result<()>;

    async fn health(&self) -> AdapterHealth;
}

/// Holds one adapter per platform and fans calls out to the right one.
/// Registration happens once at startup; lookups are by [`PlatformId`]
/// only, so the Decision Engine never needs to know which concrete
/// adapter type backs a platform.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<PlatformId, Arc<dyn AdPlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self { adapters: HashMap::new() }
    }

    pub fn register(&mut self, adapter: Arc<dyn AdPlatformAdapter>) {
        self.adapters.insert(adapter.platform_id(), adapter);
    }

    pub fn get(&self, platform_id: &PlatformId) -> Result<Arc<dyn AdPlatformAdapter>> {
        self.adapters
            .get(platform_id)
            .cloned()
            .ok_or_else(|| CoreError::internal(format!("no adapter registered for {platform_id}")))
    }

    pub fn platforms(&self) -> Vec<PlatformId> {
        self.adapters.keys().cloned().collect()
    }

    /// Health of every registered platform, in registration-order-agnostic
    /// form; a tick's COLLECTING phase excludes any platform that comes
    /// back `Unavailable` here rather than calling it and failing (§4.3).
    pub async fn health_check_all(&self) -> HashMap<PlatformId, AdapterHealth> {
        let mut out = HashMap::new();
        for (platform_id, adapter) in &self.adapters {
            out.insert(platform_id.clone(), adapter.health().await);
        }
        out
    }
}
