//! Speaks the analyst's request/response protocol and translates to/from
//! domain types (§4.6). Stateless: every call is a fresh POST with its own
//! inputs hash, so retries are always safe.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{Campaign, CampaignRef, CampaignStatus, CoreError, Guardrails, MetricSample, Proposal, Result};

/// One campaign's worth of input to the analyst: its confirmed state, the
/// sample just collected this tick, and a bounded trailing window (§4.3
/// step 3's "last 7 days").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub campaign: Campaign,
    pub current_sample: MetricSample,
    pub trailing_window: Vec<MetricSample>,
}

/// The structured request sent to the LLM Analyst: current state, trailing
/// window, guardrail configuration, and already-pending proposals (§4.6).
/// Keyed by [`AnalysisRequest::inputs_hash`] so a retried tick with
/// identical inputs is detectable before it reaches the analyst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub tick_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub campaigns: Vec<CampaignSnapshot>,
    pub guardrails: Guardrails,
    pub pending_proposals: Vec<Proposal>,
}

/// Bookkeeping-only view of a [`Campaign`] for fingerprinting: the
/// confirmed state an analyst decision actually depends on, without
/// `created_at`/`updated_at` — stamps that move on every adapter read-back
/// even when nothing an analyst would act on has changed.
#[derive(Serialize)]
struct FingerprintedCampaign<'a> {
    campaign_ref: &'a CampaignRef,
    name: &'a str,
    status: CampaignStatus,
    daily_budget: Decimal,
    objective: &'a str,
}

/// Bookkeeping-only view of a [`MetricSample`] for fingerprinting: the
/// measured values, without `sample_time`/`last_seen_at`/`newly_seen` —
/// collection-time stamps that the Metric Normaliser sets fresh on every
/// tick even when the underlying reading is unchanged (§4.2).
#[derive(Serialize)]
struct FingerprintedSample<'a> {
    campaign_ref: &'a CampaignRef,
    impressions: u64,
    clicks: u64,
    spend: Decimal,
    conversions: u64,
    revenue: Decimal,
}

fn fingerprint_campaign(campaign: &Campaign) -> FingerprintedCampaign<'_> {
    FingerprintedCampaign {
        campaign_ref: &campaign.campaign_ref,
        name: &campaign.name,
        status: campaign.status,
        daily_budget: campaign.daily_budget,
        objective: &campaign.objective,
    }
}

fn fingerprint_sample(sample: &MetricSample) -> FingerprintedSample<'_> {
    FingerprintedSample {
        campaign_ref: &sample.campaign_ref,
        impressions: sample.impressions,
        clicks: sample.clicks,
        spend: sample.spend,
        conversions: sample.conversions,
        revenue: sample.revenue,
    }
}

#[derive(Serialize)]
struct FingerprintedSnapshot<'a> {
    campaign: FingerprintedCampaign<'a>,
    current_sample: FingerprintedSample<'a>,
    trailing_window: Vec<FingerprintedSample<'a>>,
}

impl AnalysisRequest {
    /// SHA-256 hex digest over the canonical JSON of everything that
    /// determines the analyst's output: campaign state, measured values,
    /// guardrail configuration, and pending proposals.
    ///
    /// Deliberately excludes `tick_id`/`generated_at` — two ticks with the
    /// same campaign state should fingerprint identically even though
    /// their ids differ — and, within each [`CampaignSnapshot`], the
    /// collection-time stamps (`Campaign::created_at`/`updated_at`,
    /// `MetricSample::sample_time`/`last_seen_at`/`newly_seen`) that the
    /// Adapter Registry and Metric Normaliser stamp fresh on every read
    /// even when the underlying state and readings haven't moved. Hashing
    /// those in would make every retried tick fingerprint uniquely and
    /// defeat the dedup this hash exists for (§4.3 step 3).
    pub fn inputs_hash(&self) -> String {
        #[derive(Serialize)]
        struct Fingerprinted<'a> {
            campaigns: Vec<FingerprintedSnapshot<'a>>,
            guardrails: &'a Guardrails,
            pending_proposals: &'a [Proposal],
        }
        let campaigns = self
            .campaigns
            .iter()
            .map(|s| FingerprintedSnapshot {
                campaign: fingerprint_campaign(&s.campaign),
                current_sample: fingerprint_sample(&s.current_sample),
                trailing_window: s.trailing_window.iter().map(fingerprint_sample).collect(),
            })
            .collect();
        let fingerprinted = Fingerprinted { campaigns, guardrails: &self.guardrails, pending_proposals: &self.pending_proposals };
        let bytes = serde_json::to_vec(&fingerprinted).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

/// The fixed response schema (§4.6): zero or more proposals plus a
/// tick-wide health signal. Unknown fields are ignored by `serde_json`'s
/// default behaviour; a missing required field fails deserialization,
/// which the client surfaces as `AnalystMalformed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub proposals: Vec<Proposal>,
    pub overall_health: OverallHealth,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

#[async_trait]
pub trait LlmAnalystClient: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;
}

/// Production client: a single POST per request, a hard timeout, and
/// strict response validation. The analyst's prompt text and model choice
/// are entirely its own concern — this client only speaks the wire
/// contract.
pub struct HttpLlmAnalystClient {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpLlmAnalystClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::internal(format!("failed to build analyst http client: {e}")))?;
        Ok(Self { http_client, endpoint: endpoint.into(), timeout })
    }
}

#[async_trait]
impl LlmAnalystClient for HttpLlmAnalystClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let send = self.http_client.post(&self.endpoint).json(request).send();
        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(CoreError::Transient { platform: "llm_analyst".into(), message: e.to_string() }),
            Err(_) => return Err(CoreError::AnalystTimeout(self.timeout)),
        };

        if !response.status().is_success() {
            return Err(CoreError::AnalystMalformed(format!("analyst returned status {}", response.status())));
        }

        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| CoreError::AnalystTimeout(self.timeout))?
            .map_err(|e| CoreError::AnalystMalformed(format!("failed to read analyst response body: {e}")))?;

        serde_json::from_str(&body).map_err(|e| CoreError::AnalystMalformed(format!("analyst response did not match the expected schema: {e}")))
    }
}

/// Deterministic fixture for tests and mock-mode runs: returns whatever
/// `AnalysisResponse` it was constructed with, regardless of the request.
pub struct MockLlmAnalystClient {
    response: AnalysisResponse,
}

impl MockLlmAnalystClient {
    pub fn new(response: AnalysisResponse) -> Self {
        Self { response }
    }

    pub fn empty() -> Self {
        Self { response: AnalysisResponse { proposals: Vec::new(), overall_health: OverallHealth::Good } }
    }
}

#[async_trait]
impl LlmAnalystClient for MockLlmAnalystClient {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisResponse> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignRef, CampaignStatus, PlatformId};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn campaign() -> Campaign {
        Campaign {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            name: "test".to_string(),
            status: CampaignStatus::Enabled,
            daily_budget: Decimal::new(10000, 2),
            objective: "conversions".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample() -> MetricSample {
        MetricSample {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            sample_time: Utc::now(),
            impressions: 1000,
            clicks: 50,
            spend: Decimal::new(10000, 2),
            conversions: 5,
            revenue: Decimal::new(48000, 2),
            newly_seen: false,
            last_seen_at: Utc::now(),
        }
    }

    fn guardrails() -> Guardrails {
        Guardrails {
            confidence_threshold: 0.85,
            max_daily_adjustments: 5,
            max_budget_reallocation_fraction_per_day: Decimal::new(25, 2),
            max_single_budget_increase_fraction: Decimal::new(50, 2),
            min_campaign_runtime_hours_before_pause: 72,
            major_change_fraction: Decimal::new(20, 2),
            overrides: HashMap::new(),
            platform_budget_ceilings: HashMap::new(),
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            tick_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            campaigns: vec![CampaignSnapshot { campaign: campaign(), current_sample: sample(), trailing_window: vec![] }],
            guardrails: guardrails(),
            pending_proposals: vec![],
        }
    }

    #[test]
    fn inputs_hash_is_stable_across_tick_id_and_timestamp() {
        let mut a = request();
        let mut b = request();
        a.tick_id = Uuid::new_v4();
        b.tick_id = Uuid::new_v4();
        a.generated_at = Utc::now();
        b.generated_at = a.generated_at + chrono::Duration::minutes(15);
        assert_eq!(a.inputs_hash(), b.inputs_hash());
    }

    #[test]
    fn inputs_hash_changes_when_campaign_state_changes() {
        let a = request();
        let mut b = request();
        b.campaigns[0].current_sample.spend = Decimal::new(99999, 2);
        assert_ne!(a.inputs_hash(), b.inputs_hash());
    }

    /// A retried tick re-collects from the adapter, which stamps a fresh
    /// `sample_time`/`last_seen_at`/`Campaign::updated_at` even when the
    /// underlying reading hasn't moved. The hash must still match, or
    /// replay-detection (§4.3 step 3) never fires in practice.
    #[test]
    fn inputs_hash_is_stable_across_a_retry_that_re_stamps_collection_timestamps() {
        let a = request();
        let mut b = request();
        let later = Utc::now() + chrono::Duration::seconds(5);
        b.campaigns[0].current_sample.sample_time = later;
        b.campaigns[0].current_sample.last_seen_at = later;
        b.campaigns[0].campaign.updated_at = later;
        assert_eq!(a.inputs_hash(), b.inputs_hash());
    }

    #[tokio::test]
    async fn mock_client_returns_the_configured_response_regardless_of_request() {
        let client = MockLlmAnalystClient::empty();
        let response = client.analyze(&request()).await.unwrap();
        assert_eq!(response.overall_health, OverallHealth::Good);
        assert!(response.proposals.is_empty());
    }
}
