//! Row structs for the append-only tables (§6, §10.4). Kept separate from
//! the domain types: a row is a storage-shaped fact, a domain type is what
//! the rest of the crate reasons about, and the repository is the only
//! place that converts between them.

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ActionRecordRow {
    pub id: String,
    pub platform_id: String,
    pub external_id: String,
    pub proposal_json: String,
    pub outcome_json: String,
    pub outcome_status: String,
    pub inputs_hash: String,
    pub budget_change_fraction: Option<String>,
    pub tick_id: String,
    pub recorded_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub platform_id: String,
    pub external_id: String,
    pub name: String,
    pub status: String,
    pub daily_budget: String,
    pub objective: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MetricSampleRow {
    pub platform_id: String,
    pub external_id: String,
    pub sample_time: String,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: String,
    pub conversions: i64,
    pub revenue: String,
    pub newly_seen: bool,
    pub last_seen_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ConfigHistoryRow {
    pub id: String,
    pub changed_at: String,
    pub operator: String,
    pub change_json: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct SystemEventRow {
    pub id: String,
    pub event_type: String,
    pub payload_json: String,
    pub recorded_at: String,
}
