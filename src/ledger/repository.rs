//! Repository traits fronting the Action Ledger and campaign cache, so the
//! Decision Engine and Guardrail Gate never see SQL (§10.4). SQLite is the
//! default backend; Postgres is feature-gated behind the same trait.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    ActionOutcome, ActionRecord, Campaign, CampaignRef, CampaignStatus, CoreError, DailyCounters,
    LedgerEvent, MetricSample, PlatformId, Proposal, Result,
};

use super::models::{ActionRecordRow, CampaignRow, ConfigHistoryRow, MetricSampleRow, SystemEventRow};

#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Appends one record. Ledger rows are never updated or deleted once
    /// written (§4.5).
    async fn append(&self, record: &ActionRecord) -> Result<()>;

    async fn get_recent_actions(&self, campaign_ref: Option<&CampaignRef>, limit: u32) -> Result<Vec<ActionRecord>>;

    /// Records with a given [`ActionOutcome`] tag since `since`, newest
    /// first — the `(decision.outcome, time)` range scan §4.5 requires
    /// alongside the campaign/time one `get_recent_actions` covers.
    async fn get_actions_by_outcome(&self, outcome_status: &str, since: DateTime<Utc>, limit: u32) -> Result<Vec<ActionRecord>>;

    /// Every record written at or after `since`, used to reconstruct
    /// [`DailyCounters`] at startup rather than persisting them directly
    /// (§4.5 recovery contract).
    async fn scan_since(&self, since: DateTime<Utc>) -> Result<Vec<ActionRecord>>;

    async fn find_by_inputs_hash(&self, inputs_hash: &str) -> Result<Option<ActionRecord>>;

    async fn append_metric_sample(&self, sample: &MetricSample) -> Result<()>;

    /// Samples for one campaign over `range`, ascending by `sample_time` —
    /// the trailing window the Decision Engine hands the LLM Analyst
    /// alongside each tick's current sample (§4.3 step 3).
    async fn get_samples(
        &self,
        campaign_ref: &CampaignRef,
        range: (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<Vec<MetricSample>>;

    /// The most recent sample recorded for a campaign before this tick, if
    /// any — the Metric Normaliser's only cross-tick state (§4.2
    /// `newly_seen`/`last_seen_at`), read back from the ledger instead of
    /// being tracked in memory so a cold start reconstructs it for free.
    async fn latest_sample(&self, campaign_ref: &CampaignRef) -> Result<Option<MetricSample>>;

    /// Durably records a guardrail or config change, independent of the
    /// `emit_ledger_event` tracing side channel — the `config_history` row
    /// is the fact an operator can audit later, the tracing event is only
    /// a live notification (§3: config changes are recorded, not just
    /// logged).
    async fn record_config_change(&self, operator: &str, change_json: &str) -> Result<()>;

    /// Most recent config changes, newest first — the read side of
    /// [`LedgerRepository::record_config_change`], surfaced by the CLI's
    /// audit command.
    async fn get_config_history(&self, limit: u32) -> Result<Vec<ConfigHistoryRow>>;

    /// Durably persists a tick-lifecycle or ledger event — `TICK_FAILED`,
    /// `TICK_SKIPPED`, `PLATFORM_EXCLUDED`, and the rest of
    /// [`LedgerEvent`] — to `system_events`, independent of the
    /// `emit_ledger_event` tracing side channel (§4.3, §8 scenario 5, §7
    /// "no silent failures"). Called by [`super::emit_ledger_event`]
    /// rather than directly, so every event gets both a trace line and a
    /// durable row from one call site.
    async fn record_event(&self, event: &LedgerEvent) -> Result<()>;

    /// Most recent persisted events, newest first.
    async fn get_recent_events(&self, limit: u32) -> Result<Vec<LedgerEvent>>;
}

#[async_trait::async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn upsert(&self, campaign: &Campaign) -> Result<()>;
    async fn get(&self, campaign_ref: &CampaignRef) -> Result<Option<Campaign>>;
    async fn list_all(&self) -> Result<Vec<Campaign>>;
    async fn list_by_platform(&self, platform_id: &PlatformId) -> Result<Vec<Campaign>>;
}

#[derive(Clone)]
pub struct SqliteLedgerRepository {
    pool: SqlitePool,
}

impl SqliteLedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LedgerRepository for SqliteLedgerRepository {
    #[instrument(skip(self, record), fields(campaign_ref = %record.campaign_ref))]
    async fn append(&self, record: &ActionRecord) -> Result<()> {
        let proposal_json = serde_json::to_string(&record.proposal)?;
        let outcome_json = serde_json::to_string(&record.outcome)?;
        sqlx::query(
            r#"
            INSERT INTO action_ledger (
                id, platform_id, external_id, proposal_json, outcome_json, outcome_status,
                inputs_hash, budget_change_fraction, tick_id, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.campaign_ref.platform_id.as_str())
        .bind(&record.campaign_ref.external_id)
        .bind(proposal_json)
        .bind(outcome_json)
        .bind(record.outcome.status_label())
        .bind(&record.inputs_hash)
        .bind(record.budget_change_fraction.map(|f| f.to_string()))
        .bind(record.tick_id.to_string())
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_recent_actions(&self, campaign_ref: Option<&CampaignRef>, limit: u32) -> Result<Vec<ActionRecord>> {
        let rows: Vec<ActionRecordRow> = match campaign_ref {
            Some(campaign_ref) => {
                sqlx::query_as(
                    r#"
                    SELECT id, platform_id, external_id, proposal_json, outcome_json, outcome_status,
                           inputs_hash, budget_change_fraction, tick_id, recorded_at
                    FROM action_ledger
                    WHERE platform_id = ? AND external_id = ?
                    ORDER BY recorded_at DESC
                    LIMIT ?
                    "#,
                )
                .bind(campaign_ref.platform_id.as_str())
                .bind(&campaign_ref.external_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, platform_id, external_id, proposal_json, outcome_json, outcome_status,
                           inputs_hash, budget_change_fraction, tick_id, recorded_at
                    FROM action_ledger
                    ORDER BY recorded_at DESC
                    LIMIT ?
                    "#,
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(row_to_action_record).collect()
    }

    async fn get_actions_by_outcome(&self, outcome_status: &str, since: DateTime<Utc>, limit: u32) -> Result<Vec<ActionRecord>> {
        let rows: Vec<ActionRecordRow> = sqlx::query_as(
            r#"
            SELECT id, platform_id, external_id, proposal_json, outcome_json, outcome_status,
                   inputs_hash, budget_change_fraction, tick_id, recorded_at
            FROM action_ledger
            WHERE outcome_status = ? AND recorded_at >= ?
            ORDER BY recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(outcome_status)
        .bind(since.to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_action_record).collect()
    }

    async fn scan_since(&self, since: DateTime<Utc>) -> Result<Vec<ActionRecord>> {
        let rows: Vec<ActionRecordRow> = sqlx::query_as(
            r#"
            SELECT id, platform_id, external_id, proposal_json, outcome_json, outcome_status,
                   inputs_hash, budget_change_fraction, tick_id, recorded_at
            FROM action_ledger
            WHERE recorded_at >= ?
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_action_record).collect()
    }

    async fn find_by_inputs_hash(&self, inputs_hash: &str) -> Result<Option<ActionRecord>> {
        let row: Option<ActionRecordRow> = sqlx::query_as(
            r#"
            SELECT id, platform_id, external_id, proposal_json, outcome_json, outcome_status,
                   inputs_hash, budget_change_fraction, tick_id, recorded_at
            FROM action_ledger
            WHERE inputs_hash = ?
            LIMIT 1
            "#,
        )
        .bind(inputs_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_action_record).transpose()
    }

    async fn append_metric_sample(&self, sample: &MetricSample) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metric_samples (
                platform_id, external_id, sample_time, impressions, clicks,
                spend, conversions, revenue, newly_seen, last_seen_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.campaign_ref.platform_id.as_str())
        .bind(&sample.campaign_ref.external_id)
        .bind(sample.sample_time.to_rfc3339())
        .bind(sample.impressions as i64)
        .bind(sample.clicks as i64)
        .bind(sample.spend.to_string())
        .bind(sample.conversions as i64)
        .bind(sample.revenue.to_string())
        .bind(sample.newly_seen)
        .bind(sample.last_seen_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_samples(
        &self,
        campaign_ref: &CampaignRef,
        range: (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<Vec<MetricSample>> {
        let rows: Vec<MetricSampleRow> = sqlx::query_as(
            r#"
            SELECT platform_id, external_id, sample_time, impressions, clicks,
                   spend, conversions, revenue, newly_seen, last_seen_at
            FROM metric_samples
            WHERE platform_id = ? AND external_id = ? AND sample_time >= ? AND sample_time <= ?
            ORDER BY sample_time ASC
            "#,
        )
        .bind(campaign_ref.platform_id.as_str())
        .bind(&campaign_ref.external_id)
        .bind(range.0.to_rfc3339())
        .bind(range.1.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_metric_sample).collect()
    }

    async fn latest_sample(&self, campaign_ref: &CampaignRef) -> Result<Option<MetricSample>> {
        let row: Option<MetricSampleRow> = sqlx::query_as(
            r#"
            SELECT platform_id, external_id, sample_time, impressions, clicks,
                   spend, conversions, revenue, newly_seen, last_seen_at
            FROM metric_samples
            WHERE platform_id = ? AND external_id = ?
            ORDER BY sample_time DESC
            LIMIT 1
            "#,
        )
        .bind(campaign_ref.platform_id.as_str())
        .bind(&campaign_ref.external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_metric_sample).transpose()
    }

    async fn record_config_change(&self, operator: &str, change_json: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO config_history (id, changed_at, operator, change_json)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(operator)
        .bind(change_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_config_history(&self, limit: u32) -> Result<Vec<ConfigHistoryRow>> {
        let rows: Vec<ConfigHistoryRow> = sqlx::query_as(
            r#"
            SELECT id, changed_at, operator, change_json
            FROM config_history
            ORDER BY changed_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn record_event(&self, event: &LedgerEvent) -> Result<()> {
        let payload_json = serde_json::to_string(event)?;
        sqlx::query(
            r#"
            INSERT INTO system_events (id, event_type, payload_json, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(event.type_label())
        .bind(payload_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_recent_events(&self, limit: u32) -> Result<Vec<LedgerEvent>> {
        let rows: Vec<SystemEventRow> = sqlx::query_as(
            r#"
            SELECT id, event_type, payload_json, recorded_at
            FROM system_events
            ORDER BY recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|row| serde_json::from_str(&row.payload_json).map_err(CoreError::from)).collect()
    }
}

fn row_to_metric_sample(row: MetricSampleRow) -> Result<MetricSample> {
    Ok(MetricSample {
        campaign_ref: CampaignRef::new(PlatformId::parse(&row.platform_id), row.external_id),
        sample_time: DateTime::parse_from_rfc3339(&row.sample_time)
            .map_err(|e| CoreError::internal(format!("corrupt sample_time: {e}")))?
            .with_timezone(&Utc),
        impressions: row.impressions as u64,
        clicks: row.clicks as u64,
        spend: row.spend.parse::<Decimal>().map_err(|e| CoreError::internal(format!("corrupt spend: {e}")))?,
        conversions: row.conversions as u64,
        revenue: row.revenue.parse::<Decimal>().map_err(|e| CoreError::internal(format!("corrupt revenue: {e}")))?,
        newly_seen: row.newly_seen,
        last_seen_at: DateTime::parse_from_rfc3339(&row.last_seen_at)
            .map_err(|e| CoreError::internal(format!("corrupt last_seen_at: {e}")))?
            .with_timezone(&Utc),
    })
}

fn row_to_action_record(row: ActionRecordRow) -> Result<ActionRecord> {
    let proposal: Proposal = serde_json::from_str(&row.proposal_json)?;
    let outcome: ActionOutcome = serde_json::from_str(&row.outcome_json)?;
    let budget_change_fraction = row
        .budget_change_fraction
        .map(|f| f.parse::<Decimal>().map_err(|e| CoreError::internal(format!("corrupt budget_change_fraction: {e}"))))
        .transpose()?;
    Ok(ActionRecord {
        id: Uuid::parse_str(&row.id).map_err(|e| CoreError::internal(format!("corrupt ledger row id: {e}")))?,
        campaign_ref: proposal.campaign_ref.clone(),
        proposal,
        outcome,
        inputs_hash: row.inputs_hash,
        budget_change_fraction,
        tick_id: Uuid::parse_str(&row.tick_id).map_err(|e| CoreError::internal(format!("corrupt tick id: {e}")))?,
        recorded_at: DateTime::parse_from_rfc3339(&row.recorded_at)
            .map_err(|e| CoreError::internal(format!("corrupt recorded_at: {e}")))?
            .with_timezone(&Utc),
    })
}

#[derive(Clone)]
pub struct SqliteCampaignRepository {
    pool: SqlitePool,
}

impl SqliteCampaignRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CampaignRepository for SqliteCampaignRepository {
    async fn upsert(&self, campaign: &Campaign) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (platform_id, external_id, name, status, daily_budget, objective, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(platform_id, external_id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                daily_budget = excluded.daily_budget,
                objective = excluded.objective,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(campaign.campaign_ref.platform_id.as_str())
        .bind(&campaign.campaign_ref.external_id)
        .bind(&campaign.name)
        .bind(status_str(campaign.status))
        .bind(campaign.daily_budget.to_string())
        .bind(&campaign.objective)
        .bind(campaign.created_at.to_rfc3339())
        .bind(campaign.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, campaign_ref: &CampaignRef) -> Result<Option<Campaign>> {
        let row: Option<CampaignRow> = sqlx::query_as(
            r#"
            SELECT platform_id, external_id, name, status, daily_budget, objective, created_at, updated_at
            FROM campaigns WHERE platform_id = ? AND external_id = ?
            "#,
        )
        .bind(campaign_ref.platform_id.as_str())
        .bind(&campaign_ref.external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_campaign).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Campaign>> {
        let rows: Vec<CampaignRow> = sqlx::query_as(
            "SELECT platform_id, external_id, name, status, daily_budget, objective, created_at, updated_at FROM campaigns",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_campaign).collect()
    }

    async fn list_by_platform(&self, platform_id: &PlatformId) -> Result<Vec<Campaign>> {
        let rows: Vec<CampaignRow> = sqlx::query_as(
            r#"
            SELECT platform_id, external_id, name, status, daily_budget, objective, created_at, updated_at
            FROM campaigns WHERE platform_id = ?
            "#,
        )
        .bind(platform_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_campaign).collect()
    }
}

fn status_str(status: CampaignStatus) -> &'static str {
    match status {
        CampaignStatus::Enabled => "ENABLED",
        CampaignStatus::Paused => "PAUSED",
        CampaignStatus::Removed => "REMOVED",
    }
}

fn row_to_campaign(row: CampaignRow) -> Result<Campaign> {
    let status = match row.status.as_str() {
        "ENABLED" => CampaignStatus::Enabled,
        "PAUSED" => CampaignStatus::Paused,
        "REMOVED" => CampaignStatus::Removed,
        other => return Err(CoreError::internal(format!("corrupt campaign status: {other}"))),
    };
    Ok(Campaign {
        campaign_ref: CampaignRef::new(PlatformId::parse(&row.platform_id), row.external_id),
        name: row.name,
        status,
        daily_budget: row
            .daily_budget
            .parse::<Decimal>()
            .map_err(|e| CoreError::internal(format!("corrupt daily_budget: {e}")))?,
        objective: row.objective,
        created_at: DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| CoreError::internal(format!("corrupt created_at: {e}")))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.updated_at)
            .map_err(|e| CoreError::internal(format!("corrupt updated_at: {e}")))?
            .with_timezone(&Utc),
    })
}

/// Reconstructs [`DailyCounters`] for a campaign by scanning the ledger
/// back to `local_midnight` rather than trusting a persisted counter
/// (§4.5). `local_midnight` is computed by the caller against the
/// configured timezone (§6 `timezone`).
pub async fn recover_daily_counters(
    repo: &dyn LedgerRepository,
    campaign_ref: &CampaignRef,
    local_midnight: DateTime<Utc>,
) -> Result<DailyCounters> {
    let records = repo.scan_since(local_midnight).await?;
    let mut counters = DailyCounters { since: Some(local_midnight), ..Default::default() };
    for record in records.iter().filter(|r| &r.campaign_ref == campaign_ref) {
        if matches!(record.outcome, ActionOutcome::Success) {
            counters.adjustments_made += 1;
            if let Some(fraction) = record.budget_change_fraction {
                counters.budget_reallocated_fraction += fraction;
            }
        }
    }
    Ok(counters)
}
