//! Drives the control loop at a fixed cadence and owns the tick
//! transaction (§4.3): collect → normalise → analyse → gate → execute →
//! audit, plus the four inbound control-surface verbs (§6) that act
//! outside of a tick.

pub mod lease;
pub mod scheduler;

pub use lease::{LeaseGuard, ProcessLocalLease, TickLease};
pub use scheduler::TickScheduler;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock, Semaphore};
use uuid::Uuid;

use crate::adapters::AdapterRegistry;
use crate::config::{AutomationLevel, Config};
use crate::domain::{
    ActionOutcome, ActionRecord, CampaignRef, CampaignStatus, CoreError, DailyCounters, Decision,
    GuardrailOverride, Guardrails, LedgerEvent, PlatformId, Proposal, ProposalKind, Result,
};
use crate::guardrail::queue::{ApprovalResolution, PendingApproval};
use crate::guardrail::{budget_change_fraction, ApprovalQueue, EvaluationContext, GuardrailGate};
use crate::ledger::{emit_ledger_event, recover_daily_counters, CampaignRepository, LedgerRepository};
use crate::llm_analyst::{AnalysisRequest, CampaignSnapshot, LlmAnalystClient};
use crate::normalizer::MetricNormalizer;

const DEFAULT_PER_PLATFORM_CONCURRENCY: usize = 4;
const TRAILING_WINDOW_DAYS: i64 = 7;

/// States the tick state machine moves through in order. Any state can
/// fall through to `Failed` on an unrecoverable error; `Failed` always
/// returns control to the scheduler, which resumes at the next boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Idle,
    Collecting,
    Analyzing,
    Gating,
    Executing,
    Auditing,
    Failed,
}

/// Summary of one tick, returned to the caller (CLI, scheduler loop) for
/// logging and metrics. Not persisted itself — the ledger rows and
/// `LedgerEvent`s written during the tick are the durable record.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub tick_id: Uuid,
    pub final_state: TickState,
    pub records_written: usize,
    pub proposals_seen: usize,
    pub platforms_excluded: Vec<PlatformId>,
    pub skipped: bool,
    pub error: Option<String>,
}

impl TickOutcome {
    fn skipped(tick_id: Uuid, reason: &str) -> Self {
        Self {
            tick_id,
            final_state: TickState::Idle,
            records_written: 0,
            proposals_seen: 0,
            platforms_excluded: Vec::new(),
            skipped: true,
            error: Some(reason.to_string()),
        }
    }

    fn failed(tick_id: Uuid, error: String) -> Self {
        Self {
            tick_id,
            final_state: TickState::Failed,
            records_written: 0,
            proposals_seen: 0,
            platforms_excluded: Vec::new(),
            skipped: false,
            error: Some(error),
        }
    }
}

/// Wires together every collaborator named in §2's component diagram and
/// owns the two pieces of shared mutable state the core has:
/// `DailyCounters` and the approval queue (§5).
pub struct DecisionEngine {
    adapters: AdapterRegistry,
    normalizer: MetricNormalizer,
    guardrails: RwLock<Guardrails>,
    analyst: Arc<dyn LlmAnalystClient>,
    ledger: Arc<dyn LedgerRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    approval_queue: Mutex<ApprovalQueue>,
    daily_counters: Mutex<HashMap<CampaignRef, DailyCounters>>,
    lease: Box<dyn TickLease>,
    platform_semaphores: HashMap<PlatformId, Arc<Semaphore>>,
    automation_level: AutomationLevel,
    approval_ttl: StdDuration,
    timezone: Tz,
    /// Overall per-tick deadline (§5): `tick_interval_secs *
    /// tick_deadline_fraction`. `run_tick` enforces it with a
    /// `tokio::time::timeout` around the whole collect-through-audit body;
    /// elapsing it routes the tick to `FAILED` the same as any other
    /// unrecoverable error.
    tick_deadline: StdDuration,
    last_tick_time: Mutex<Option<DateTime<Utc>>>,
}

impl DecisionEngine {
    pub async fn new(
        config: &Config,
        adapters: AdapterRegistry,
        normalizer: MetricNormalizer,
        analyst: Arc<dyn LlmAnalystClient>,
        ledger: Arc<dyn LedgerRepository>,
        campaigns: Arc<dyn CampaignRepository>,
    ) -> Result<Self> {
        let timezone = Tz::from_str(&config.engine.timezone)
            .map_err(|e| CoreError::config(format!("invalid timezone {:?}: {e}", config.engine.timezone)))?;

        let platform_semaphores = adapters
            .platforms()
            .into_iter()
            .map(|p| (p, Arc::new(Semaphore::new(DEFAULT_PER_PLATFORM_CONCURRENCY))))
            .collect();

        let daily_counters = Self::recover_all_daily_counters(&*ledger, &*campaigns, timezone).await?;

        Ok(Self {
            adapters,
            normalizer,
            guardrails: RwLock::new(config.to_guardrails()),
            analyst,
            ledger,
            campaigns,
            approval_queue: Mutex::new(ApprovalQueue::new()),
            daily_counters: Mutex::new(daily_counters),
            lease: Box::new(ProcessLocalLease::new()),
            platform_semaphores,
            automation_level: config.engine.automation_level,
            approval_ttl: StdDuration::from_secs(config.guardrails.approval_ttl_secs),
            timezone,
            tick_deadline: tick_deadline_from(config),
            last_tick_time: Mutex::new(None),
        })
    }

    async fn recover_all_daily_counters(
        ledger: &dyn LedgerRepository,
        campaigns: &dyn CampaignRepository,
        timezone: Tz,
    ) -> Result<HashMap<CampaignRef, DailyCounters>> {
        let midnight = local_midnight(Utc::now(), timezone);
        let mut out = HashMap::new();
        for campaign in campaigns.list_all().await? {
            let counters = recover_daily_counters(ledger, &campaign.campaign_ref, midnight).await?;
            out.insert(campaign.campaign_ref, counters);
        }
        Ok(out)
    }

    // ---- Inbound control surface (§6) -------------------------------

    pub async fn list_pending_approvals(&self) -> Vec<PendingApproval> {
        self.approval_queue.lock().await.list_pending().into_iter().cloned().collect()
    }

    pub async fn get_recent_actions(&self, campaign_ref: Option<&CampaignRef>, limit: u32) -> Result<Vec<ActionRecord>> {
        self.ledger.get_recent_actions(campaign_ref, limit).await
    }

    /// Resolves a pending approval by executing it against the current
    /// state. Re-checks guardrails (not re-analysis) per §4.4: approval
    /// bypasses the analyst but not I3-I6.
    pub async fn approve(&self, id: Uuid) -> Result<ActionRecord> {
        let proposal = {
            let mut queue = self.approval_queue.lock().await;
            queue.approve(id).map_err(|_| CoreError::validation("approval already resolved or unknown"))?
        };

        let tick_id = Uuid::new_v4();
        let record = self.resolve_approved_proposal(proposal, tick_id).await?;
        self.ledger.append(&record).await?;
        Ok(record)
    }

    pub async fn reject(&self, id: Uuid, reason: String) -> Result<ActionRecord> {
        let proposal = {
            let mut queue = self.approval_queue.lock().await;
            match queue.get(id) {
                Some(entry) => entry.proposal.clone(),
                None => return Err(CoreError::validation("approval already resolved or unknown")),
            }
        };
        {
            let mut queue = self.approval_queue.lock().await;
            if queue.reject(id) != ApprovalResolution::Rejected {
                return Err(CoreError::validation("approval already resolved or unknown"));
            }
        }

        let record = ActionRecord {
            id: Uuid::new_v4(),
            campaign_ref: proposal.campaign_ref.clone(),
            proposal,
            outcome: ActionOutcome::Cancelled,
            inputs_hash: String::new(),
            budget_change_fraction: None,
            tick_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
        };
        tracing::info!(reason, "operator rejected pending approval");
        self.ledger.append(&record).await?;
        Ok(record)
    }

    /// Writes a time-boxed per-campaign guardrail override (§6), itself
    /// ledgered, and schedules its automatic revert after `ttl`. Takes
    /// `self` behind an `Arc` since the revert runs on a detached task that
    /// must outlive this call.
    pub async fn override_guardrail(
        self: &Arc<Self>,
        campaign_ref: CampaignRef,
        override_value: GuardrailOverride,
        ttl: StdDuration,
        operator: String,
    ) {
        {
            let mut guardrails = self.guardrails.write().await;
            guardrails.overrides.insert(campaign_ref.clone(), override_value.clone());
        }
        emit_ledger_event(&*self.ledger, &LedgerEvent::GuardrailOverridden {
            campaign_ref: Some(campaign_ref.clone()),
            operator: operator.clone(),
        })
        .await;

        let change = serde_json::json!({
            "campaign_ref": campaign_ref.to_string(),
            "override": override_value,
            "ttl_secs": ttl.as_secs(),
        });
        match serde_json::to_string(&change) {
            Ok(change_json) => {
                if let Err(e) = self.ledger.record_config_change(&operator, &change_json).await {
                    tracing::warn!(error = %e, "failed to persist guardrail override to config_history");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialise guardrail override"),
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut guardrails = engine.guardrails.write().await;
            guardrails.overrides.remove(&campaign_ref);
        });
    }

    // ---- Tick execution (§4.3) --------------------------------------

    /// Removes approval-queue entries past their TTL and writes a terminal
    /// `Expired` `ActionRecord` for each. Run at the start of every tick so
    /// an idle engine still expires stale approvals.
    pub async fn sweep_expired_approvals(&self) -> Result<usize> {
        let expired: Vec<PendingApproval> = {
            let mut queue = self.approval_queue.lock().await;
            queue.sweep_expired(Utc::now())
        };
        let count = expired.len();
        for entry in expired {
            emit_ledger_event(&*self.ledger, &LedgerEvent::ApprovalExpired {
                record_id: entry.id,
                campaign_ref: entry.proposal.campaign_ref.clone(),
            })
            .await;
            let record = ActionRecord {
                id: entry.id,
                campaign_ref: entry.proposal.campaign_ref.clone(),
                proposal: entry.proposal,
                outcome: ActionOutcome::Expired,
                inputs_hash: String::new(),
                budget_change_fraction: None,
                tick_id: Uuid::new_v4(),
                recorded_at: Utc::now(),
            };
            self.ledger.append(&record).await?;
        }
        Ok(count)
    }

    /// Runs one full tick. Returns `Ok(TickOutcome)` whether the tick
    /// succeeded, failed, or was skipped for lack of the exclusive lease —
    /// only an error constructing the tick record itself propagates as
    /// `Err`.
    pub async fn run_tick(&self) -> Result<TickOutcome> {
        let tick_id = Uuid::new_v4();
        let span = tracing::info_span!("tick", tick_id = %tick_id);
        let _guard = span.enter();

        let Some(lease_guard) = self.lease.try_acquire().await else {
            tracing::warn!("tick skipped: exclusive lease held by another tick");
            emit_ledger_event(&*self.ledger, &LedgerEvent::TickSkipped { tick_id, scheduled_for: Utc::now() }).await;
            return Ok(TickOutcome::skipped(tick_id, "lease contention"));
        };

        if let Err(e) = self.sweep_expired_approvals().await {
            tracing::error!(error = %e, "failed to sweep expired approvals");
        }

        let now = Utc::now();
        let since = { *self.last_tick_time.lock().await }.unwrap_or_else(|| now - chrono::Duration::minutes(15));

        metrics::counter!(crate::observability::metrics::TICKS_TOTAL).increment(1);

        // §5: the tick has an overall deadline (default 80% of the cadence
        // interval). Any stage suspended past it is aborted and the tick
        // routes to FAILED exactly like any other unrecoverable error —
        // partially-executed actions are left in place for the next tick's
        // read-back to reconcile.
        let outcome = match tokio::time::timeout(self.tick_deadline, self.run_tick_inner(tick_id, since, now)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::TickDeadlineExceeded(self.tick_deadline)),
        };

        match outcome {
            Ok(outcome) => {
                *self.last_tick_time.lock().await = Some(now);
                drop(lease_guard);
                Ok(outcome)
            }
            Err(e) => {
                metrics::counter!(crate::observability::metrics::TICK_FAILURES_TOTAL).increment(1);
                emit_ledger_event(&*self.ledger, &LedgerEvent::TickFailed {
                    tick_id,
                    failed_in_state: "unspecified".to_string(),
                    reason: e.to_string(),
                })
                .await;
                drop(lease_guard);
                Ok(TickOutcome::failed(tick_id, e.to_string()))
            }
        }
    }

    async fn run_tick_inner(&self, tick_id: Uuid, since: DateTime<Utc>, now: DateTime<Utc>) -> Result<TickOutcome> {
        let (samples, excluded_platforms) = self.collect_phase(tick_id, since, now).await;

        let pending_proposals: Vec<Proposal> =
            self.approval_queue.lock().await.list_pending().into_iter().map(|p| p.proposal.clone()).collect();

        let mut snapshots = Vec::with_capacity(samples.len());
        for sample in &samples {
            let campaign = match self.campaigns.get(&sample.campaign_ref).await? {
                Some(c) => c,
                None => continue,
            };
            let window_start = sample.sample_time - chrono::Duration::days(TRAILING_WINDOW_DAYS);
            let trailing_window = self.ledger.get_samples(&sample.campaign_ref, (window_start, sample.sample_time)).await?;
            snapshots.push(CampaignSnapshot { campaign, current_sample: sample.clone(), trailing_window });
        }

        let guardrails_snapshot = self.guardrails.read().await.clone();
        let request = AnalysisRequest {
            tick_id,
            generated_at: now,
            campaigns: snapshots,
            guardrails: guardrails_snapshot.clone(),
            pending_proposals,
        };
        let inputs_hash = request.inputs_hash();

        if self.ledger.find_by_inputs_hash(&inputs_hash).await?.is_some() {
            tracing::info!("identical inputs already processed; replay is a no-op");
            return Ok(TickOutcome {
                tick_id,
                final_state: TickState::Auditing,
                records_written: 0,
                proposals_seen: 0,
                platforms_excluded: excluded_platforms,
                skipped: false,
                error: None,
            });
        }

        let response = match self.analyst.analyze(&request).await {
            Ok(r) => r,
            Err(e) => return Err(e),
        };

        let gate = GuardrailGate::new(guardrails_snapshot);
        let mut decisions: Vec<Decision> = Vec::with_capacity(response.proposals.len());
        {
            let counters_map = self.daily_counters.lock().await;
            for proposal in response.proposals {
                let campaign = match self.campaigns.get(&proposal.campaign_ref).await? {
                    Some(c) => c,
                    None => continue,
                };
                let platform_confirmed_budget_total = self
                    .campaigns
                    .list_by_platform(&proposal.campaign_ref.platform_id)
                    .await?
                    .iter()
                    .filter(|c| c.is_enabled())
                    .map(|c| c.daily_budget)
                    .sum::<Decimal>();
                let daily_counters = counters_map.get(&proposal.campaign_ref).cloned().unwrap_or_default();
                let ctx = EvaluationContext {
                    campaign: &campaign,
                    daily_counters: &daily_counters,
                    platform_confirmed_budget_total,
                    platform_budget_ceiling: gate_ceiling(&self.guardrails, &proposal.campaign_ref.platform_id).await,
                    automation_level: self.automation_level,
                    manual_override: false,
                    now,
                };
                decisions.push(gate.evaluate(proposal, &ctx));
            }
        }

        let proposals_seen = decisions.len();
        decisions.sort_by_key(|d| execution_priority(&d.proposal().kind));

        let mut records_written = 0usize;
        for decision in decisions {
            match decision {
                Decision::Rejected { proposal, reason } => {
                    let record = ActionRecord {
                        id: Uuid::new_v4(),
                        campaign_ref: proposal.campaign_ref.clone(),
                        budget_change_fraction: budget_change_fraction(&proposal.kind, campaign_daily_budget(self, &proposal).await),
                        proposal,
                        outcome: ActionOutcome::Rejected { reason },
                        inputs_hash: inputs_hash.clone(),
                        tick_id,
                        recorded_at: Utc::now(),
                    };
                    self.ledger.append(&record).await?;
                    records_written += 1;
                }
                Decision::ApprovalRequired { proposal, reason } => {
                    emit_ledger_event(&*self.ledger, &LedgerEvent::ApprovalRequested {
                        record_id: Uuid::new_v4(),
                        campaign_ref: proposal.campaign_ref.clone(),
                        reason: reason.clone(),
                    })
                    .await;
                    let mut queue = self.approval_queue.lock().await;
                    queue.enqueue(Decision::ApprovalRequired { proposal, reason }, now, self.approval_ttl);
                }
                Decision::AutoExecute { proposal, reason: _ } => {
                    let fraction = budget_change_fraction(&proposal.kind, campaign_daily_budget(self, &proposal).await);
                    let outcome = self.execute_proposal(&proposal).await;
                    if matches!(outcome, ActionOutcome::Success) {
                        self.record_auto_execution(&proposal, fraction).await;
                    }
                    let record = ActionRecord {
                        id: Uuid::new_v4(),
                        campaign_ref: proposal.campaign_ref.clone(),
                        budget_change_fraction: fraction,
                        proposal,
                        outcome,
                        inputs_hash: inputs_hash.clone(),
                        tick_id,
                        recorded_at: Utc::now(),
                    };
                    self.ledger.append(&record).await?;
                    records_written += 1;
                }
            }
        }

        Ok(TickOutcome {
            tick_id,
            final_state: TickState::Auditing,
            records_written,
            proposals_seen,
            platforms_excluded: excluded_platforms,
            skipped: false,
            error: None,
        })
    }

    async fn collect_phase(
        &self,
        tick_id: Uuid,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (Vec<crate::domain::MetricSample>, Vec<PlatformId>) {
        let platforms = self.adapters.platforms();
        let calls = platforms.iter().map(|platform_id| {
            let platform_id = platform_id.clone();
            async move {
                let adapter = self.adapters.get(&platform_id)?;
                if !adapter.health().await.is_usable() {
                    return Err(CoreError::Unavailable(platform_id.to_string()));
                }
                for campaign in adapter.list_campaigns(Some(since)).await? {
                    self.campaigns.upsert(&campaign).await?;
                }
                let raw_metrics = adapter.get_performance((since, now), None).await?;
                Ok::<_, CoreError>((platform_id, raw_metrics))
            }
        });

        let results = join_all(calls).await;
        let mut raw_by_platform = Vec::new();
        let mut excluded = Vec::new();
        for (platform_id, result) in platforms.into_iter().zip(results) {
            match result {
                Ok((_, raw_metrics)) => raw_by_platform.extend(raw_metrics),
                Err(e) => {
                    excluded.push(platform_id.clone());
                    emit_ledger_event(&*self.ledger, &LedgerEvent::PlatformExcluded {
                        tick_id,
                        platform_id: platform_id.to_string(),
                        reason: e.to_string(),
                    })
                    .await;
                }
            }
        }

        let samples = self.normalize_and_persist(raw_by_platform).await;
        (samples, excluded)
    }

    /// Runs each raw reading through the Metric Normaliser — consulting
    /// the ledger for the campaign's last sample to derive `newly_seen`
    /// and `last_seen_at` (§4.2) — then writes the resulting
    /// [`crate::domain::MetricSample`] (§3: written by the Decision Engine
    /// at each tick, immutable afterwards).
    async fn normalize_and_persist(&self, raw_metrics: Vec<crate::normalizer::RawMetric>) -> Vec<crate::domain::MetricSample> {
        let mut samples = Vec::with_capacity(raw_metrics.len());
        for raw in raw_metrics {
            let previous = match self.ledger.latest_sample(&raw.campaign_ref).await {
                Ok(previous) => previous,
                Err(e) => {
                    tracing::warn!(campaign_ref = %raw.campaign_ref, error = %e, "failed to read prior sample; treating as newly seen");
                    None
                }
            };
            let sample = self.normalizer.normalize(
                raw,
                previous.is_some(),
                previous.map(|p| p.last_seen_at),
            );
            if let Err(e) = self.ledger.append_metric_sample(&sample).await {
                tracing::error!(campaign_ref = %sample.campaign_ref, error = %e, "failed to persist metric sample");
                continue;
            }
            samples.push(sample);
        }
        samples
    }

    async fn execute_proposal(&self, proposal: &Proposal) -> ActionOutcome {
        let semaphore = self.platform_semaphores.get(&proposal.campaign_ref.platform_id).cloned();
        let _permit = match &semaphore {
            Some(s) => s.acquire().await.ok(),
            None => None,
        };

        let adapter = match self.adapters.get(&proposal.campaign_ref.platform_id) {
            Ok(a) => a,
            Err(e) => return ActionOutcome::Failed { reason: e.to_string() },
        };

        let result = match &proposal.kind {
            ProposalKind::Pause => adapter.set_status(&proposal.campaign_ref, CampaignStatus::Paused).await,
            ProposalKind::Resume => adapter.set_status(&proposal.campaign_ref, CampaignStatus::Enabled).await,
            ProposalKind::IncreaseBudget { new_daily_budget } | ProposalKind::DecreaseBudget { new_daily_budget } => {
                adapter.update_budget(&proposal.campaign_ref, *new_daily_budget).await
            }
            ProposalKind::Reallocate { from, to, amount } => self.execute_reallocation(from, to, *amount).await,
        };

        match result {
            Ok(()) => ActionOutcome::Success,
            Err(e) => ActionOutcome::Failed { reason: e.to_string() },
        }
    }

    async fn execute_reallocation(&self, from: &CampaignRef, to: &CampaignRef, amount: Decimal) -> Result<()> {
        let from_campaign = self.campaigns.get(from).await?.ok_or_else(|| CoreError::NotFound(from.clone()))?;
        let to_campaign = self.campaigns.get(to).await?.ok_or_else(|| CoreError::NotFound(to.clone()))?;

        let from_adapter = self.adapters.get(&from.platform_id)?;
        from_adapter.update_budget(from, from_campaign.daily_budget - amount).await?;

        let to_adapter = self.adapters.get(&to.platform_id)?;
        to_adapter.update_budget(to, to_campaign.daily_budget + amount).await?;
        Ok(())
    }

    async fn record_auto_execution(&self, proposal: &Proposal, fraction: Option<Decimal>) {
        let mut counters_map = self.daily_counters.lock().await;
        let counters = counters_map.entry(proposal.campaign_ref.clone()).or_default();
        counters.adjustments_made += 1;
        if let Some(fraction) = fraction {
            counters.budget_reallocated_fraction += fraction;
        }
    }

    /// Re-checks I3-I6 against current state and either executes or
    /// rejects. Approval bypasses the analyst but never the gate (§4.4).
    async fn resolve_approved_proposal(&self, proposal: Proposal, tick_id: Uuid) -> Result<ActionRecord> {
        let campaign = self
            .campaigns
            .get(&proposal.campaign_ref)
            .await?
            .ok_or_else(|| CoreError::NotFound(proposal.campaign_ref.clone()))?;
        let platform_confirmed_budget_total = self
            .campaigns
            .list_by_platform(&proposal.campaign_ref.platform_id)
            .await?
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.daily_budget)
            .sum::<Decimal>();
        let daily_counters = self.daily_counters.lock().await.get(&proposal.campaign_ref).cloned().unwrap_or_default();
        let guardrails_snapshot = self.guardrails.read().await.clone();
        let ceiling = guardrails_snapshot.platform_budget_ceiling_for(&proposal.campaign_ref.platform_id);
        let ctx = EvaluationContext {
            campaign: &campaign,
            daily_counters: &daily_counters,
            platform_confirmed_budget_total,
            platform_budget_ceiling: ceiling,
            automation_level: self.automation_level,
            manual_override: false,
            now: Utc::now(),
        };
        let gate = GuardrailGate::new(guardrails_snapshot);
        let fraction = budget_change_fraction(&proposal.kind, campaign.daily_budget);

        let decision = gate.evaluate(proposal.clone(), &ctx);
        let outcome = match decision {
            Decision::AutoExecute { proposal, .. } => {
                let outcome = self.execute_proposal(&proposal).await;
                if matches!(outcome, ActionOutcome::Success) {
                    self.record_auto_execution(&proposal, fraction).await;
                }
                outcome
            }
            other => ActionOutcome::Rejected { reason: other.reason().clone() },
        };

        Ok(ActionRecord {
            id: Uuid::new_v4(),
            campaign_ref: proposal.campaign_ref.clone(),
            proposal,
            outcome,
            inputs_hash: String::new(),
            budget_change_fraction: fraction,
            tick_id,
            recorded_at: Utc::now(),
        })
    }
}

/// `tick_interval_secs * tick_deadline_fraction` (§5, §6), floored at one
/// second so a misconfigured fraction of `0` can't produce an
/// instantly-expiring deadline that fails every tick.
fn tick_deadline_from(config: &Config) -> StdDuration {
    let secs = config.engine.tick_interval_secs as f64 * config.engine.tick_deadline_fraction;
    StdDuration::from_secs_f64(secs.max(1.0))
}

fn execution_priority(kind: &ProposalKind) -> u8 {
    match kind {
        ProposalKind::Pause | ProposalKind::DecreaseBudget { .. } | ProposalKind::Reallocate { .. } => 0,
        ProposalKind::Resume | ProposalKind::IncreaseBudget { .. } => 1,
    }
}

async fn gate_ceiling(guardrails: &RwLock<Guardrails>, platform_id: &PlatformId) -> Option<Decimal> {
    guardrails.read().await.platform_budget_ceiling_for(platform_id)
}

/// Fetches a proposal's campaign's current confirmed budget, used only to
/// compute `budget_change_fraction` for the ledger row; falls back to zero
/// (which makes the fraction `None`) if the campaign has since vanished.
async fn campaign_daily_budget(engine: &DecisionEngine, proposal: &Proposal) -> Decimal {
    engine
        .campaigns
        .get(&proposal.campaign_ref)
        .await
        .ok()
        .flatten()
        .map(|c| c.daily_budget)
        .unwrap_or_default()
}

fn local_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let midnight = local.date_naive().and_hms_opt(0, 0, 0).expect("midnight is always a valid time");
    tz.from_local_datetime(&midnight).single().unwrap_or(local).with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decreases_and_pauses_sort_before_increases_and_resumes() {
        let mut kinds = vec![
            ProposalKind::IncreaseBudget { new_daily_budget: Decimal::new(13000, 2) },
            ProposalKind::Pause,
            ProposalKind::Resume,
            ProposalKind::DecreaseBudget { new_daily_budget: Decimal::new(8000, 2) },
        ];
        kinds.sort_by_key(execution_priority);
        assert_eq!(execution_priority(&kinds[0]), 0);
        assert_eq!(execution_priority(&kinds[1]), 0);
        assert_eq!(execution_priority(&kinds[2]), 1);
        assert_eq!(execution_priority(&kinds[3]), 1);
    }

    #[test]
    fn local_midnight_is_start_of_day_in_the_given_timezone() {
        let now = DateTime::parse_from_rfc3339("2026-07-28T14:30:00Z").unwrap().with_timezone(&Utc);
        let midnight = local_midnight(now, Tz::UTC);
        assert_eq!(midnight.to_rfc3339(), "2026-07-28T00:00:00+00:00");
    }
}
