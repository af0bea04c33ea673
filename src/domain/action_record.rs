use rust_decimal::Decimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::GuardrailReason;
use super::platform::CampaignRef;
use super::proposal::Proposal;

/// One append-only row in the Action Ledger (§4.5). Every decision that
/// leaves Gating is recorded here exactly once, regardless of outcome —
/// including rejections and approvals that later expire — so the ledger is
/// a complete audit trail, not just a log of successful changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRecord {
    pub id: Uuid,
    pub campaign_ref: CampaignRef,
    pub proposal: Proposal,
    pub outcome: ActionOutcome,
    /// SHA-256 hex fingerprint of the inputs that produced this record's
    /// proposal (campaign state + metric sample + analyst request), used to
    /// detect a retried tick re-emitting a record already ledgered.
    pub inputs_hash: String,
    /// Absolute budget-change fraction this record represents relative to
    /// the campaign's budget immediately before it, for kinds that move
    /// money (`None` for `Pause`/`Resume`). Stamped at gate time so
    /// [`recover_daily_counters`](crate::ledger::recover_daily_counters) can
    /// reconstruct I5's running total from the ledger alone, without
    /// re-deriving it from `before`/`after` platform state.
    pub budget_change_fraction: Option<Decimal>,
    pub tick_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Applied against the platform adapter and confirmed.
    Success,
    /// Adapter call failed after exhausting retries.
    Failed { reason: String },
    /// Gate rejected the proposal outright; never sent to an adapter.
    Rejected { reason: GuardrailReason },
    /// Required approval, parked, and the TTL elapsed before a human acted.
    Expired,
    /// An operator explicitly rejected a pending approval.
    Cancelled,
}

impl ActionOutcome {
    pub fn is_terminal_without_platform_call(&self) -> bool {
        matches!(self, ActionOutcome::Rejected { .. } | ActionOutcome::Expired | ActionOutcome::Cancelled)
    }

    /// The `status` tag `serde` would write for this variant, denormalised
    /// into its own ledger column so a scan by `(decision.outcome, time)`
    /// (§4.5) doesn't need to deserialise `outcome_json` for every row.
    pub fn status_label(&self) -> &'static str {
        match self {
            ActionOutcome::Success => "success",
            ActionOutcome::Failed { .. } => "failed",
            ActionOutcome::Rejected { .. } => "rejected",
            ActionOutcome::Expired => "expired",
            ActionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Structured event taxonomy emitted alongside ledger writes, for
/// operators and downstream observability to subscribe to without
/// re-parsing `ActionRecord` (§11 supplemented feature — mirrors the
/// decision-event pattern used for governance signals). Distinct from
/// `ActionRecord` itself: an event is a notification, the record is the
/// durable fact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LedgerEvent {
    ActionRecorded { record_id: Uuid, campaign_ref: CampaignRef, outcome_label: String },
    ApprovalRequested { record_id: Uuid, campaign_ref: CampaignRef, reason: GuardrailReason },
    ApprovalExpired { record_id: Uuid, campaign_ref: CampaignRef },
    GuardrailOverridden { campaign_ref: Option<CampaignRef>, operator: String },
    /// A tick aborted before reaching `AUDITING` (§4.3 `FAILED` state).
    TickFailed { tick_id: Uuid, failed_in_state: String, reason: String },
    /// A tick's deadline elapsed before the next one was due, so the next
    /// scheduled tick is skipped rather than queued (§4.3).
    TickSkipped { tick_id: Uuid, scheduled_for: DateTime<Utc> },
    /// A platform was excluded from a tick's analysis after its adapter
    /// call failed (§4.3 step 1, §8 scenario 5).
    PlatformExcluded { tick_id: Uuid, platform_id: String, reason: String },
    /// A guardrail override or other configuration change took effect
    /// (§4.5: config changes are themselves ledgered).
    ConfigChanged { operator: String, description: String },
}

impl LedgerEvent {
    /// The `type` tag `serde` would write for this variant, denormalised
    /// into its own `system_events` column so a scan by event kind doesn't
    /// need to deserialise `payload_json` for every row — the same
    /// reasoning [`ActionOutcome::status_label`] already applies to
    /// `action_ledger`.
    pub fn type_label(&self) -> &'static str {
        match self {
            LedgerEvent::ActionRecorded { .. } => "action_recorded",
            LedgerEvent::ApprovalRequested { .. } => "approval_requested",
            LedgerEvent::ApprovalExpired { .. } => "approval_expired",
            LedgerEvent::GuardrailOverridden { .. } => "guardrail_overridden",
            LedgerEvent::TickFailed { .. } => "tick_failed",
            LedgerEvent::TickSkipped { .. } => "tick_skipped",
            LedgerEvent::PlatformExcluded { .. } => "platform_excluded",
            LedgerEvent::ConfigChanged { .. } => "config_changed",
        }
    }
}
