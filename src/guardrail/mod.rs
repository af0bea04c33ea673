//! Deterministically classifies each proposal; never silently drops or
//! mutates one (§4.4). The rule table (R1-R6) is evaluated in order, first
//! match wins, and is pure over `(proposal, current state, config)` — the
//! same inputs always yield the same decision, the way the teacher's
//! `PolicyEvaluator` is pure over `(signal, rules)`.

pub mod queue;

pub use queue::ApprovalQueue;

use rust_decimal::Decimal;

use crate::config::AutomationLevel;
use crate::domain::{
    Campaign, DailyCounters, Decision, GuardrailReason, Guardrails, Proposal, ProposalKind,
};

/// Everything the gate needs besides the proposal itself and the static
/// guardrail thresholds: the campaign's current confirmed state, today's
/// running counters, the platform-wide confirmed budget sum (for R3
/// against I3), and the operator's chosen automation posture.
pub struct EvaluationContext<'a> {
    pub campaign: &'a Campaign,
    pub daily_counters: &'a DailyCounters,
    pub platform_confirmed_budget_total: Decimal,
    pub platform_budget_ceiling: Option<Decimal>,
    pub automation_level: AutomationLevel,
    pub manual_override: bool,
    pub now: chrono::DateTime<chrono::Utc>,
}

pub struct GuardrailGate {
    guardrails: Guardrails,
}

impl GuardrailGate {
    pub fn new(guardrails: Guardrails) -> Self {
        Self { guardrails }
    }

    /// Runs R1 through R6 in order against `proposal`, returning the first
    /// matching outcome. `AutomationLevel::Advisory` forces what would
    /// otherwise be R6's `AUTO_EXECUTE` into `APPROVAL_REQUIRED`;
    /// `AutomationLevel::Semi` forces the R4 major-change threshold to
    /// zero, so any nonzero budget change needs approval (§6).
    pub fn evaluate(&self, proposal: Proposal, ctx: &EvaluationContext<'_>) -> Decision {
        if ctx.manual_override {
            return Decision::AutoExecute { proposal, reason: GuardrailReason::ManualOverride };
        }

        let campaign_ref = &proposal.campaign_ref;

        // R1: confidence floor.
        let confidence_threshold = self.guardrails.confidence_threshold_for(campaign_ref);
        if proposal.confidence < confidence_threshold {
            return Decision::Rejected { proposal, reason: GuardrailReason::LowConfidence };
        }

        // R2: minimum runtime before a pause.
        if matches!(proposal.kind, ProposalKind::Pause) {
            let min_hours = self.guardrails.min_campaign_runtime_hours_before_pause_for(campaign_ref);
            if ctx.campaign.age(ctx.now) < chrono::Duration::hours(min_hours) {
                return Decision::Rejected { proposal, reason: GuardrailReason::InsufficientRuntime };
            }
        }

        // R3: would executing this violate I3, I4, or I5?
        if let Some(reason) = self.check_invariant_violations(&proposal, ctx) {
            return Decision::Rejected { proposal, reason };
        }

        // R4: major single change.
        let major_fraction = match ctx.automation_level {
            AutomationLevel::Semi => Decimal::ZERO,
            _ => self.guardrails.major_change_fraction_for(campaign_ref),
        };
        if let Some(change_fraction) = budget_change_fraction(&proposal.kind, ctx.campaign.daily_budget) {
            if change_fraction > major_fraction {
                return Decision::ApprovalRequired { proposal, reason: GuardrailReason::MajorChange };
            }
        }

        // R5: inherently high-impact kinds. The current `ProposalKind` set
        // (§3) has no such kind yet; this stays in place for forward
        // compatibility with kinds the analyst doesn't emit today.
        if is_high_impact_kind(&proposal.kind) {
            return Decision::ApprovalRequired { proposal, reason: GuardrailReason::HighImpactKind };
        }

        // R6: otherwise.
        match ctx.automation_level {
            AutomationLevel::Advisory => {
                Decision::ApprovalRequired { proposal, reason: GuardrailReason::WithinLimits }
            }
            _ => Decision::AutoExecute { proposal, reason: GuardrailReason::WithinLimits },
        }
    }

    fn check_invariant_violations(
        &self,
        proposal: &Proposal,
        ctx: &EvaluationContext<'_>,
    ) -> Option<GuardrailReason> {
        let campaign_ref = &proposal.campaign_ref;

        // I3: platform-wide confirmed budget ceiling.
        if let (Some(ceiling), Some(new_budget)) =
            (ctx.platform_budget_ceiling, budget_target(&proposal.kind))
        {
            let delta = new_budget - ctx.campaign.daily_budget;
            if ctx.platform_confirmed_budget_total + delta > ceiling {
                return Some(GuardrailReason::PlatformBudgetCeilingExceeded);
            }
        }

        // I4: daily adjustment cap.
        let max_adjustments = self.guardrails.max_daily_adjustments_for(campaign_ref);
        if ctx.daily_counters.would_exceed_adjustment_cap(max_adjustments) {
            return Some(GuardrailReason::DailyAdjustmentCapExceeded);
        }

        // I5: cumulative per-campaign budget delta cap.
        if let Some(change_fraction) = budget_change_fraction(&proposal.kind, ctx.campaign.daily_budget) {
            let cap = self.guardrails.max_single_budget_increase_fraction_for(campaign_ref);
            if ctx
                .daily_counters
                .would_exceed_reallocation_cap(change_fraction.abs(), cap)
            {
                return Some(GuardrailReason::SingleCampaignDailyDeltaCapExceeded);
            }
        }

        None
    }
}

pub(crate) fn budget_target(kind: &ProposalKind) -> Option<Decimal> {
    match kind {
        ProposalKind::IncreaseBudget { new_daily_budget } => Some(*new_daily_budget),
        ProposalKind::DecreaseBudget { new_daily_budget } => Some(*new_daily_budget),
        _ => None,
    }
}

/// Absolute change as a fraction of the campaign's current daily budget.
/// `None` for kinds that don't move money (`Pause`/`Resume`). Reallocate's
/// `amount` is already absolute, not a target, so it's compared directly
/// against the current budget.
pub(crate) fn budget_change_fraction(kind: &ProposalKind, current_budget: Decimal) -> Option<Decimal> {
    if current_budget.is_zero() {
        return None;
    }
    match kind {
        ProposalKind::IncreaseBudget { new_daily_budget } | ProposalKind::DecreaseBudget { new_daily_budget } => {
            Some(((*new_daily_budget - current_budget) / current_budget).abs())
        }
        ProposalKind::Reallocate { amount, .. } => Some((*amount / current_budget).abs()),
        ProposalKind::Pause | ProposalKind::Resume => None,
    }
}

fn is_high_impact_kind(_kind: &ProposalKind) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignRef, CampaignStatus, ExpectedImpact, ImpactDirection, PlatformId};
    use chrono::Utc;
    use std::collections::HashMap;

    fn guardrails() -> Guardrails {
        Guardrails {
            confidence_threshold: 0.85,
            max_daily_adjustments: 3,
            max_budget_reallocation_fraction_per_day: Decimal::new(25, 2),
            max_single_budget_increase_fraction: Decimal::new(50, 2),
            min_campaign_runtime_hours_before_pause: 72,
            major_change_fraction: Decimal::new(20, 2),
            overrides: HashMap::new(),
            platform_budget_ceilings: HashMap::new(),
        }
    }

    fn campaign(age_hours: i64) -> Campaign {
        let created_at = Utc::now() - chrono::Duration::hours(age_hours);
        Campaign {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            name: "test".to_string(),
            status: CampaignStatus::Enabled,
            daily_budget: Decimal::new(10000, 2),
            objective: "conversions".to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    fn proposal(kind: ProposalKind, confidence: f64) -> Proposal {
        Proposal {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            kind,
            confidence,
            rationale: "test".to_string(),
            expected_impact: ExpectedImpact {
                metric: "roas".to_string(),
                direction: ImpactDirection::Increase,
                magnitude: Decimal::new(10, 2),
            },
            generated_at: Utc::now(),
        }
    }

    fn ctx<'a>(campaign: &'a Campaign) -> EvaluationContext<'a> {
        EvaluationContext {
            campaign,
            daily_counters: &DailyCounters::default(),
            platform_confirmed_budget_total: Decimal::ZERO,
            platform_budget_ceiling: None,
            automation_level: AutomationLevel::Full,
            manual_override: false,
            now: Utc::now(),
        }
    }

    #[test]
    fn r1_low_confidence_rejects_before_any_other_rule() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(200);
        let decision = gate.evaluate(proposal(ProposalKind::Pause, 0.78), &ctx(&campaign));
        assert!(matches!(decision, Decision::Rejected { reason: GuardrailReason::LowConfidence, .. }));
    }

    #[test]
    fn confidence_equal_to_threshold_is_accepted_not_rejected() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(200);
        let decision = gate.evaluate(proposal(ProposalKind::Pause, 0.85), &ctx(&campaign));
        assert!(!matches!(decision, Decision::Rejected { reason: GuardrailReason::LowConfidence, .. }));
    }

    #[test]
    fn r2_pause_blocked_by_insufficient_runtime() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(40);
        let decision = gate.evaluate(proposal(ProposalKind::Pause, 0.95), &ctx(&campaign));
        assert!(matches!(decision, Decision::Rejected { reason: GuardrailReason::InsufficientRuntime, .. }));
    }

    #[test]
    fn r4_major_change_requires_approval_but_not_rejection() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(200);
        let kind = ProposalKind::IncreaseBudget { new_daily_budget: Decimal::new(13000, 2) };
        let decision = gate.evaluate(proposal(kind, 0.90), &ctx(&campaign));
        assert!(matches!(decision, Decision::ApprovalRequired { reason: GuardrailReason::MajorChange, .. }));
    }

    #[test]
    fn r6_within_limits_auto_executes() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(200);
        let kind = ProposalKind::DecreaseBudget { new_daily_budget: Decimal::new(8000, 2) };
        let decision = gate.evaluate(proposal(kind, 0.93), &ctx(&campaign));
        assert!(matches!(decision, Decision::AutoExecute { reason: GuardrailReason::WithinLimits, .. }));
    }

    #[test]
    fn advisory_automation_forces_approval_even_within_limits() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(200);
        let kind = ProposalKind::DecreaseBudget { new_daily_budget: Decimal::new(8000, 2) };
        let mut context = ctx(&campaign);
        context.automation_level = AutomationLevel::Advisory;
        let decision = gate.evaluate(proposal(kind, 0.93), &context);
        assert!(matches!(decision, Decision::ApprovalRequired { reason: GuardrailReason::WithinLimits, .. }));
    }

    #[test]
    fn semi_automation_forces_any_budget_change_to_need_approval() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(200);
        let kind = ProposalKind::DecreaseBudget { new_daily_budget: Decimal::new(9900, 2) };
        let mut context = ctx(&campaign);
        context.automation_level = AutomationLevel::Semi;
        let decision = gate.evaluate(proposal(kind, 0.93), &context);
        assert!(matches!(decision, Decision::ApprovalRequired { reason: GuardrailReason::MajorChange, .. }));
    }

    #[test]
    fn daily_adjustment_cap_rejects_via_r3() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(200);
        let mut context = ctx(&campaign);
        let counters = DailyCounters { adjustments_made: 3, ..Default::default() };
        context.daily_counters = &counters;
        let decision = gate.evaluate(proposal(ProposalKind::Resume, 0.95), &context);
        assert!(matches!(decision, Decision::Rejected { reason: GuardrailReason::DailyAdjustmentCapExceeded, .. }));
    }

    #[test]
    fn manual_override_bypasses_every_rule() {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign(10);
        let mut context = ctx(&campaign);
        context.manual_override = true;
        let decision = gate.evaluate(proposal(ProposalKind::Pause, 0.1), &context);
        assert!(matches!(decision, Decision::AutoExecute { reason: GuardrailReason::ManualOverride, .. }));
    }
}
