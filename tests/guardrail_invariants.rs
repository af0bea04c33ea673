//! Property-based tests over the Guardrail Gate's invariants (I1-I6,
//! confidence/TTL boundary behaviour), using `proptest` the way the
//! teacher's `tests/property_tests.rs` exercises its cost calculator:
//! random inputs, fixed assertions about what must always hold.

use std::collections::HashMap;

use adbudget_core::config::AutomationLevel;
use adbudget_core::domain::{
    Campaign, CampaignRef, CampaignStatus, Decision, DailyCounters, ExpectedImpact, GuardrailReason,
    Guardrails, ImpactDirection, PlatformId, Proposal, ProposalKind,
};
use adbudget_core::guardrail::{EvaluationContext, GuardrailGate};
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

const CONFIDENCE_THRESHOLD: f64 = 0.85;
const MIN_RUNTIME_HOURS: i64 = 72;
const MAX_DAILY_ADJUSTMENTS: u32 = 5;
const MAJOR_CHANGE_FRACTION: &str = "0.20";

fn guardrails() -> Guardrails {
    Guardrails {
        confidence_threshold: CONFIDENCE_THRESHOLD,
        max_daily_adjustments: MAX_DAILY_ADJUSTMENTS,
        max_budget_reallocation_fraction_per_day: Decimal::new(50, 2),
        max_single_budget_increase_fraction: Decimal::new(50, 2),
        min_campaign_runtime_hours_before_pause: MIN_RUNTIME_HOURS,
        major_change_fraction: MAJOR_CHANGE_FRACTION.parse().unwrap(),
        overrides: HashMap::new(),
        platform_budget_ceilings: HashMap::new(),
    }
}

fn campaign_with_age(age_hours: i64, daily_budget: Decimal) -> Campaign {
    let created_at = Utc::now() - chrono::Duration::hours(age_hours);
    Campaign {
        campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "PROPTEST-1"),
        name: "proptest campaign".to_string(),
        status: CampaignStatus::Enabled,
        daily_budget,
        objective: "conversions".to_string(),
        created_at,
        updated_at: created_at,
    }
}

fn proposal(kind: ProposalKind, confidence: f64) -> Proposal {
    Proposal {
        campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "PROPTEST-1"),
        kind,
        confidence,
        rationale: "proptest-generated".to_string(),
        expected_impact: ExpectedImpact {
            metric: "roas".to_string(),
            direction: ImpactDirection::Increase,
            magnitude: Decimal::new(10, 2),
        },
        generated_at: Utc::now(),
    }
}

fn base_ctx(campaign: &Campaign) -> EvaluationContext<'_> {
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

proptest! {
    /// R1 (I: confidence floor): any confidence strictly below the
    /// threshold is rejected for `LowConfidence`, regardless of what kind
    /// of proposal it is or how old the campaign is, as long as no earlier
    /// rule could fire first (a runtime old enough that R2 never triggers).
    #[test]
    fn confidence_below_threshold_always_rejects(
        confidence in 0.0f64..CONFIDENCE_THRESHOLD,
        age_hours in (MIN_RUNTIME_HOURS + 1)..10_000i64,
    ) {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign_with_age(age_hours, Decimal::new(10000, 2));
        let decision = gate.evaluate(proposal(ProposalKind::Pause, confidence), &base_ctx(&campaign));
        prop_assert!(matches!(
            decision,
            Decision::Rejected { reason: GuardrailReason::LowConfidence, .. }
        ));
    }

    /// Boundary behaviour (§8): confidence exactly at the threshold is
    /// accepted, never rejected for `LowConfidence` — R1 uses `<`, not
    /// `<=`.
    #[test]
    fn confidence_at_or_above_threshold_never_rejects_for_low_confidence(
        delta in 0.0f64..0.15,
        age_hours in (MIN_RUNTIME_HOURS + 1)..10_000i64,
    ) {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign_with_age(age_hours, Decimal::new(10000, 2));
        let confidence = (CONFIDENCE_THRESHOLD + delta).min(1.0);
        let decision = gate.evaluate(proposal(ProposalKind::Pause, confidence), &base_ctx(&campaign));
        prop_assert!(!matches!(
            decision,
            Decision::Rejected { reason: GuardrailReason::LowConfidence, .. }
        ));
    }

    /// R2/I6: a pause is never auto-executed (or even left un-rejected) on
    /// a campaign younger than the configured minimum runtime, for any
    /// confidence that clears R1.
    #[test]
    fn pause_below_minimum_runtime_is_always_rejected(
        age_hours in 0i64..MIN_RUNTIME_HOURS,
        confidence in CONFIDENCE_THRESHOLD..=1.0,
    ) {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign_with_age(age_hours, Decimal::new(10000, 2));
        let decision = gate.evaluate(proposal(ProposalKind::Pause, confidence), &base_ctx(&campaign));
        prop_assert!(matches!(
            decision,
            Decision::Rejected { reason: GuardrailReason::InsufficientRuntime, .. }
        ));
    }

    /// I4: once today's adjustment count has reached the cap, no further
    /// proposal auto-executes — it is rejected via R3, regardless of how
    /// confident or how small the change is.
    #[test]
    fn daily_adjustment_cap_blocks_every_further_auto_execution(
        confidence in CONFIDENCE_THRESHOLD..=1.0,
        extra_adjustments in 0u32..10,
    ) {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign_with_age(MIN_RUNTIME_HOURS + 1000, Decimal::new(10000, 2));
        let counters = DailyCounters {
            adjustments_made: MAX_DAILY_ADJUSTMENTS + extra_adjustments,
            ..Default::default()
        };
        let mut ctx = base_ctx(&campaign);
        ctx.daily_counters = &counters;
        let decision = gate.evaluate(proposal(ProposalKind::Resume, confidence), &ctx);
        prop_assert!(matches!(
            decision,
            Decision::Rejected { reason: GuardrailReason::DailyAdjustmentCapExceeded, .. }
        ));
    }

    /// I5: a cumulative per-campaign budget delta that would push the
    /// day's total reallocated fraction over the cap is rejected via R3,
    /// even though the single change in isolation would pass R4.
    #[test]
    fn single_campaign_daily_delta_cap_is_never_exceeded_by_auto_execution(
        already_reallocated in "0\\.[0-4][0-9]",
        confidence in CONFIDENCE_THRESHOLD..=1.0,
    ) {
        let gate = GuardrailGate::new(guardrails());
        let current_budget = Decimal::new(10000, 2);
        let campaign = campaign_with_age(MIN_RUNTIME_HOURS + 1000, current_budget);
        let counters = DailyCounters {
            budget_reallocated_fraction: already_reallocated.parse().unwrap(),
            ..Default::default()
        };
        let mut ctx = base_ctx(&campaign);
        ctx.daily_counters = &counters;

        // A fresh 15% decrease: passes R4 (below the 20% major threshold)
        // in isolation, but may push the cumulative total over the 50%
        // single-campaign cap depending on what's already been spent today.
        let new_budget = current_budget * Decimal::new(85, 2);
        let kind = ProposalKind::DecreaseBudget { new_daily_budget: new_budget };
        let decision = gate.evaluate(proposal(kind, confidence), &ctx);

        let already: Decimal = already_reallocated.parse().unwrap();
        if already + Decimal::new(15, 2) > Decimal::new(50, 2) {
            prop_assert!(matches!(
                decision,
                Decision::Rejected { reason: GuardrailReason::SingleCampaignDailyDeltaCapExceeded, .. }
            ));
        } else {
            prop_assert!(!matches!(decision, Decision::Rejected { .. }));
        }
    }

    /// Every decision the gate returns carries a proposal identical to the
    /// one handed in — the gate classifies, it never mutates (§4.4: "never
    /// silently drops or mutates one").
    #[test]
    fn gate_never_mutates_the_proposal_it_classifies(
        confidence in 0.0f64..=1.0,
        age_hours in 0i64..500,
    ) {
        let gate = GuardrailGate::new(guardrails());
        let campaign = campaign_with_age(age_hours, Decimal::new(10000, 2));
        let original = proposal(ProposalKind::Resume, confidence);
        let expected = original.clone();
        let decision = gate.evaluate(original, &base_ctx(&campaign));
        prop_assert_eq!(decision.proposal(), &expected);
    }
}
