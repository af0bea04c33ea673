use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::platform::CampaignRef;

/// A single recommended change to a campaign, produced by the LLM Analyst
/// and carried through Gating and Execution unmodified except for its
/// outcome (§4.3/§4.4). Proposals are never mutated once gated — a rejected
/// or expired proposal is simply never re-issued; the next tick produces a
/// fresh one if the condition still holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub campaign_ref: CampaignRef,
    pub kind: ProposalKind,
    /// Analyst's confidence in [0, 1]; compared against
    /// `confidence_threshold` at Gating (§6).
    pub confidence: f64,
    pub rationale: String,
    pub expected_impact: ExpectedImpact,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProposalKind {
    Pause,
    Resume,
    IncreaseBudget { new_daily_budget: Decimal },
    DecreaseBudget { new_daily_budget: Decimal },
    Reallocate { from: CampaignRef, to: CampaignRef, amount: Decimal },
}

impl ProposalKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProposalKind::Pause => "pause",
            ProposalKind::Resume => "resume",
            ProposalKind::IncreaseBudget { .. } => "increase_budget",
            ProposalKind::DecreaseBudget { .. } => "decrease_budget",
            ProposalKind::Reallocate { .. } => "reallocate",
        }
    }

    /// Whether this kind moves money, as opposed to changing only run state.
    /// Budget guardrail rules (R3-R5) only apply to these (§4.4).
    pub fn is_budget_change(&self) -> bool {
        matches!(
            self,
            ProposalKind::IncreaseBudget { .. }
                | ProposalKind::DecreaseBudget { .. }
                | ProposalKind::Reallocate { .. }
        )
    }
}

/// What the analyst expects the change to accomplish, carried for audit and
/// surfaced to a human approver — never used by the Guardrail Gate itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectedImpact {
    pub metric: String,
    pub direction: ImpactDirection,
    /// Expected relative change, e.g. 0.15 for "roas +15%".
    pub magnitude: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpactDirection {
    Increase,
    Decrease,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::PlatformId;

    #[test]
    fn budget_change_kinds_are_flagged() {
        let pause = ProposalKind::Pause;
        let increase = ProposalKind::IncreaseBudget { new_daily_budget: Decimal::new(10000, 2) };
        assert!(!pause.is_budget_change());
        assert!(increase.is_budget_change());
    }

    #[test]
    fn reallocate_carries_both_campaign_refs() {
        let kind = ProposalKind::Reallocate {
            from: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            to: CampaignRef::new(PlatformId::MetaAds, "M1"),
            amount: Decimal::new(5000, 2),
        };
        assert_eq!(kind.label(), "reallocate");
    }
}
