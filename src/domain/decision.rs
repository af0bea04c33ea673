use serde::{Deserialize, Serialize};

use super::proposal::Proposal;

/// Output of the Guardrail Gate for a single proposal (§4.4). Every
/// proposal that reaches Gating ends up tagged with exactly one of these
/// and always carries a justification — there is no "defer" outcome,
/// since a deferred proposal would just be regenerated next tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// Passed every rule (R6); proceeds straight to Execution.
    AutoExecute { proposal: Proposal, reason: GuardrailReason },
    /// Tripped a rule that requires a human in the loop rather than an
    /// outright rejection (R4, R5); parked in the approval queue with a
    /// TTL.
    ApprovalRequired { proposal: Proposal, reason: GuardrailReason },
    /// Tripped a hard limit (R1-R3); never executed, never re-queued.
    Rejected { proposal: Proposal, reason: GuardrailReason },
}

impl Decision {
    pub fn proposal(&self) -> &Proposal {
        match self {
            Decision::AutoExecute { proposal, .. } => proposal,
            Decision::ApprovalRequired { proposal, .. } => proposal,
            Decision::Rejected { proposal, .. } => proposal,
        }
    }

    pub fn reason(&self) -> &GuardrailReason {
        match self {
            Decision::AutoExecute { reason, .. } => reason,
            Decision::ApprovalRequired { reason, .. } => reason,
            Decision::Rejected { reason, .. } => reason,
        }
    }
}

/// Which guardrail rule produced a decision, and why. One variant per rule
/// in §4.4's R1-R6 table (in evaluation order), carried into the ledger so
/// an audit can answer "which rule fired" without re-deriving it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GuardrailReason {
    /// R1: confidence below `confidence_threshold`.
    LowConfidence,
    /// R2: `PAUSE` proposed on a campaign younger than
    /// `min_campaign_runtime_hours_before_pause`.
    InsufficientRuntime,
    /// R3, against I3: would push a platform's confirmed daily budget sum
    /// over its configured ceiling.
    PlatformBudgetCeilingExceeded,
    /// R3, against I4: would exceed `max_daily_adjustments` for this
    /// campaign today.
    DailyAdjustmentCapExceeded,
    /// R3, against I5: cumulative absolute budget delta for this campaign
    /// today would exceed `max_single_budget_increase_fraction`.
    SingleCampaignDailyDeltaCapExceeded,
    /// R4: absolute budget change fraction exceeds `major_change_fraction`.
    MajorChange,
    /// R5: proposal kind is inherently high-impact regardless of size.
    HighImpactKind,
    /// R6: none of the above triggered.
    WithinLimits,
    /// An operator has manually overridden the gate for this campaign.
    ManualOverride,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::{CampaignRef, PlatformId};
    use crate::domain::proposal::{ExpectedImpact, ImpactDirection, ProposalKind};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn proposal() -> Proposal {
        Proposal {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            kind: ProposalKind::Pause,
            confidence: 0.4,
            rationale: "roas below floor".to_string(),
            expected_impact: ExpectedImpact {
                metric: "roas".to_string(),
                direction: ImpactDirection::Increase,
                magnitude: Decimal::new(10, 2),
            },
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn decision_exposes_its_proposal_and_reason_regardless_of_outcome() {
        let d = Decision::Rejected { proposal: proposal(), reason: GuardrailReason::LowConfidence };
        assert_eq!(d.proposal().kind.label(), "pause");
        assert_eq!(d.reason(), &GuardrailReason::LowConfidence);
    }
}
