//! Approval queue for `APPROVAL_REQUIRED` decisions (§4.4). Entries expire
//! after a configurable TTL; a sweep auto-rejects anything still pending
//! past its deadline with outcome `EXPIRED` rather than leaving it to
//! silently rot.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Decision, GuardrailReason, Proposal};

#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub id: Uuid,
    pub proposal: Proposal,
    pub reason: GuardrailReason,
    pub queued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What happened to a pending entry when an operator or the sweeper acts
/// on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalResolution {
    Approved,
    Rejected,
    /// The TTL elapsed before anyone acted.
    Expired,
    /// The entry was already resolved — returned instead of double-acting
    /// on it, so a late approval racing a sweep gets a clear conflict
    /// signal rather than silently executing twice (§8 scenario 6).
    AlreadyResolved,
}

#[derive(Default)]
pub struct ApprovalQueue {
    pending: HashMap<Uuid, PendingApproval>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self { pending: HashMap::new() }
    }

    /// Enqueues an `ApprovalRequired` decision. Panics if handed anything
    /// else — callers are expected to have already matched on the
    /// decision's outcome.
    pub fn enqueue(&mut self, decision: Decision, now: DateTime<Utc>, ttl: Duration) -> Uuid {
        let Decision::ApprovalRequired { proposal, reason } = decision else {
            panic!("only ApprovalRequired decisions belong in the approval queue");
        };
        let id = Uuid::new_v4();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(4));
        self.pending.insert(id, PendingApproval { id, proposal, reason, queued_at: now, expires_at });
        id
    }

    pub fn list_pending(&self) -> Vec<&PendingApproval> {
        self.pending.values().collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&PendingApproval> {
        self.pending.get(&id)
    }

    /// Approves a pending entry, returning the proposal to execute.
    /// Returns `AlreadyResolved` if it was removed (approved, rejected, or
    /// expired) before this call arrived.
    pub fn approve(&mut self, id: Uuid) -> Result<Proposal, ApprovalResolution> {
        match self.pending.remove(&id) {
            Some(entry) => Ok(entry.proposal),
            None => Err(ApprovalResolution::AlreadyResolved),
        }
    }

    pub fn reject(&mut self, id: Uuid) -> ApprovalResolution {
        match self.pending.remove(&id) {
            Some(_) => ApprovalResolution::Rejected,
            None => ApprovalResolution::AlreadyResolved,
        }
    }

    /// Removes every entry whose TTL has elapsed as of `now`, returning
    /// them so the caller can ledger an `EXPIRED` `ActionRecord` for each.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<PendingApproval> {
        let expired_ids: Vec<Uuid> = self
            .pending
            .values()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.id)
            .collect();
        expired_ids.iter().filter_map(|id| self.pending.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignRef, ExpectedImpact, ImpactDirection, PlatformId, ProposalKind};
    use rust_decimal::Decimal;

    fn proposal() -> Proposal {
        Proposal {
            campaign_ref: CampaignRef::new(PlatformId::GoogleAds, "G1"),
            kind: ProposalKind::IncreaseBudget { new_daily_budget: Decimal::new(13000, 2) },
            confidence: 0.9,
            rationale: "roas trending up".to_string(),
            expected_impact: ExpectedImpact {
                metric: "roas".to_string(),
                direction: ImpactDirection::Increase,
                magnitude: Decimal::new(15, 2),
            },
            generated_at: Utc::now(),
        }
    }

    fn decision() -> Decision {
        Decision::ApprovalRequired { proposal: proposal(), reason: GuardrailReason::MajorChange }
    }

    #[test]
    fn approve_returns_the_queued_proposal_once() {
        let mut queue = ApprovalQueue::new();
        let id = queue.enqueue(decision(), Utc::now(), Duration::from_secs(4 * 60 * 60));
        assert!(queue.approve(id).is_ok());
        assert_eq!(queue.approve(id).unwrap_err(), ApprovalResolution::AlreadyResolved);
    }

    #[test]
    fn sweep_expires_entries_past_their_ttl() {
        let mut queue = ApprovalQueue::new();
        let queued_at = Utc::now() - chrono::Duration::hours(5);
        let id = queue.enqueue(decision(), queued_at, Duration::from_secs(4 * 60 * 60));

        let expired = queue.sweep_expired(Utc::now());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, id);
        assert_eq!(queue.approve(id).unwrap_err(), ApprovalResolution::AlreadyResolved);
    }

    #[test]
    fn sweep_leaves_unexpired_entries_pending() {
        let mut queue = ApprovalQueue::new();
        queue.enqueue(decision(), Utc::now(), Duration::from_secs(4 * 60 * 60));
        let expired = queue.sweep_expired(Utc::now());
        assert!(expired.is_empty());
        assert_eq!(queue.list_pending().len(), 1);
    }

    #[test]
    fn approval_racing_a_sweep_gets_already_resolved_not_a_double_execution() {
        let mut queue = ApprovalQueue::new();
        let queued_at = Utc::now() - chrono::Duration::hours(5);
        let id = queue.enqueue(decision(), queued_at, Duration::from_secs(4 * 60 * 60));
        queue.sweep_expired(Utc::now());
        assert_eq!(queue.approve(id).unwrap_err(), ApprovalResolution::AlreadyResolved);
    }
}
