//! Core types shared by every other module: campaigns, metrics, proposals,
//! decisions, the action ledger, and the error taxonomy they all return.

mod action_record;
mod campaign;
mod decision;
mod error;
mod guardrails;
mod metric_sample;
mod platform;
mod proposal;

pub use action_record::{ActionOutcome, ActionRecord, LedgerEvent};
pub use campaign::{Campaign, CampaignStatus};
pub use decision::{Decision, GuardrailReason};
pub use error::{CoreError, Result};
pub use guardrails::{DailyCounters, GuardrailOverride, Guardrails};
pub use metric_sample::MetricSample;
pub use platform::{CampaignRef, PlatformId};
pub use proposal::{ExpectedImpact, ImpactDirection, Proposal, ProposalKind};
