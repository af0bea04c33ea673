//! Argument definitions for `adctl`, the operator-facing binary over the
//! four inbound control-surface verbs (§6) plus database setup and a
//! manual tick for local testing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "adctl")]
#[command(about = "Cross-platform advertising budget optimization core", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file path (TOML). Falls back to built-in defaults
    /// layered with `ADBUDGET_` environment variables when absent.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Comma-separated mock platforms to register when no real adapter
    /// credentials are configured (e.g. `google_ads,meta_ads`).
    #[arg(long, value_delimiter = ',', default_value = "google_ads")]
    pub mock_platforms: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema if it does not already exist.
    Init {
        /// Overrides the configured database URL.
        #[arg(long)]
        database_url: Option<String>,
    },

    /// Runs the scheduler loop, ticking at the configured cadence until
    /// interrupted.
    Run,

    /// Runs exactly one tick and prints its outcome, without starting the
    /// scheduler loop.
    Tick,

    /// Inspect and resolve approval-queue entries (§6).
    Approvals {
        #[command(subcommand)]
        command: ApprovalCommands,
    },

    /// Lists recent ledger entries.
    Actions {
        /// Restrict to one campaign, given as `platform_id/external_id`.
        #[arg(long)]
        campaign: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Lists recent config/guardrail changes.
    ConfigHistory {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Installs a time-boxed per-campaign guardrail override (§6).
    OverrideGuardrail {
        /// Campaign to override, as `platform_id/external_id`.
        #[arg(long)]
        campaign: String,

        #[arg(long)]
        confidence_threshold: Option<f64>,

        #[arg(long)]
        max_daily_adjustments: Option<u32>,

        #[arg(long)]
        major_change_fraction: Option<String>,

        /// How long the override stays in effect before it auto-reverts.
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,

        /// Operator name recorded alongside the change.
        #[arg(long)]
        operator: String,
    },

    /// Reports liveness/readiness of the database and registered adapters.
    Health,
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// Lists every approval currently pending an operator decision.
    List,

    /// Approves a pending proposal, executing it immediately (subject to
    /// a guardrail re-check, not re-analysis).
    Approve { id: Uuid },

    /// Rejects a pending proposal without executing it.
    Reject {
        id: Uuid,
        #[arg(long, default_value = "operator rejected")]
        reason: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parses a `platform_id/external_id` campaign reference as given on the
/// command line; same shape as [`crate::domain::CampaignRef`]'s `Display`.
pub fn parse_campaign_ref(s: &str) -> Result<crate::domain::CampaignRef, String> {
    let (platform, external_id) = s
        .split_once('/')
        .ok_or_else(|| format!("expected `platform_id/external_id`, got {s:?}"))?;
    if external_id.is_empty() {
        return Err(format!("expected `platform_id/external_id`, got {s:?}"));
    }
    Ok(crate::domain::CampaignRef::new(crate::domain::PlatformId::parse(platform), external_id))
}
