//! Autonomous optimization core for a cross-platform advertising budget
//! manager: ingest campaign performance from heterogeneous ad-platform
//! adapters, hand the aggregated state to an LLM analyst, gate the
//! returned proposals against hard safety invariants, execute the
//! survivors (or queue them for approval), and ledger every outcome.
//!
//! The four layers, leaves first: [`normalizer`] folds adapter output into
//! uniform [`domain::MetricSample`]s; [`adapters`] fronts every ad
//! platform through one capability set; [`ledger`] is the append-only
//! history; [`guardrail`] classifies proposals against the invariants in
//! [`domain::Guardrails`]; [`engine`] drives the tick loop that wires them
//! all together. [`llm_analyst`] is the external collaborator reached once
//! per tick. [`config`] and [`observability`] are the ambient stack every
//! layer draws on.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod guardrail;
pub mod ledger;
pub mod llm_analyst;
pub mod normalizer;
pub mod observability;

pub use domain::{CoreError, Result};

/// Library version, exposed for the CLI's `--version` banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the global `tracing` subscriber from `config`. Call once at
/// process startup, before constructing a [`engine::DecisionEngine`].
pub fn init(logging: &config::LoggingConfig) -> std::result::Result<(), String> {
    observability::init_tracing(logging)
}
