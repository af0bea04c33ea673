//! The append-only Action Ledger and its recovery contract (§4.5). Storage
//! shape lives in [`models`]; the trait + SQLite implementation live in
//! [`repository`].

mod models;
mod repository;

pub use models::{ConfigHistoryRow, SystemEventRow};
pub use repository::{
    recover_daily_counters, CampaignRepository, LedgerRepository, SqliteCampaignRepository,
    SqliteLedgerRepository,
};

use crate::domain::LedgerEvent;

/// Emits a structured event alongside a ledger write, for operators and
/// downstream observability to subscribe to without re-parsing
/// `ActionRecord` rows, and durably persists it via `ledger` (§4.3
/// TICK_FAILED/TICK_SKIPPED rows, §8 scenario 5 PLATFORM_EXCLUDED). The
/// tracing line is a live notification; the `system_events` row the
/// repository writes is the fact an operator can audit after the fact —
/// §7 "there are no silent failures" applies to tick-lifecycle events the
/// same way it applies to `ActionRecord`s.
pub async fn emit_ledger_event(ledger: &dyn LedgerRepository, event: &LedgerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!(event = %json, "ledger event"),
        Err(e) => tracing::warn!(error = %e, "failed to serialise ledger event"),
    }
    if let Err(e) = ledger.record_event(event).await {
        tracing::error!(error = %e, "failed to persist ledger event; audit trail incomplete");
    }
}
