//! End-to-end tick scenarios against a real (temp-file) SQLite database,
//! with mock adapters and a scripted analyst response — covering the
//! literal scenarios the decision engine is built around: an increase that
//! needs approval, a decrease that auto-executes, and a proposal rejected
//! for low confidence.

mod helpers;

use std::sync::Arc;

use adbudget_core::adapters::{AdapterRegistry, MockAdapter};
use adbudget_core::config::Config;
use adbudget_core::domain::{ActionOutcome, CampaignRef, ExpectedImpact, ImpactDirection, PlatformId, Proposal, ProposalKind};
use adbudget_core::engine::DecisionEngine;
use adbudget_core::ledger::{LedgerRepository, SqliteCampaignRepository, SqliteLedgerRepository};
use adbudget_core::llm_analyst::{AnalysisResponse, MockLlmAnalystClient, OverallHealth};
use adbudget_core::normalizer::{FxTable, MetricNormalizer};
use chrono::Utc;
use rust_decimal::Decimal;

fn fixture_campaign_ref() -> CampaignRef {
    CampaignRef::new(PlatformId::GoogleAds, "FIXTURE-1")
}

fn proposal(kind: ProposalKind, confidence: f64) -> Proposal {
    Proposal {
        campaign_ref: fixture_campaign_ref(),
        kind,
        confidence,
        rationale: "trailing roas trend".to_string(),
        expected_impact: ExpectedImpact { metric: "roas".to_string(), direction: ImpactDirection::Increase, magnitude: Decimal::new(15, 2) },
        generated_at: Utc::now(),
    }
}

async fn build_engine(analyst_response: AnalysisResponse) -> Arc<DecisionEngine> {
    let (engine, _ledger) = build_engine_with_ledger(analyst_response).await;
    engine
}

/// Like [`build_engine`], but also hands back the ledger handle so a test
/// can query the audit trail directly rather than only through the
/// engine's own summarising accessors.
async fn build_engine_with_ledger(analyst_response: AnalysisResponse) -> (Arc<DecisionEngine>, Arc<SqliteLedgerRepository>) {
    let (pool, _temp_dir) = helpers::create_test_sqlite_db().await;
    let ledger = Arc::new(SqliteLedgerRepository::new(pool.clone()));
    let campaigns = Arc::new(SqliteCampaignRepository::new(pool));

    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(MockAdapter::new(PlatformId::GoogleAds)));

    let normalizer = MetricNormalizer::new(FxTable::default());
    let analyst = Arc::new(MockLlmAnalystClient::new(analyst_response));
    let config = Config::default_sqlite();

    let engine = DecisionEngine::new(&config, adapters, normalizer, analyst, ledger.clone(), campaigns).await.unwrap();
    (Arc::new(engine), ledger)
}

#[tokio::test]
async fn major_budget_increase_requires_approval_not_auto_execution() {
    let response = AnalysisResponse {
        proposals: vec![proposal(ProposalKind::IncreaseBudget { new_daily_budget: Decimal::new(13000, 2) }, 0.90)],
        overall_health: OverallHealth::Good,
    };
    let engine = build_engine(response).await;

    let outcome = engine.run_tick().await.unwrap();
    assert!(!outcome.skipped);
    assert_eq!(outcome.proposals_seen, 1);

    let pending = engine.list_pending_approvals().await;
    assert_eq!(pending.len(), 1);
    assert!(matches!(pending[0].proposal.kind, ProposalKind::IncreaseBudget { .. }));
}

#[tokio::test]
async fn modest_budget_decrease_auto_executes() {
    let response = AnalysisResponse {
        proposals: vec![proposal(ProposalKind::DecreaseBudget { new_daily_budget: Decimal::new(8000, 2) }, 0.93)],
        overall_health: OverallHealth::Fair,
    };
    let engine = build_engine(response).await;

    let outcome = engine.run_tick().await.unwrap();
    assert_eq!(outcome.records_written, 1);

    let recent = engine.get_recent_actions(Some(&fixture_campaign_ref()), 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(matches!(recent[0].outcome, ActionOutcome::Success));
}

#[tokio::test]
async fn low_confidence_proposal_is_rejected_without_an_adapter_call() {
    let response = AnalysisResponse {
        proposals: vec![proposal(ProposalKind::Pause, 0.5)],
        overall_health: OverallHealth::Poor,
    };
    let engine = build_engine(response).await;

    let outcome = engine.run_tick().await.unwrap();
    assert_eq!(outcome.records_written, 1);

    let recent = engine.get_recent_actions(Some(&fixture_campaign_ref()), 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(matches!(recent[0].outcome, ActionOutcome::Rejected { .. }));
}

#[tokio::test]
async fn a_tick_s_recorded_inputs_hash_is_found_by_the_replay_dedup_lookup() {
    // §4.3 step 3: before calling the analyst, the engine looks up
    // `inputs_hash` in the ledger and treats a hit as "already processed,"
    // writing nothing. A real retry never repeats the exact same
    // `AnalysisRequest` here — the trailing window grows by the sample the
    // prior attempt itself wrote — so the only way to exercise the lookup
    // honestly is to confirm it actually resolves the hash a tick records,
    // the same check `run_tick_inner` performs inline (engine/mod.rs).
    let response = AnalysisResponse {
        proposals: vec![proposal(ProposalKind::Pause, 0.5)],
        overall_health: OverallHealth::Good,
    };
    let (engine, ledger) = build_engine_with_ledger(response).await;

    let outcome = engine.run_tick().await.unwrap();
    assert_eq!(outcome.records_written, 1);

    let recorded = engine.get_recent_actions(Some(&fixture_campaign_ref()), 10).await.unwrap();
    assert_eq!(recorded.len(), 1);
    let inputs_hash = recorded[0].inputs_hash.clone();
    assert!(!inputs_hash.is_empty());

    let found = ledger.find_by_inputs_hash(&inputs_hash).await.unwrap();
    assert_eq!(found.unwrap().id, recorded[0].id);

    assert!(ledger.find_by_inputs_hash("not-a-real-hash").await.unwrap().is_none());
}
