use std::sync::Arc;
use std::time::Duration;

use adbudget_core::adapters::{AdapterRegistry, MockAdapter};
use adbudget_core::cli::{parse_campaign_ref, ApprovalCommands, Cli, Commands};
use adbudget_core::config::Config;
use adbudget_core::domain::{GuardrailOverride, PlatformId};
use adbudget_core::engine::{DecisionEngine, TickScheduler};
use adbudget_core::ledger::{SqliteCampaignRepository, SqliteLedgerRepository};
use adbudget_core::llm_analyst::{HttpLlmAnalystClient, LlmAnalystClient, MockLlmAnalystClient};
use adbudget_core::normalizer::{FxTable, MetricNormalizer};
use adbudget_core::observability::{DatabaseHealthCheck, HealthChecker};
use anyhow::Result;
use console::style;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config = Config::load(cli.config.as_deref())?;
    adbudget_core::init(&config.logging).map_err(|e| anyhow::anyhow!(e))?;

    info!("adbudget-core v{}", adbudget_core::VERSION);

    match &cli.command {
        Commands::Init { database_url } => {
            init_database(database_url.as_deref().unwrap_or(&config.database.url)).await?;
        }
        Commands::Run => {
            run_scheduler(&config, &cli.mock_platforms).await?;
        }
        Commands::Tick => {
            let engine = build_engine(&config, &cli.mock_platforms).await?;
            let outcome = engine.run_tick().await?;
            println!("{outcome:#?}");
        }
        Commands::Approvals { command } => {
            handle_approvals_command(&config, &cli.mock_platforms, command).await?;
        }
        Commands::Actions { campaign, limit } => {
            list_actions(&config, &cli.mock_platforms, campaign.as_deref(), *limit).await?;
        }
        Commands::ConfigHistory { limit } => {
            list_config_history(&config, *limit).await?;
        }
        Commands::OverrideGuardrail {
            campaign,
            confidence_threshold,
            max_daily_adjustments,
            major_change_fraction,
            ttl_secs,
            operator,
        } => {
            override_guardrail(
                &config,
                &cli.mock_platforms,
                campaign,
                *confidence_threshold,
                *max_daily_adjustments,
                major_change_fraction.as_deref(),
                *ttl_secs,
                operator.clone(),
            )
            .await?;
        }
        Commands::Health => {
            report_health(&config).await?;
        }
    }

    Ok(())
}

async fn init_database(database_url: &str) -> Result<()> {
    info!(database_url, "initializing database");
    let pool = SqlitePool::connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database schema up to date");
    Ok(())
}

/// Wires one [`MockAdapter`] per requested platform. Real adapters are
/// registered the same way once credentials are available (§4.1); nothing
/// else in the engine changes.
fn build_registry(mock_platforms: &[String]) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for name in mock_platforms {
        registry.register(Arc::new(MockAdapter::new(PlatformId::parse(name))));
    }
    registry
}

fn build_analyst(config: &Config) -> Result<Arc<dyn LlmAnalystClient>> {
    match &config.analyst.endpoint {
        Some(endpoint) => {
            let client = HttpLlmAnalystClient::new(endpoint.clone(), Duration::from_secs(config.analyst.timeout_secs))?;
            Ok(Arc::new(client))
        }
        None => {
            info!("no analyst endpoint configured; using the mock analyst client");
            Ok(Arc::new(MockLlmAnalystClient::empty()))
        }
    }
}

async fn build_engine(config: &Config, mock_platforms: &[String]) -> Result<Arc<DecisionEngine>> {
    let pool = SqlitePool::connect(&config.database.url).await?;
    let ledger = Arc::new(SqliteLedgerRepository::new(pool.clone()));
    let campaigns = Arc::new(SqliteCampaignRepository::new(pool));
    let adapters = build_registry(mock_platforms);
    let normalizer = MetricNormalizer::new(FxTable::default());
    let analyst = build_analyst(config)?;

    let engine = DecisionEngine::new(config, adapters, normalizer, analyst, ledger, campaigns).await?;
    Ok(Arc::new(engine))
}

async fn run_scheduler(config: &Config, mock_platforms: &[String]) -> Result<()> {
    let engine = build_engine(config, mock_platforms).await?;
    let scheduler = TickScheduler::new(config.engine.tick_interval_secs, &config.engine.timezone)?;
    let (_shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);

    info!(interval_secs = config.engine.tick_interval_secs, "starting tick scheduler");
    scheduler
        .run(shutdown_rx, |scheduled_for| {
            let engine = Arc::clone(&engine);
            async move {
                info!(%scheduled_for, "tick boundary reached");
                match engine.run_tick().await {
                    Ok(outcome) => info!(?outcome, "tick complete"),
                    Err(e) => tracing::error!(error = %e, "tick failed to run"),
                }
            }
        })
        .await;
    Ok(())
}

async fn handle_approvals_command(config: &Config, mock_platforms: &[String], command: &ApprovalCommands) -> Result<()> {
    let engine = build_engine(config, mock_platforms).await?;
    match command {
        ApprovalCommands::List => {
            let pending = engine.list_pending_approvals().await;
            println!(
                "\n{}",
                style(format!("{:<37} {:<25} {:<20} {:<25}", "ID", "CAMPAIGN", "KIND", "EXPIRES")).bold()
            );
            println!("{}", style("-".repeat(110)).dim());
            for entry in &pending {
                println!(
                    "{:<37} {:<25} {:<20} {}",
                    entry.id,
                    entry.proposal.campaign_ref,
                    entry.proposal.kind.label(),
                    entry.expires_at
                );
            }
            println!("\n{} pending approval(s)", pending.len());
        }
        ApprovalCommands::Approve { id } => {
            let record = engine.approve(*id).await?;
            println!("{record:#?}");
        }
        ApprovalCommands::Reject { id, reason } => {
            let record = engine.reject(*id, reason.clone()).await?;
            println!("{record:#?}");
        }
    }
    Ok(())
}

async fn list_actions(config: &Config, mock_platforms: &[String], campaign: Option<&str>, limit: u32) -> Result<()> {
    let engine = build_engine(config, mock_platforms).await?;
    let campaign_ref = campaign.map(parse_campaign_ref).transpose().map_err(|e| anyhow::anyhow!(e))?;
    let records = engine.get_recent_actions(campaign_ref.as_ref(), limit).await?;

    println!(
        "\n{}",
        style(format!("{:<37} {:<25} {:<22} {:<12}", "ID", "CAMPAIGN", "KIND", "OUTCOME")).bold()
    );
    println!("{}", style("-".repeat(100)).dim());
    for record in &records {
        let outcome_text = format!("{:?}", record.outcome);
        let styled_outcome = match record.outcome {
            adbudget_core::domain::ActionOutcome::Success => style(outcome_text).green(),
            adbudget_core::domain::ActionOutcome::Failed { .. } => style(outcome_text).red(),
            adbudget_core::domain::ActionOutcome::Rejected { .. } => style(outcome_text).yellow(),
            adbudget_core::domain::ActionOutcome::Expired | adbudget_core::domain::ActionOutcome::Cancelled => {
                style(outcome_text).dim()
            }
        };
        println!(
            "{:<37} {:<25} {:<22} {}",
            record.id,
            record.campaign_ref,
            record.proposal.kind.label(),
            styled_outcome
        );
    }
    println!("\n{} record(s)", records.len());
    Ok(())
}

async fn list_config_history(config: &Config, limit: u32) -> Result<()> {
    let pool = SqlitePool::connect(&config.database.url).await?;
    let ledger = SqliteLedgerRepository::new(pool);
    let rows = {
        use adbudget_core::ledger::LedgerRepository;
        ledger.get_config_history(limit).await?
    };

    println!("\n{:<37} {:<25} {:<15} CHANGE", "ID", "CHANGED_AT", "OPERATOR");
    println!("{}", "-".repeat(100));
    for row in &rows {
        println!("{:<37} {:<25} {:<15} {}", row.id, row.changed_at, row.operator, row.change_json);
    }
    println!("\n{} entries", rows.len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn override_guardrail(
    config: &Config,
    mock_platforms: &[String],
    campaign: &str,
    confidence_threshold: Option<f64>,
    max_daily_adjustments: Option<u32>,
    major_change_fraction: Option<&str>,
    ttl_secs: u64,
    operator: String,
) -> Result<()> {
    let engine = build_engine(config, mock_platforms).await?;
    let campaign_ref = parse_campaign_ref(campaign).map_err(|e| anyhow::anyhow!(e))?;
    let major_change_fraction = major_change_fraction
        .map(|f| f.parse::<Decimal>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid major_change_fraction: {e}"))?;

    let override_value = GuardrailOverride {
        confidence_threshold,
        max_daily_adjustments,
        major_change_fraction,
        ..Default::default()
    };

    engine.override_guardrail(campaign_ref, override_value, Duration::from_secs(ttl_secs), operator).await;
    println!("guardrail override installed for {ttl_secs}s");
    Ok(())
}

async fn report_health(config: &Config) -> Result<()> {
    let pool = SqlitePool::connect(&config.database.url).await?;
    let mut checker = HealthChecker::new();
    checker.register(Box::new(DatabaseHealthCheck::new(pool)));

    let health = checker.check_health().await;
    println!("status: {:?}", health.status);
    for component in &health.components {
        println!("  {}: {:?} {}", component.name, component.status, component.message.clone().unwrap_or_default());
    }
    Ok(())
}
