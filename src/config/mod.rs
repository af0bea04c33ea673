//! Layered configuration: a TOML file for local/dev overrides, environment
//! variables for deployment, each variable in §6's table with the
//! documented default so a bare `Config::load()` with no file and no env
//! is already a runnable (if conservative) configuration.

use std::collections::HashMap;
use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{CoreError, GuardrailOverride, Guardrails, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub guardrails: GuardrailsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub analyst: AnalystConfig,
}

/// LLM Analyst client settings (§4.6). An absent `endpoint` means no real
/// analyst is configured; callers fall back to the mock client rather than
/// failing to start, the same posture adapters take toward missing
/// platform credentials (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    pub endpoint: Option<String>,
    #[serde(default = "default_analyst_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self { endpoint: None, timeout_secs: default_analyst_timeout_secs() }
    }
}

fn default_analyst_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url(), pool_size: default_pool_size() }
    }
}

fn default_database_url() -> String {
    "sqlite:adbudget.db".to_string()
}

fn default_pool_size() -> u32 {
    10
}

/// Scheduling and automation-posture settings (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_tick_deadline_fraction")]
    pub tick_deadline_fraction: f64,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub automation_level: AutomationLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            tick_deadline_fraction: default_tick_deadline_fraction(),
            timezone: default_timezone(),
            automation_level: AutomationLevel::default(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    15 * 60
}

fn default_tick_deadline_fraction() -> f64 {
    0.8
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Posture the Guardrail Gate takes toward R4/R6 (§6, §9 Open Questions).
/// `Advisory` forces R6 (otherwise-auto-execute) to `APPROVAL_REQUIRED`
/// instead; `Semi` forces the R4 major-change threshold to zero, so every
/// budget change above zero needs approval; `Full` runs the rule table
/// unmodified.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutomationLevel {
    Advisory,
    Semi,
    #[default]
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_max_daily_adjustments")]
    pub max_daily_adjustments: u32,
    #[serde(default = "default_max_budget_reallocation_fraction_per_day")]
    pub max_budget_reallocation_fraction_per_day: Decimal,
    #[serde(default = "default_max_single_budget_increase_fraction")]
    pub max_single_budget_increase_fraction: Decimal,
    #[serde(default = "default_min_campaign_runtime_hours_before_pause")]
    pub min_campaign_runtime_hours_before_pause: i64,
    #[serde(default = "default_major_change_fraction")]
    pub major_change_fraction: Decimal,
    #[serde(default = "default_approval_ttl_secs")]
    pub approval_ttl_secs: u64,
    #[serde(default)]
    pub overrides: HashMap<String, GuardrailOverride>,
    /// Per-platform confirmed-budget ceiling (I3), keyed by `PlatformId::as_str()`.
    #[serde(default)]
    pub platform_budget_ceilings: HashMap<String, Decimal>,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_daily_adjustments: default_max_daily_adjustments(),
            max_budget_reallocation_fraction_per_day: default_max_budget_reallocation_fraction_per_day(),
            max_single_budget_increase_fraction: default_max_single_budget_increase_fraction(),
            min_campaign_runtime_hours_before_pause: default_min_campaign_runtime_hours_before_pause(),
            major_change_fraction: default_major_change_fraction(),
            approval_ttl_secs: default_approval_ttl_secs(),
            overrides: HashMap::new(),
            platform_budget_ceilings: HashMap::new(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.85
}

fn default_max_daily_adjustments() -> u32 {
    5
}

fn default_max_budget_reallocation_fraction_per_day() -> Decimal {
    Decimal::new(25, 2)
}

fn default_max_single_budget_increase_fraction() -> Decimal {
    Decimal::new(50, 2)
}

fn default_min_campaign_runtime_hours_before_pause() -> i64 {
    72
}

fn default_major_change_fraction() -> Decimal {
    Decimal::new(20, 2)
}

fn default_approval_ttl_secs() -> u64 {
    4 * 60 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Layers, lowest to highest precedence: built-in defaults (via serde
    /// `#[serde(default)]`), an optional TOML file, then `ADBUDGET_`
    /// environment variables (double-underscore nested, e.g.
    /// `ADBUDGET_GUARDRAILS__CONFIDENCE_THRESHOLD`).
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(figment::providers::Serialized::defaults(
            Config::default_values(),
        ));
        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("ADBUDGET_").split("__"));
        figment
            .extract()
            .map_err(|e| CoreError::config(format!("failed to load configuration: {e}")))
    }

    fn default_values() -> Self {
        Config {
            database: DatabaseConfig::default(),
            engine: EngineConfig::default(),
            guardrails: GuardrailsConfig::default(),
            logging: LoggingConfig::default(),
            analyst: AnalystConfig::default(),
        }
    }

    pub fn default_sqlite() -> Self {
        Self::default_values()
    }

    /// Materialises the domain `Guardrails` snapshot this config implies,
    /// resolving string-keyed campaign overrides into `CampaignRef`s.
    ///
    /// Malformed override keys (not `platform_id/external_id`) are dropped
    /// with a warning rather than failing config load, since an operator
    /// typo in one override shouldn't take down the whole process.
    pub fn to_guardrails(&self) -> Guardrails {
        let mut overrides = HashMap::new();
        for (key, value) in &self.guardrails.overrides {
            match parse_campaign_ref_key(key) {
                Some(campaign_ref) => {
                    overrides.insert(campaign_ref, value.clone());
                }
                None => {
                    tracing::warn!(key = %key, "ignoring malformed guardrail override key");
                }
            }
        }
        let platform_budget_ceilings = self
            .guardrails
            .platform_budget_ceilings
            .iter()
            .map(|(platform, ceiling)| (crate::domain::PlatformId::parse(platform), *ceiling))
            .collect();
        Guardrails {
            confidence_threshold: self.guardrails.confidence_threshold,
            max_daily_adjustments: self.guardrails.max_daily_adjustments,
            max_budget_reallocation_fraction_per_day: self
                .guardrails
                .max_budget_reallocation_fraction_per_day,
            max_single_budget_increase_fraction: self.guardrails.max_single_budget_increase_fraction,
            min_campaign_runtime_hours_before_pause: self
                .guardrails
                .min_campaign_runtime_hours_before_pause,
            major_change_fraction: self.guardrails.major_change_fraction,
            overrides,
            platform_budget_ceilings,
        }
    }
}

fn parse_campaign_ref_key(key: &str) -> Option<crate::domain::CampaignRef> {
    let (platform, external_id) = key.split_once('/')?;
    Some(crate::domain::CampaignRef::new(
        crate::domain::PlatformId::parse(platform),
        external_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = Config::default_sqlite();
        assert_eq!(config.engine.tick_interval_secs, 900);
        assert_eq!(config.engine.tick_deadline_fraction, 0.8);
        assert_eq!(config.guardrails.confidence_threshold, 0.85);
        assert_eq!(config.guardrails.major_change_fraction, Decimal::new(20, 2));
        assert_eq!(config.guardrails.approval_ttl_secs, 4 * 60 * 60);
        assert_eq!(config.engine.automation_level, AutomationLevel::Full);
    }

    #[test]
    fn override_key_parses_platform_and_external_id() {
        let campaign_ref = parse_campaign_ref_key("google_ads/G1").unwrap();
        assert_eq!(campaign_ref.external_id, "G1");
    }

    #[test]
    fn malformed_override_key_is_rejected() {
        assert!(parse_campaign_ref_key("not-a-valid-key").is_none());
    }

    #[test]
    fn to_guardrails_resolves_overrides() {
        let mut config = Config::default_sqlite();
        config.guardrails.overrides.insert(
            "meta_ads/M1".to_string(),
            GuardrailOverride { confidence_threshold: Some(0.95), ..Default::default() },
        );
        let guardrails = config.to_guardrails();
        let campaign_ref = crate::domain::CampaignRef::new(crate::domain::PlatformId::MetaAds, "M1");
        assert_eq!(guardrails.confidence_threshold_for(&campaign_ref), 0.95);
    }
}
