//! Liveness/readiness reporting, in the same shape as the teacher's
//! `observability::health`: a `HealthCheck` trait per dependency, a
//! registry that runs them all, and a roll-up status derived from the
//! worst individual result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
}

impl SystemHealth {
    /// Worst-of: one `Unhealthy` component makes the whole system
    /// `Unhealthy`; one `Degraded` (with the rest healthy) makes it
    /// `Degraded`.
    pub fn determine_status(components: &[ComponentHealth]) -> HealthStatus {
        if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> ComponentHealth;
}

/// Pings the ledger/campaign database pool with a trivial query.
pub struct DatabaseHealthCheck {
    pool: SqlitePool,
}

impl DatabaseHealthCheck {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for DatabaseHealthCheck {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> ComponentHealth {
        let checked_at = Utc::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => ComponentHealth { name: self.name().to_string(), status: HealthStatus::Healthy, message: None, checked_at },
            Err(e) => ComponentHealth {
                name: self.name().to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
                checked_at,
            },
        }
    }
}

/// Wraps an arbitrary async predicate as a health check, for adapters and
/// the analyst client where there's no shared pool to probe directly.
pub struct FunctionHealthCheck<F> {
    name: String,
    check_fn: F,
}

impl<F> FunctionHealthCheck<F> {
    pub fn new(name: impl Into<String>, check_fn: F) -> Self {
        Self { name: name.into(), check_fn }
    }
}

#[async_trait]
impl<F, Fut> HealthCheck for FunctionHealthCheck<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), String>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ComponentHealth {
        let checked_at = Utc::now();
        match (self.check_fn)().await {
            Ok(()) => ComponentHealth { name: self.name.clone(), status: HealthStatus::Healthy, message: None, checked_at },
            Err(message) => {
                ComponentHealth { name: self.name.clone(), status: HealthStatus::Degraded, message: Some(message), checked_at }
            }
        }
    }
}

/// Runs every registered check and rolls the results up into a
/// [`SystemHealth`] snapshot, for a liveness/readiness probe or the CLI's
/// `health` subcommand to report.
#[derive(Default)]
pub struct HealthChecker {
    checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, check: Box<dyn HealthCheck>) {
        self.checks.push(check);
    }

    pub async fn check_health(&self) -> SystemHealth {
        let mut components = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            components.push(check.check().await);
        }
        let status = SystemHealth::determine_status(&components);
        SystemHealth { status, components }
    }

    /// Liveness: the process is up and able to respond at all. Never
    /// touches dependencies.
    pub fn check_liveness(&self) -> HealthStatus {
        HealthStatus::Healthy
    }

    /// Readiness: every registered dependency responds.
    pub async fn check_readiness(&self) -> HealthStatus {
        self.check_health().await.status
    }
}
