//! Observability: structured logging/tracing, health checks and metrics
//! (§10.5). Kept as a thin layer over `tracing` + `metrics` so the rest of
//! the crate instruments itself with ordinary macro calls rather than a
//! bespoke abstraction.

pub mod health;
pub mod metrics;
pub mod tracing;

pub use health::{
    ComponentHealth, DatabaseHealthCheck, FunctionHealthCheck, HealthCheck, HealthChecker, HealthStatus,
    SystemHealth,
};
pub use tracing::{init_tracing, CorrelationId, TraceContext};
