//! Structured logging setup and the correlation id that threads a tick's
//! full fan-out through every span it touches, in the same shape as the
//! teacher's `observability::tracing` (minus its HTTP-header plumbing,
//! which has no counterpart here — the core exposes no HTTP surface).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};
use uuid::Uuid;

use crate::config::LoggingConfig;

/// Identifies one tick's worth of work across every span and log line it
/// produces, so an operator can grep a single id and see the whole
/// collect → analyze → gate → execute → audit fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tick's trace context: its correlation id and when it started,
/// carried into the `tracing::Span` every stage of `run_tick` runs under.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub correlation_id: CorrelationId,
    pub tick_id: Uuid,
}

impl TraceContext {
    pub fn new(tick_id: Uuid) -> Self {
        Self { correlation_id: CorrelationId::new(), tick_id }
    }
}

/// Initializes the global `tracing` subscriber once at process startup.
/// `json` selects the machine-readable layer a production deployment
/// scrapes; the plain layer is for local/dev runs.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), String> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level)).map_err(|e| e.to_string())?;

    if config.json {
        let fmt_layer = fmt::layer().json().with_target(true).with_level(true);
        Registry::default().with(env_filter).with(fmt_layer).try_init().map_err(|e| e.to_string())
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_level(true);
        Registry::default().with(env_filter).with(fmt_layer).try_init().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }
}
