//! Metrics emission via the `metrics` facade, exported through a
//! Prometheus-text-format endpoint by `metrics-exporter-prometheus`. The
//! teacher wires its own `prometheus::Registry` by hand (see DESIGN.md);
//! this crate uses the facade + exporter pair instead, so instrumentation
//! sites call the `metrics` macros without threading a registry handle
//! through every module.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const TICKS_TOTAL: &str = "adbudget_ticks_total";
pub const TICK_FAILURES_TOTAL: &str = "adbudget_tick_failures_total";
pub const TICK_DURATION_SECONDS: &str = "adbudget_tick_duration_seconds";
pub const PROPOSALS_TOTAL: &str = "adbudget_proposals_total";
pub const ACTIONS_TOTAL: &str = "adbudget_actions_total";
pub const APPROVALS_PENDING: &str = "adbudget_approvals_pending";
pub const APPROVALS_EXPIRED_TOTAL: &str = "adbudget_approvals_expired_total";
pub const ADAPTER_CALL_DURATION_SECONDS: &str = "adbudget_adapter_call_duration_seconds";
pub const ADAPTER_ERRORS_TOTAL: &str = "adbudget_adapter_errors_total";

/// Installs the global Prometheus recorder and returns a handle whose
/// `render()` the CLI's `metrics` / health endpoints can scrape.
pub fn install_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new().install_recorder().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_installs_and_renders_empty_output() {
        let handle = install_recorder();
        assert!(handle.is_ok());
    }
}
