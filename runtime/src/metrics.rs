//! Prometheus metrics for the bridge.
//!
//! Metrics are recorded through the `metrics` facade and cost nothing until a
//! recorder is installed. [`MetricsServer`] installs the Prometheus recorder:
//! - Commands dispatched, not implemented, and rejected as malformed
//! - Engine failures swallowed by the dispatcher
//! - Sequencing no-ops (stop without start, component of unknown transaction)
//! - Superseded handles and live registry sizes
//!
//! # Example
//!
//! ```rust,no_run
//! use apm_bridge_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder.
///
/// Installs the global recorder and renders the scrape text on demand; the
/// host decides how to expose it.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the host intends to expose the metrics on
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe the bridge metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs a
    /// warning and returns `Ok(())` without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Address the metrics are meant to be served on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "bridge_commands_total",
        "Total number of decoded commands dispatched, by command"
    );
    describe_counter!(
        "bridge_not_implemented_total",
        "Total number of calls for methods outside the command surface"
    );
    describe_counter!(
        "bridge_contract_violations_total",
        "Total number of commands rejected for missing or malformed fields"
    );
    describe_counter!(
        "bridge_engine_failures_total",
        "Total number of engine failures logged and swallowed, by command"
    );
    describe_counter!(
        "bridge_sequencing_noops_total",
        "Total number of lifecycle commands ignored because their target is not live"
    );
    describe_counter!(
        "bridge_superseded_handles_total",
        "Total number of live handles replaced by a second start, by kind"
    );
    describe_gauge!(
        "bridge_live_transactions",
        "Transactions currently held by the registry"
    );
    describe_gauge!(
        "bridge_live_components",
        "Components currently held by the registry"
    );
    describe_histogram!(
        "bridge_dispatch_duration_seconds",
        "Time taken to execute a decoded command"
    );
}

/// Dispatcher metrics recorder.
pub struct BridgeMetrics;

impl BridgeMetrics {
    /// Record a dispatched command.
    pub fn record_dispatch(command: &'static str, duration: Duration) {
        counter!("bridge_commands_total", "command" => command).increment(1);
        histogram!("bridge_dispatch_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a call for an unknown method.
    pub fn record_not_implemented() {
        counter!("bridge_not_implemented_total").increment(1);
    }

    /// Record a malformed command.
    pub fn record_contract_violation(method: &str) {
        counter!("bridge_contract_violations_total", "command" => method.to_owned()).increment(1);
    }

    /// Record a swallowed engine failure.
    pub fn record_engine_failure(command: &'static str) {
        counter!("bridge_engine_failures_total", "command" => command).increment(1);
    }

    /// Record a lifecycle command that found nothing to act on.
    pub fn record_sequencing_noop(command: &'static str) {
        counter!("bridge_sequencing_noops_total", "command" => command).increment(1);
    }

    /// Record a handle replaced by a second start (`kind` is `transaction` or `component`).
    pub fn record_superseded(kind: &'static str) {
        counter!("bridge_superseded_handles_total", "kind" => kind).increment(1);
    }

    /// Record current registry sizes.
    #[allow(clippy::cast_precision_loss)] // Registry sizes stay far below 2^52
    pub fn record_registry(transactions: usize, components: usize) {
        gauge!("bridge_live_transactions").set(transactions as f64);
        gauge!("bridge_live_components").set(components as f64);
    }
}
