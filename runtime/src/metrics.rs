//! Prometheus metrics for the box office engine.
//!
//! Components record through the small recorder structs below so metric
//! names live in one place:
//! - Inventory ledger reservations
//! - Ticket issuance and compensation
//! - Session transitions
//! - Ticket cache reconciliation
//! - Store retries
//!
//! # Example
//!
//! ```rust,no_run
//! use boxoffice_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Serve `server.render()` at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Why metrics could not be started.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The exporter configuration was rejected
    #[error("Invalid Prometheus exporter configuration: {0}")]
    Build(String),
    /// The recorder could not be installed
    #[error("Could not install Prometheus recorder: {0}")]
    Install(String),
}

/// Prometheus metrics recorder plus the address it should be served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should bind to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe every box office metric and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// [`MetricsError::Build`] for a bad bucket layout, [`MetricsError::Install`]
    /// if installing fails. When another recorder is already global (several
    /// tests in one process) this returns `Ok` and [`MetricsServer::render`]
    /// yields `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        // Issuance is one or two round trips to the store, so the interesting
        // range is sub-millisecond up to the retry budget.
        let builder = PrometheusBuilder::new()
            .add_global_label("service", "boxoffice")
            .set_buckets_for_metric(
                Matcher::Full("boxoffice_issue_duration_seconds".to_string()),
                &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!(addr = %self.addr, "Prometheus recorder installed");
                self.handle = Some(handle);
                Ok(())
            }
            Err(BuildError::FailedToSetGlobalRecorder(_)) => {
                tracing::debug!("A metrics recorder is already installed; keeping it");
                Ok(())
            }
            Err(other) => Err(MetricsError::Install(other.to_string())),
        }
    }

    /// Handle for rendering the scrape body, if this server installed the
    /// recorder.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Current metrics in the Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "boxoffice_reservations_total",
        "Capacity reservation attempts by outcome (reserved, sold_out, not_found, error)"
    );
    describe_counter!(
        "boxoffice_tickets_issued_total",
        "Tickets durably issued"
    );
    describe_counter!(
        "boxoffice_issuance_compensations_total",
        "Reservations handled after a failed ticket write, by outcome (released, failed, unverified)"
    );
    describe_histogram!(
        "boxoffice_issue_duration_seconds",
        "Time taken to issue a ticket, from validation to durable write"
    );
    describe_counter!(
        "boxoffice_session_transitions_total",
        "Session state changes by resulting state"
    );
    describe_counter!(
        "boxoffice_cache_reconciliations_total",
        "Ticket cache reconciliations by outcome (loaded, failed, cleared)"
    );
    describe_counter!(
        "boxoffice_retries_total",
        "Retried store operations by operation name"
    );
    describe_counter!(
        "boxoffice_retries_exhausted_total",
        "Store operations that failed after every retry, by operation name"
    );
    describe_counter!(
        "boxoffice_store_errors_total",
        "Database errors by store operation"
    );
    describe_counter!(
        "boxoffice_events_created_total",
        "Events created through the admin API"
    );
}

/// Inventory ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record the outcome of one reservation attempt.
    pub fn record_reservation(outcome: &'static str) {
        counter!("boxoffice_reservations_total", "outcome" => outcome).increment(1);
    }
}

/// Ticket issuer metrics recorder.
pub struct IssuanceMetrics;

impl IssuanceMetrics {
    /// Record a ticket that was durably written.
    pub fn record_issued(duration: Duration) {
        counter!("boxoffice_tickets_issued_total").increment(1);
        histogram!("boxoffice_issue_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record how a failed ticket write was settled: `released`, `failed`
    /// (release kept failing) or `unverified` (read-back kept failing).
    pub fn record_compensation(outcome: &'static str) {
        counter!("boxoffice_issuance_compensations_total", "outcome" => outcome).increment(1);
    }
}

/// Session manager metrics recorder.
pub struct SessionMetrics;

impl SessionMetrics {
    /// Record a transition into `state`.
    pub fn record_transition(state: &'static str) {
        counter!("boxoffice_session_transitions_total", "state" => state).increment(1);
    }
}

/// Ticket cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record one reconciliation pass.
    pub fn record_reconciliation(outcome: &'static str) {
        counter!("boxoffice_cache_reconciliations_total", "outcome" => outcome).increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry of `operation`.
    pub fn record_retry(operation: &'static str) {
        counter!("boxoffice_retries_total", "operation" => operation).increment(1);
    }

    /// Record that `operation` ran out of retries.
    pub fn record_exhausted(operation: &'static str) {
        counter!("boxoffice_retries_exhausted_total", "operation" => operation).increment(1);
    }
}
