//! HTTP surface of the status reporter.
//!
//! Routes:
//! - `/` - full cluster status report, streamed as plain text
//! - `/healthz`, `/readiness` - probes, always `OK`
//! - `/metrics` - Prometheus metrics
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod metrics;
mod routes;
pub mod shutdown;

pub use metrics::{create_metrics, Metrics, SharedMetrics};
pub use routes::{run_server, AppState};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_tests;

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
