//! Logging and metrics export shared by the binaries.

mod logs;
mod prometheus;

pub use logs::{LogFormat, Logs};
pub use prometheus::{PrometheusConfig, run_prometheus_exporter};
