use smart_config::{DescribeConfig, DeserializeConfig};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::sync::watch;
use vise_exporter::MetricsExporter;

/// Prometheus exporter settings.
#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct PrometheusConfig {
    /// Port to serve metrics on. Metrics are not exported if unset.
    pub port: Option<u16>,
}

impl PrometheusConfig {
    pub fn bind_address(&self) -> Option<SocketAddr> {
        self.port
            .map(|port| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }
}

/// Serves metrics registered with `vise` until `stop_receiver` flips to `true`.
pub async fn run_prometheus_exporter(
    bind_address: SocketAddr,
    mut stop_receiver: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let exporter = MetricsExporter::default().with_graceful_shutdown(async move {
        stop_receiver.wait_for(|stop| *stop).await.ok();
    });
    tracing::info!(%bind_address, "serving prometheus metrics");
    exporter.bind(bind_address).await?.start().await?;
    Ok(())
}
