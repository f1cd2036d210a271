use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use zkquery_execution_host::ExecutionHost;
use zkquery_node::config::Config;
use zkquery_node::{BundleBackend, QueryPipeline};
use zkquery_observability::{LogFormat, Logs, run_prometheus_exporter};
use zkquery_query_sender::{DryRunQuerySubmitter, OnchainQuerySubmitter, QuerySubmitter};
use zkquery_subquery_resolver::SubqueryResolver;
use zkquery_types::CallbackDescriptor;

/// Proves a computation and submits the resulting query on chain.
#[derive(Debug, Parser)]
#[command(name = "zkquery", version, about)]
struct Cli {
    /// JSON file with the computation inputs.
    #[arg(long)]
    inputs: PathBuf,
    /// Pre-computed prover bundle to serve proofs from.
    #[arg(long)]
    bundle: PathBuf,
    /// Contract called back once the query is fulfilled.
    #[arg(long)]
    callback_target: Address,
    /// Extra data forwarded to the callback.
    #[arg(long, default_value = "0x")]
    extra_data: Bytes,
    /// Address refunded for unused fulfillment fees.
    #[arg(long)]
    requester: Address,
    /// Simulate the submission instead of broadcasting it.
    #[arg(long)]
    dry_run: bool,
    /// Log output format: plain, json or logfmt.
    #[arg(long, env = "ZKQUERY_LOG_FORMAT", default_value = "plain")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    Logs::new(cli.log_format).install()?;

    let mut config = Config::from_env()?;
    config.sender.dry_run |= cli.dry_run;

    let (stop_sender, stop_receiver) = watch::channel(false);
    let exporter = config
        .prometheus
        .bind_address()
        .map(|address| tokio::spawn(run_prometheus_exporter(address, stop_receiver)));

    let result = run(cli, config).await;
    stop_sender.send_replace(true);
    if let Some(exporter) = exporter {
        exporter.await??;
    }
    result
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let inputs = std::fs::read_to_string(&cli.inputs)
        .with_context(|| format!("failed to read inputs {}", cli.inputs.display()))?;

    let host = ExecutionHost::spawn(BundleBackend::from_path(&cli.bundle)?)
        .context("failed to spawn execution host")?;
    host.initialize(config.host.effective_concurrency())
        .await
        .context("failed to initialize execution host")?;

    let source_provider = ProviderBuilder::new()
        .connect(&config.source_chain.rpc_url)
        .await
        .with_context(|| format!("failed to connect to {}", config.source_chain.rpc_url))?
        .erased();
    let resolver = SubqueryResolver::new(Arc::new(source_provider), config.resolver);

    let submitter: Arc<dyn QuerySubmitter> = if config.sender.dry_run {
        Arc::new(DryRunQuerySubmitter::connect(config.sender).await?)
    } else {
        Arc::new(OnchainQuerySubmitter::connect(config.sender).await?)
    };

    let pipeline = QueryPipeline::new(Arc::new(host), resolver, config.query, submitter);
    let callback = CallbackDescriptor {
        target: cli.callback_target,
        extra_data: cli.extra_data,
    };
    let tx_hash = pipeline
        .generate_and_send(&inputs, callback, cli.requester)
        .await?;
    tracing::info!(%tx_hash, "done");
    Ok(())
}
