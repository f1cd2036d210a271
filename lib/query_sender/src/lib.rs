//! Delivery of built queries to the query contract.

mod config;
mod metrics;
#[cfg(test)]
mod tests;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::Context;
use smart_config::value::ExposeSecret;
use std::str::FromStr;
use std::time::Instant;
use zkquery_query_builder::SubmissionCall;

pub use config::SenderConfig;

use crate::metrics::{METRICS, SubmissionMode};

/// Submission capability. Called at most once per built query.
#[async_trait::async_trait]
pub trait QuerySubmitter: Send + Sync {
    async fn submit(&self, call: SubmissionCall) -> anyhow::Result<TxHash>;
}

/// Transaction request carrying `call`, with fees capped by the configured limits.
pub fn query_tx_request(
    call: &SubmissionCall,
    from: Address,
    config: &SenderConfig,
) -> TransactionRequest {
    TransactionRequest::default()
        .with_from(from)
        .with_to(call.address)
        .with_value(call.value)
        .with_input(call.calldata())
        .with_max_fee_per_gas(config.max_fee_per_gas())
        .with_max_priority_fee_per_gas(config.max_priority_fee_per_gas())
        .with_gas_limit(config.gas_limit)
}

/// Warns if the network currently asks for more than the configured fee caps.
async fn check_fee_estimates(provider: &dyn Provider, config: &SenderConfig) -> anyhow::Result<()> {
    let eip1559_est = provider.estimate_eip1559_fees().await?;
    tracing::debug!(
        eip1559_est.max_priority_fee_per_gas,
        "estimated median priority fee for the last blocks"
    );
    if eip1559_est.max_fee_per_gas > config.max_fee_per_gas() {
        tracing::warn!(
            max_fee_per_gas = config.max_fee_per_gas(),
            estimated_max_fee_per_gas = eip1559_est.max_fee_per_gas,
            "configured maxFeePerGas is lower than the one estimated from network"
        );
    }
    if eip1559_est.max_priority_fee_per_gas > config.max_priority_fee_per_gas() {
        tracing::warn!(
            max_priority_fee_per_gas = config.max_priority_fee_per_gas(),
            estimated_max_priority_fee_per_gas = eip1559_est.max_priority_fee_per_gas,
            "configured maxPriorityFeePerGas is lower than the one estimated from network"
        );
    }
    Ok(())
}

/// Sends queries as signed EIP-1559 transactions.
#[derive(Clone)]
pub struct OnchainQuerySubmitter {
    provider: DynProvider,
    operator_address: Address,
    config: SenderConfig,
}

impl OnchainQuerySubmitter {
    pub async fn connect(config: SenderConfig) -> anyhow::Result<Self> {
        let signer = PrivateKeySigner::from_str(config.operator_pk.expose_secret())
            .context("failed to parse operator private key")?;
        let operator_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(&config.rpc_url)
            .await
            .with_context(|| format!("failed to connect to {}", config.rpc_url))?
            .erased();
        tracing::info!(%operator_address, rpc_url = config.rpc_url, "query sender connected");
        Ok(Self {
            provider,
            operator_address,
            config,
        })
    }

    pub fn operator_address(&self) -> Address {
        self.operator_address
    }
}

#[async_trait::async_trait]
impl QuerySubmitter for OnchainQuerySubmitter {
    async fn submit(&self, call: SubmissionCall) -> anyhow::Result<TxHash> {
        check_fee_estimates(&self.provider, &self.config).await?;
        let tx_request = query_tx_request(&call, self.operator_address, &self.config);

        let started_at = Instant::now();
        let pending = self
            .provider
            .send_transaction(tx_request)
            .await
            .inspect_err(|_| {
                METRICS.failed.inc();
            })
            .with_context(|| format!("failed to send {call}"))?;
        let tx_hash = *pending.tx_hash();
        METRICS.submitted[&SubmissionMode::Onchain].inc();
        tracing::info!(%tx_hash, %call, "query transaction sent");

        if !self.config.wait_for_receipt {
            return Ok(tx_hash);
        }
        let receipt = pending
            .get_receipt()
            .await
            .with_context(|| format!("failed to get receipt of query transaction {tx_hash}"))?;
        METRICS.inclusion_latency.observe(started_at.elapsed());
        if !receipt.status() {
            METRICS.failed.inc();
            anyhow::bail!(
                "query transaction {tx_hash} reverted in block {:?}",
                receipt.block_number
            );
        }
        tracing::info!(
            %tx_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            "query transaction included"
        );
        Ok(tx_hash)
    }
}

/// Simulates queries with `eth_call` and never broadcasts them.
#[derive(Clone)]
pub struct DryRunQuerySubmitter {
    provider: DynProvider,
    operator_address: Address,
    config: SenderConfig,
}

impl DryRunQuerySubmitter {
    /// Hash reported for simulated submissions.
    pub const TX_HASH: TxHash = TxHash::ZERO;

    pub async fn connect(config: SenderConfig) -> anyhow::Result<Self> {
        let operator_address = if let Some(addr) = &config.dry_run_operator_address {
            let addr = Address::from_str(addr).context("failed to parse dry-run operator address")?;
            tracing::info!(%addr, "dry-run mode using configured operator address");
            addr
        } else {
            let signer = PrivateKeySigner::from_str(config.operator_pk.expose_secret())
                .context("failed to parse operator private key")?;
            let addr = signer.address();
            tracing::info!(%addr, "dry-run mode using operator address derived from private key");
            addr
        };
        let provider = ProviderBuilder::new()
            .connect(&config.rpc_url)
            .await
            .with_context(|| format!("failed to connect to {}", config.rpc_url))?
            .erased();
        Ok(Self {
            provider,
            operator_address,
            config,
        })
    }
}

#[async_trait::async_trait]
impl QuerySubmitter for DryRunQuerySubmitter {
    async fn submit(&self, call: SubmissionCall) -> anyhow::Result<TxHash> {
        tracing::info!(%call, "simulating query transaction (dry-run mode)");
        check_fee_estimates(&self.provider, &self.config).await?;
        let tx_request = query_tx_request(&call, self.operator_address, &self.config);
        tracing::debug!(
            from = ?tx_request.from,
            to = ?tx_request.to,
            "dry-run eth_call transaction request"
        );

        let simulation = self.provider.call(tx_request).await;
        dry_run_outcome(&call, simulation)
    }
}

/// Maps the `eth_call` simulation of `call` to the reported hash. A failed simulation means the
/// query would fail on chain, so it is returned as an error.
fn dry_run_outcome<E: std::fmt::Display>(
    call: &SubmissionCall,
    simulation: Result<Bytes, E>,
) -> anyhow::Result<TxHash> {
    match simulation {
        Ok(result) => {
            tracing::info!(%call, result_bytes = result.len(), "dry-run eth_call succeeded");
            METRICS.submitted[&SubmissionMode::DryRun].inc();
            Ok(DryRunQuerySubmitter::TX_HASH)
        }
        Err(err) => {
            METRICS.failed.inc();
            tracing::warn!(%call, error = %err, "dry-run eth_call failed");
            anyhow::bail!("simulation of {call} failed: {err}")
        }
    }
}
