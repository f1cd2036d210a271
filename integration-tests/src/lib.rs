//! In-memory harness for end-to-end pipeline tests.

use alloy::primitives::{Address, B256, TxHash};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zkquery_execution_host::ExecutionHost;
use zkquery_node::{BundleBackend, QueryPipeline};
use zkquery_query_builder::{QueryBuilderConfig, SubmissionCall};
use zkquery_query_sender::QuerySubmitter;
use zkquery_subquery_resolver::{ChainDataProvider, ResolverConfig, SubqueryResolver};

pub const QUERY_ADDRESS: &str = "0xBd5307B0Bf573E3F2864Af960167b24Aa346952b";

/// Hash of the transaction at `idx` in block `block_number` on [`InMemoryChain`].
pub fn tx_hash(block_number: u64, idx: u32) -> B256 {
    let mut hash = B256::ZERO;
    hash[..8].copy_from_slice(&block_number.to_be_bytes());
    hash[28..].copy_from_slice(&idx.to_be_bytes());
    hash
}

#[derive(Debug, Default)]
pub struct InMemoryChain {
    blocks: HashMap<u64, Vec<B256>>,
    /// Simulated RPC latency per block, to shuffle completion order.
    delays: HashMap<u64, Duration>,
}

impl InMemoryChain {
    pub fn with_block(mut self, block_number: u64, tx_count: u32) -> Self {
        let txs = (0..tx_count).map(|idx| tx_hash(block_number, idx)).collect();
        self.blocks.insert(block_number, txs);
        self
    }

    pub fn with_delay(mut self, block_number: u64, delay: Duration) -> Self {
        self.delays.insert(block_number, delay);
        self
    }
}

#[async_trait::async_trait]
impl ChainDataProvider for InMemoryChain {
    async fn block_transaction_hashes(
        &self,
        block_number: u64,
    ) -> anyhow::Result<Option<Vec<B256>>> {
        if let Some(delay) = self.delays.get(&block_number) {
            tokio::time::sleep(*delay).await;
        }
        Ok(self.blocks.get(&block_number).cloned())
    }
}

/// Submitter that records calls instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    calls: Mutex<Vec<SubmissionCall>>,
}

impl RecordingSubmitter {
    pub fn calls(&self) -> Vec<SubmissionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl QuerySubmitter for RecordingSubmitter {
    async fn submit(&self, call: SubmissionCall) -> anyhow::Result<TxHash> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        Ok(TxHash::with_last_byte(calls.len() as u8))
    }
}

/// Prover bundle proving `instances` for the given raw data query.
pub fn bundle(instances: &[u64], proof: Option<&str>, data_query: serde_json::Value) -> String {
    json!({
        "k": 13,
        "vk": format!("0x{}", "07".repeat(64)),
        "proof": proof,
        "instances": instances.iter().map(|value| format!("{value:#x}")).collect::<Vec<_>>(),
        "dataQuery": data_query,
    })
    .to_string()
}

pub struct Tester {
    pub host: Arc<ExecutionHost>,
    pub pipeline: QueryPipeline,
    pub submitter: Arc<RecordingSubmitter>,
}

impl Tester {
    pub async fn setup(bundle: &str, chain: InMemoryChain) -> anyhow::Result<Self> {
        let host = Arc::new(ExecutionHost::spawn(BundleBackend::from_json(bundle)?)?);
        host.initialize(2).await?;
        let resolver = SubqueryResolver::new(
            Arc::new(chain),
            ResolverConfig {
                retry_min_delay: Duration::from_millis(1),
                ..ResolverConfig::default()
            },
        );
        let submitter = Arc::new(RecordingSubmitter::default());
        let pipeline = QueryPipeline::new(
            host.clone(),
            resolver,
            QueryBuilderConfig {
                query_address: QUERY_ADDRESS.to_owned(),
                ..QueryBuilderConfig::default()
            },
            submitter.clone(),
        );
        tracing::debug!("tester is ready");
        Ok(Self {
            host,
            pipeline,
            submitter,
        })
    }

    pub fn requester() -> Address {
        Address::repeat_byte(0x0e)
    }
}
