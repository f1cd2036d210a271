//! Proving backend serving a pre-computed prover bundle.
//!
//! A bundle is the JSON output of an offline proving run:
//!
//! ```json
//! {
//!   "k": 13,
//!   "vk": "0x…",
//!   "proof": "0x…",
//!   "instances": ["0x0", "0x1", "0x2", "0x3"],
//!   "dataQuery": { "txSubqueries": [{ "blockNumber": 100, "txIdx": 2, "fieldOrCalldataIdx": 0 }] },
//!   "inputs": { "blockNumber": 100 }
//! }
//! ```
//!
//! `proof` may be `null`, in which case runs fail with a missing proof. If `inputs` is present,
//! runs over any other inputs are rejected.

use alloy::primitives::{Bytes, U256};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use zkquery_execution_host::{ProvingBackend, RawProof, Witness};
use zkquery_types::RawSubqueryBatch;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProverBundle {
    k: u8,
    vk: Bytes,
    proof: Option<Bytes>,
    instances: Vec<U256>,
    #[serde(default)]
    num_user_instances: Option<usize>,
    #[serde(default)]
    data_query: RawSubqueryBatch,
    #[serde(default)]
    inputs: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct BundleBackend {
    bundle: ProverBundle,
}

impl BundleBackend {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let bundle: ProverBundle =
            serde_json::from_str(json).context("failed to parse prover bundle")?;
        Ok(Self { bundle })
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prover bundle {}", path.display()))?;
        Self::from_json(&json)
    }
}

impl ProvingBackend for BundleBackend {
    fn setup(&mut self, concurrency: usize) -> anyhow::Result<()> {
        // Proofs are pre-computed, so the concurrency hint is only reported.
        tracing::info!(concurrency, k = self.bundle.k, "prover bundle loaded");
        Ok(())
    }

    fn circuit_log_size(&self) -> u8 {
        self.bundle.k
    }

    fn build(&mut self, inputs: &serde_json::Value) -> anyhow::Result<Witness> {
        if let Some(expected) = &self.bundle.inputs {
            anyhow::ensure!(
                expected == inputs,
                "prover bundle was generated for different inputs"
            );
        }
        Ok(Witness {
            data_query: self.bundle.data_query.clone(),
            num_user_instances: self
                .bundle
                .num_user_instances
                .unwrap_or(self.bundle.instances.len()),
        })
    }

    fn prove(&mut self, _witness: &Witness) -> anyhow::Result<Option<RawProof>> {
        Ok(self.bundle.proof.as_ref().map(|proof| RawProof {
            proof_bytes: proof.to_vec(),
            public_instances: self.bundle.instances.clone(),
        }))
    }

    fn verifying_key(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.bundle.vk.to_vec())
    }
}
