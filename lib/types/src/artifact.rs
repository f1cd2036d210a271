use alloy::primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Proof produced by the proving backend for a single host run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofArtifact {
    proof_bytes: Vec<u8>,
    public_instances: Vec<U256>,
    instance_count: usize,
}

impl ProofArtifact {
    /// `public_instances` carries 128-bit halves, high half first within each pair.
    /// `instance_count` is the number of user instances reported by the circuit run.
    pub fn new(proof_bytes: Vec<u8>, public_instances: Vec<U256>, instance_count: usize) -> Self {
        Self {
            proof_bytes,
            public_instances,
            instance_count,
        }
    }

    pub fn proof_bytes(&self) -> &[u8] {
        &self.proof_bytes
    }

    pub fn public_instances(&self) -> &[U256] {
        &self.public_instances
    }

    pub fn instance_count(&self) -> usize {
        self.instance_count
    }
}

/// Wire-ready compute descriptor consumed by the query contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedComputeArtifact {
    #[serde(rename = "k")]
    pub circuit_log_size: u8,
    #[serde(rename = "vkey")]
    pub verifying_key: Vec<B256>,
    #[serde(rename = "computeProof")]
    pub compute_proof_hex: String,
    #[serde(rename = "resultLen")]
    pub result_len: u16,
}

/// Contract to call once the query is fulfilled. Forwarded to the query contract unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackDescriptor {
    pub target: Address,
    pub extra_data: Bytes,
}
