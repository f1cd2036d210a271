//! Canonical encoding of proof artifacts for on-chain consumption.
//!
//! Everything here is pure: the same artifact always encodes to the same bytes.

use alloy::hex;
use alloy::primitives::{B256, U256};
use zkquery_types::{EncodedComputeArtifact, ProofArtifact};


/// Number of (hi, lo) instance pairs packed in front of the proof bytes.
///
/// This is a wire-format contract with the verifier and does not depend on the number of
/// public instances the circuit exposes.
pub const COMPUTE_PROOF_HEADER_PAIRS: usize = 2;

/// Size of a verifying key chunk.
pub const VK_CHUNK_SIZE: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("no proof has been generated")]
    NoProof,
    #[error("compute proof header needs {expected} public instances, got {actual}")]
    MissingInstances { expected: usize, actual: usize },
    #[error("public instance #{index} does not fit into 128 bits: {value}")]
    InstanceOutOfRange { index: usize, value: U256 },
    #[error("result length {0} does not fit into u16")]
    ResultTooLong(usize),
}

/// Builds the compute proof hex string: two 32-byte words made of the first two
/// `hi * 2^128 + lo` instance pairs, followed by the raw proof bytes, `0x`-prefixed.
pub fn encode_compute_proof(
    public_instances: &[U256],
    proof_bytes: &[u8],
) -> Result<String, EncodeError> {
    let expected = 2 * COMPUTE_PROOF_HEADER_PAIRS;
    if public_instances.len() < expected {
        return Err(EncodeError::MissingInstances {
            expected,
            actual: public_instances.len(),
        });
    }

    let mut encoded = String::with_capacity(2 + 128 + 2 * proof_bytes.len());
    encoded.push_str("0x");
    for i in 0..COMPUTE_PROOF_HEADER_PAIRS {
        let value = combine_halves(public_instances, 2 * i)?;
        encoded.push_str(&hex::encode(value.to_be_bytes::<32>()));
    }
    encoded.push_str(&hex::encode(proof_bytes));
    Ok(encoded)
}

fn combine_halves(instances: &[U256], hi_index: usize) -> Result<U256, EncodeError> {
    let check = |index: usize| {
        let value = instances[index];
        if value.bit_len() > 128 {
            Err(EncodeError::InstanceOutOfRange { index, value })
        } else {
            Ok(value)
        }
    };
    let hi = check(hi_index)?;
    let lo = check(hi_index + 1)?;
    Ok((hi << 128usize) | lo)
}

/// Splits the raw verifying key into 32-byte words in stream order.
/// A trailing partial word is zero-padded on the right.
pub fn encode_verifying_key(raw_vk: &[u8]) -> Vec<B256> {
    raw_vk
        .chunks(VK_CHUNK_SIZE)
        .map(|chunk| {
            let mut word = B256::ZERO;
            word[..chunk.len()].copy_from_slice(chunk);
            word
        })
        .collect()
}

/// Derives the compute descriptor sent along with the query.
///
/// Passing `None` means the caller tried to encode before a proof exists, which is a
/// sequencing bug on the caller side.
pub fn encode_compute_artifact(
    circuit_log_size: u8,
    proof: Option<&ProofArtifact>,
    raw_vk: &[u8],
) -> Result<EncodedComputeArtifact, EncodeError> {
    let proof = proof.ok_or(EncodeError::NoProof)?;
    let compute_proof_hex = encode_compute_proof(proof.public_instances(), proof.proof_bytes())?;
    let result_len = proof.instance_count() / 2;

    Ok(EncodedComputeArtifact {
        circuit_log_size,
        verifying_key: encode_verifying_key(raw_vk),
        compute_proof_hex,
        result_len: u16::try_from(result_len)
            .map_err(|_| EncodeError::ResultTooLong(result_len))?,
    })
}
