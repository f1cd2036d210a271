//! Canonical serialization of the data query.
//!
//! Layout (all integers big-endian, addresses 20 bytes, words 32 bytes):
//!
//! ```text
//! sourceChainId: u64 | numSubqueries: u16 | subquery*
//! subquery := type: u16 | fields
//! header    := blockNumber: u32 | fieldIdx: u32
//! account   := blockNumber: u32 | addr | fieldIdx: u32
//! storage   := blockNumber: u32 | addr | slot: word
//! tx        := txHash: word | fieldOrCalldataIdx: u32
//! receipt   := txHash: word | fieldOrLogIdx: u32 | topicOrDataOrAddressIdx: u32 | eventSchema: word
//! mapping   := blockNumber: u32 | addr | mappingSlot: word | mappingDepth: u8 | key: word * depth
//! ```
//!
//! The data query hash is the keccak256 of exactly these bytes.

use crate::BuildError;
use alloy::primitives::{B256, Bytes, keccak256};
use zkquery_types::{EncodedComputeArtifact, ResolvedSubqueryList, Subquery};

pub fn encode_data_query(
    source_chain_id: u64,
    subqueries: &ResolvedSubqueryList,
) -> Result<Bytes, BuildError> {
    let count = u16::try_from(subqueries.len()).map_err(|_| {
        BuildError::QueryAssemblyFailed(format!("too many subqueries: {}", subqueries.len()))
    })?;

    let mut out = Vec::with_capacity(10 + subqueries.len() * 64);
    out.extend_from_slice(&source_chain_id.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    for subquery in subqueries {
        out.extend_from_slice(&subquery.kind().type_tag().to_be_bytes());
        encode_subquery(&mut out, subquery)?;
    }
    Ok(out.into())
}

fn encode_subquery(out: &mut Vec<u8>, subquery: &Subquery) -> Result<(), BuildError> {
    match subquery {
        Subquery::Header(header) => {
            out.extend_from_slice(&header.block_number.to_be_bytes());
            out.extend_from_slice(&header.field_idx.to_be_bytes());
        }
        Subquery::Account(account) => {
            out.extend_from_slice(&account.block_number.to_be_bytes());
            out.extend_from_slice(account.addr.as_slice());
            out.extend_from_slice(&account.field_idx.to_be_bytes());
        }
        Subquery::Storage(storage) => {
            out.extend_from_slice(&storage.block_number.to_be_bytes());
            out.extend_from_slice(storage.addr.as_slice());
            out.extend_from_slice(&storage.slot.to_be_bytes::<32>());
        }
        Subquery::Transaction(tx) => {
            out.extend_from_slice(tx.tx_hash.as_slice());
            out.extend_from_slice(&tx.field_or_calldata_idx.to_be_bytes());
        }
        Subquery::Receipt(receipt) => {
            out.extend_from_slice(receipt.tx_hash.as_slice());
            out.extend_from_slice(&receipt.field_or_log_idx.to_be_bytes());
            out.extend_from_slice(&receipt.topic_or_data_or_address_idx.to_be_bytes());
            out.extend_from_slice(receipt.event_schema.as_slice());
        }
        Subquery::SolidityNestedMapping(mapping) => {
            if mapping.keys.len() != usize::from(mapping.mapping_depth) {
                return Err(BuildError::QueryAssemblyFailed(format!(
                    "nested mapping depth {} does not match {} keys",
                    mapping.mapping_depth,
                    mapping.keys.len()
                )));
            }
            out.extend_from_slice(&mapping.block_number.to_be_bytes());
            out.extend_from_slice(mapping.addr.as_slice());
            out.extend_from_slice(&mapping.mapping_slot.to_be_bytes::<32>());
            out.push(mapping.mapping_depth);
            for key in &mapping.keys {
                out.extend_from_slice(key.as_slice());
            }
        }
    }
    Ok(())
}

pub fn data_query_hash(encoded_data_query: &[u8]) -> B256 {
    keccak256(encoded_data_query)
}

/// Hash of the query shape: compute descriptor followed by the type of every subquery.
///
/// `k: u8 | resultLen: u16 | vkeyLen: u8 | vkey: word * vkeyLen | type: u16 * numSubqueries`
pub fn query_schema(
    compute: &EncodedComputeArtifact,
    subqueries: &ResolvedSubqueryList,
) -> Result<B256, BuildError> {
    let vkey_len = u8::try_from(compute.verifying_key.len()).map_err(|_| {
        BuildError::QueryAssemblyFailed(format!(
            "verifying key too long: {} words",
            compute.verifying_key.len()
        ))
    })?;

    let mut out = Vec::with_capacity(4 + compute.verifying_key.len() * 32 + subqueries.len() * 2);
    out.push(compute.circuit_log_size);
    out.extend_from_slice(&compute.result_len.to_be_bytes());
    out.push(vkey_len);
    for word in &compute.verifying_key {
        out.extend_from_slice(word.as_slice());
    }
    for kind in subqueries.kinds() {
        out.extend_from_slice(&kind.type_tag().to_be_bytes());
    }
    Ok(keccak256(out))
}
