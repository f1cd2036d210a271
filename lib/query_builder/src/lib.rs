//! Assembly of submission-ready queries.
//!
//! [`QueryBuilder`] combines the encoded compute artifact, the resolved data query and the
//! callback descriptor into a hashed and salted [`BuiltQuery`]. The only source of
//! non-determinism is the salt.

use alloy::hex;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};
use std::fmt;
use zkquery_types::{CallbackDescriptor, EncodedComputeArtifact, ResolvedSubqueryList};

mod config;
mod contract;
mod data_query;
mod metrics;

pub use config::QueryBuilderConfig;
pub use contract::{AxiomV2Callback, AxiomV2ComputeQuery, IAxiomV2Query};
pub use data_query::{data_query_hash, encode_data_query, query_schema};

use crate::metrics::METRICS;

/// Minimal length of a compute proof: the two 32-byte instance words.
const MIN_COMPUTE_PROOF_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("cannot assemble query: {0}")]
    QueryAssemblyFailed(String),
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: QueryBuilderConfig,
}

impl QueryBuilder {
    pub fn new(config: QueryBuilderConfig) -> Self {
        Self { config }
    }

    /// Builds a query with a fresh salt. Every call yields a distinct salt, so two builds of the
    /// same inputs never collide on chain.
    pub fn build(
        self,
        compute: &EncodedComputeArtifact,
        data_query: &ResolvedSubqueryList,
        callback: CallbackDescriptor,
    ) -> Result<BuiltQuery, BuildError> {
        self.assemble(compute, data_query, callback, B256::from(rand::random::<[u8; 32]>()))
            .inspect_err(|err| {
                METRICS.assembly_failures.inc();
                tracing::warn!(%err, "query assembly failed");
            })
    }

    fn assemble(
        self,
        compute: &EncodedComputeArtifact,
        data_query: &ResolvedSubqueryList,
        callback: CallbackDescriptor,
        salt: B256,
    ) -> Result<BuiltQuery, BuildError> {
        let query_address = parse_query_address(&self.config.query_address)?;
        if compute.verifying_key.is_empty() {
            return Err(BuildError::QueryAssemblyFailed(
                "verifying key is empty".to_owned(),
            ));
        }
        let compute_proof = hex::decode(&compute.compute_proof_hex).map_err(|err| {
            BuildError::QueryAssemblyFailed(format!("compute proof is not valid hex: {err}"))
        })?;
        if compute_proof.len() < MIN_COMPUTE_PROOF_LEN {
            return Err(BuildError::QueryAssemblyFailed(format!(
                "compute proof is {} bytes long, expected at least {MIN_COMPUTE_PROOF_LEN}",
                compute_proof.len()
            )));
        }

        let encoded_data_query = encode_data_query(self.config.source_chain_id, data_query)?;
        let data_query_hash = data_query_hash(&encoded_data_query);
        let query_schema = query_schema(compute, data_query)?;

        let compute_query = AxiomV2ComputeQuery {
            k: compute.circuit_log_size,
            resultLen: compute.result_len,
            vkey: compute.verifying_key.clone(),
            computeProof: compute_proof.into(),
        };
        let callback = AxiomV2Callback {
            target: callback.target,
            extraData: callback.extra_data,
        };

        METRICS.built_queries.inc();
        METRICS.data_query_size.observe(encoded_data_query.len());
        tracing::info!(
            %data_query_hash,
            %query_schema,
            subqueries = data_query.len(),
            source_chain_id = self.config.source_chain_id,
            "built query"
        );

        Ok(BuiltQuery {
            query_address,
            payment: self.config.payment(),
            source_chain_id: self.config.source_chain_id,
            max_fee_per_gas: self.config.max_fee_per_gas(),
            callback_gas_limit: self.config.callback_gas_limit,
            data_query_hash,
            encoded_data_query,
            compute_query,
            callback,
            query_schema,
            salt,
        })
    }
}

fn parse_query_address(raw: &str) -> Result<Address, BuildError> {
    let address: Address = raw.parse().map_err(|err| {
        BuildError::QueryAssemblyFailed(format!("invalid query address `{raw}`: {err}"))
    })?;
    if address.is_zero() {
        return Err(BuildError::QueryAssemblyFailed(
            "query address is not configured".to_owned(),
        ));
    }
    Ok(address)
}

/// Hashed and salted query. Consumed by [`BuiltQuery::into_submission`], so a query can be
/// submitted at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct BuiltQuery {
    query_address: Address,
    payment: U256,
    source_chain_id: u64,
    max_fee_per_gas: u64,
    callback_gas_limit: u32,
    data_query_hash: B256,
    encoded_data_query: Bytes,
    compute_query: AxiomV2ComputeQuery,
    callback: AxiomV2Callback,
    query_schema: B256,
    salt: B256,
}

impl BuiltQuery {
    pub fn data_query_hash(&self) -> B256 {
        self.data_query_hash
    }

    pub fn encoded_data_query(&self) -> &Bytes {
        &self.encoded_data_query
    }

    pub fn compute_query(&self) -> &AxiomV2ComputeQuery {
        &self.compute_query
    }

    /// ABI encoding of the compute query struct.
    pub fn encoded_compute_query(&self) -> Bytes {
        self.compute_query.abi_encode().into()
    }

    pub fn callback(&self) -> &AxiomV2Callback {
        &self.callback
    }

    /// ABI encoding of the callback struct.
    pub fn encoded_callback(&self) -> Bytes {
        self.callback.abi_encode().into()
    }

    pub fn query_schema(&self) -> B256 {
        self.query_schema
    }

    pub fn salt(&self) -> B256 {
        self.salt
    }

    pub fn source_chain_id(&self) -> u64 {
        self.source_chain_id
    }

    pub fn max_fee_per_gas(&self) -> u64 {
        self.max_fee_per_gas
    }

    pub fn callback_gas_limit(&self) -> u32 {
        self.callback_gas_limit
    }

    /// Turns the query into a `sendQuery` call; fees of the fulfillment are refunded to
    /// `requester`.
    pub fn into_submission(self, requester: Address) -> SubmissionCall {
        SubmissionCall {
            address: self.query_address,
            value: self.payment,
            args: IAxiomV2Query::sendQueryCall {
                sourceChainId: self.source_chain_id,
                dataQueryHash: self.data_query_hash,
                computeQuery: self.compute_query,
                callback: self.callback,
                userSalt: self.salt,
                maxFeePerGas: self.max_fee_per_gas,
                callbackGasLimit: self.callback_gas_limit,
                refundee: requester,
                dataQuery: self.encoded_data_query,
            },
        }
    }
}

/// Transport-ready `sendQuery` call on the query contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionCall {
    pub address: Address,
    /// Deposit attached to the call (in wei).
    pub value: U256,
    pub args: IAxiomV2Query::sendQueryCall,
}

impl SubmissionCall {
    pub const FUNCTION_NAME: &'static str = "sendQuery";

    pub fn function_name(&self) -> &'static str {
        Self::FUNCTION_NAME
    }

    pub fn signature(&self) -> &'static str {
        IAxiomV2Query::sendQueryCall::SIGNATURE
    }

    pub fn calldata(&self) -> Bytes {
        self.args.abi_encode().into()
    }

    pub fn data_query_hash(&self) -> B256 {
        self.args.dataQueryHash
    }
}

impl fmt::Display for SubmissionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(dataQueryHash={}, salt={}) on {} with value {}",
            Self::FUNCTION_NAME,
            self.args.dataQueryHash,
            self.args.userSalt,
            self.address,
            self.value
        )
    }
}
