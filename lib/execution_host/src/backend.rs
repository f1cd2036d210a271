use alloy::primitives::U256;
use zkquery_types::RawSubqueryBatch;

/// Result of running the computation over its inputs, before proving.
#[derive(Debug, Clone, Default)]
pub struct Witness {
    /// Subqueries requested by the computation, with transactions still addressed by position.
    pub data_query: RawSubqueryBatch,
    /// Number of user public instances exposed by the circuit.
    pub num_user_instances: usize,
}

/// Proof as returned by the backend.
#[derive(Debug, Clone)]
pub struct RawProof {
    pub proof_bytes: Vec<u8>,
    /// Public instances as 128-bit halves, high half first within each pair.
    pub public_instances: Vec<U256>,
}

/// Proving backend driven by the execution host.
///
/// All methods are blocking and may take a long time; the host only ever calls them from its
/// worker thread.
pub trait ProvingBackend: Send + 'static {
    /// Prepares the backend to prove with up to `concurrency` threads.
    fn setup(&mut self, concurrency: usize) -> anyhow::Result<()>;

    /// Log2 of the number of rows of the circuit.
    fn circuit_log_size(&self) -> u8;

    /// Runs the computation over parsed inputs, generating the witness.
    fn build(&mut self, inputs: &serde_json::Value) -> anyhow::Result<Witness>;

    /// Proves the witness. Returns `Ok(None)` if the backend has no proof to offer.
    fn prove(&mut self, witness: &Witness) -> anyhow::Result<Option<RawProof>>;

    /// Raw verifying key bytes of the circuit.
    fn verifying_key(&self) -> anyhow::Result<Vec<u8>>;
}
