use super::*;
use crate::metrics::RunStage;
use alloy::primitives::U256;
use assert_matches::assert_matches;
use std::sync::atomic::AtomicUsize;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use zkquery_types::{PartialTxSubquery, RawSubqueryBatch};

#[derive(Debug, Default, Clone)]
struct Calls {
    setup: Arc<AtomicUsize>,
    build: Arc<AtomicUsize>,
}

/// Backend returning a fixed proof. `gate`, when set, makes `build` wait for a signal.
struct MockBackend {
    calls: Calls,
    gate: Option<std_mpsc::Receiver<()>>,
    proof: Option<RawProof>,
    panic_on_build: bool,
    /// Number of `setup` calls that succeed before every further one fails.
    successful_setups: Option<usize>,
}

impl MockBackend {
    fn new(calls: Calls) -> Self {
        Self {
            calls,
            gate: None,
            proof: Some(RawProof {
                proof_bytes: vec![0xAB, 0xCD],
                public_instances: [0u64, 1, 2, 3].map(U256::from).to_vec(),
            }),
            panic_on_build: false,
            successful_setups: None,
        }
    }

    fn gated(mut self) -> (Self, std_mpsc::Sender<()>) {
        let (open, gate) = std_mpsc::channel();
        self.gate = Some(gate);
        (self, open)
    }
}

impl ProvingBackend for MockBackend {
    fn setup(&mut self, _concurrency: usize) -> anyhow::Result<()> {
        let previous = self.calls.setup.fetch_add(1, Ordering::SeqCst);
        if self.successful_setups.is_some_and(|limit| previous >= limit) {
            anyhow::bail!("out of proving keys");
        }
        Ok(())
    }

    fn circuit_log_size(&self) -> u8 {
        13
    }

    fn build(&mut self, inputs: &serde_json::Value) -> anyhow::Result<Witness> {
        self.calls.build.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_build {
            panic!("witness generation blew up");
        }
        if let Some(gate) = &self.gate {
            gate.recv()?;
        }
        let block_number = inputs["blockNumber"].as_u64().unwrap_or(1) as u32;
        Ok(Witness {
            data_query: RawSubqueryBatch {
                tx_subqueries: vec![PartialTxSubquery {
                    block_number,
                    tx_idx: 0,
                    field_or_calldata_idx: 0,
                }],
                ..RawSubqueryBatch::default()
            },
            num_user_instances: 4,
        })
    }

    fn prove(&mut self, _witness: &Witness) -> anyhow::Result<Option<RawProof>> {
        Ok(self.proof.clone())
    }

    fn verifying_key(&self) -> anyhow::Result<Vec<u8>> {
        Ok(vec![1; 40])
    }
}

async fn initialized_host(backend: MockBackend) -> Arc<ExecutionHost> {
    let host = ExecutionHost::spawn(backend).unwrap();
    host.initialize(2).await.unwrap();
    Arc::new(host)
}

async fn wait_until_busy(host: &ExecutionHost) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !host.is_busy() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("host never became busy");
}

async fn wait_until_idle(host: &ExecutionHost) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while host.is_busy() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("host never became idle");
}

#[tokio::test]
async fn run_produces_encoded_artifact_and_raw_batch() {
    let host = initialized_host(MockBackend::new(Calls::default())).await;

    let output = host.run(r#"{"blockNumber": 100}"#).await.unwrap();
    assert_eq!(output.compute.circuit_log_size, 13);
    assert_eq!(output.compute.result_len, 2);
    assert_eq!(output.compute.verifying_key.len(), 2);
    assert_eq!(
        output.compute.compute_proof_hex,
        format!("0x{:064x}{:032x}{:032x}abcd", 1, 2, 3)
    );
    assert_eq!(output.data_query.tx_subqueries[0].block_number, 100);
    assert!(!host.is_busy());
}

#[tokio::test]
async fn malformed_inputs_do_not_reach_backend() {
    let calls = Calls::default();
    let host = initialized_host(MockBackend::new(calls.clone())).await;

    assert_matches!(host.run("{not json").await, Err(HostError::InvalidInput(_)));
    assert_eq!(calls.build.load(Ordering::SeqCst), 0);
    assert!(!host.is_busy());

    let output = host.run("{}").await.unwrap();
    assert_eq!(output.data_query.tx_subqueries.len(), 1);
    assert_eq!(calls.build.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_requires_initialization() {
    let host = ExecutionHost::spawn(MockBackend::new(Calls::default())).unwrap();
    assert_matches!(host.run("{}").await, Err(HostError::NotInitialized));

    host.initialize(1).await.unwrap();
    host.run("{}").await.unwrap();
}

#[tokio::test]
async fn missing_proof_is_reported() {
    let mut backend = MockBackend::new(Calls::default());
    backend.proof = None;
    let host = initialized_host(backend).await;

    assert_matches!(host.run("{}").await, Err(HostError::ProofUnavailable));
}

#[tokio::test]
async fn short_instances_surface_as_encode_error() {
    let mut backend = MockBackend::new(Calls::default());
    backend.proof = Some(RawProof {
        proof_bytes: vec![1],
        public_instances: vec![U256::from(1)],
    });
    let host = initialized_host(backend).await;

    assert_matches!(host.run("{}").await, Err(HostError::Encode(_)));
}

#[tokio::test]
async fn backend_panic_is_returned_as_error() {
    let mut backend = MockBackend::new(Calls::default());
    backend.panic_on_build = true;
    let host = initialized_host(backend).await;

    let err = host.run("{}").await.unwrap_err();
    assert_matches!(&err, HostError::Backend(message) if message.contains("blew up"));
    // The worker survives the panic.
    assert_matches!(host.run("{}").await, Err(HostError::Backend(_)));
}

#[tokio::test]
async fn concurrent_requests_are_rejected() {
    let calls = Calls::default();
    let (backend, open) = MockBackend::new(calls.clone()).gated();
    let host = initialized_host(backend).await;

    let first = tokio::spawn({
        let host = host.clone();
        async move { host.run("{}").await }
    });
    wait_until_busy(&host).await;

    assert_matches!(host.run("{}").await, Err(HostError::Busy));
    assert_matches!(host.initialize(4).await, Err(HostError::Busy));
    assert_eq!(calls.setup.load(Ordering::SeqCst), 1);

    open.send(()).unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(calls.build.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_run_does_not_affect_next_one() {
    let (backend, open) = MockBackend::new(Calls::default()).gated();
    let host = initialized_host(backend).await;

    let first = tokio::spawn({
        let host = host.clone();
        async move { host.run("{}").await }
    });
    wait_until_busy(&host).await;
    host.cancel();
    open.send(()).unwrap();
    assert_matches!(first.await.unwrap(), Err(HostError::Cancelled));

    open.send(()).unwrap();
    let output = host.run(r#"{"blockNumber": 7}"#).await.unwrap();
    assert_eq!(output.data_query.tx_subqueries[0].block_number, 7);
}

#[tokio::test]
async fn dropping_run_future_cancels_it() {
    let (backend, open) = MockBackend::new(Calls::default()).gated();
    let host = initialized_host(backend).await;

    let first = tokio::spawn({
        let host = host.clone();
        async move { host.run("{}").await }
    });
    wait_until_busy(&host).await;
    first.abort();
    let _ = first.await;

    open.send(()).unwrap();
    wait_until_idle(&host).await;

    open.send(()).unwrap();
    host.run("{}").await.unwrap();
}

#[tokio::test]
async fn failed_reinitialization_disables_runs() {
    let mut backend = MockBackend::new(Calls::default());
    backend.successful_setups = Some(1);
    let host = initialized_host(backend).await;
    host.run("{}").await.unwrap();

    assert_matches!(
        host.initialize(4).await,
        Err(HostError::Backend(message)) if message.contains("proving keys")
    );
    assert_matches!(host.run("{}").await, Err(HostError::NotInitialized));
}

#[tokio::test]
async fn cancel_targets_the_current_run_after_earlier_ones() {
    let (backend, open) = MockBackend::new(Calls::default()).gated();
    let host = initialized_host(backend).await;

    open.send(()).unwrap();
    host.run("{}").await.unwrap();

    let second = tokio::spawn({
        let host = host.clone();
        async move { host.run("{}").await }
    });
    wait_until_busy(&host).await;
    host.cancel();
    open.send(()).unwrap();
    assert_matches!(second.await.unwrap(), Err(HostError::Cancelled));
}

#[tokio::test]
async fn failed_stages_are_recorded() {
    let failures_before = METRICS.stage_failures[&RunStage::Prove].get();
    let mut backend = MockBackend::new(Calls::default());
    backend.proof = None;
    let host = initialized_host(backend).await;

    assert_matches!(host.run("{}").await, Err(HostError::ProofUnavailable));
    assert!(METRICS.stage_failures[&RunStage::Prove].get() > failures_before);
}
