//! Execution host: runs the computation and proving on a dedicated worker thread.
//!
//! Proving is CPU-bound and can take minutes, so the backend never runs on the caller's
//! thread. The caller talks to the worker through [`ExecutionHost`], which sends one request
//! per operation and awaits the typed response. Only one request may be in flight at a time;
//! a concurrent request is rejected with [`HostError::Busy`], never queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use zkquery_artifact_encoder::EncodeError;

mod backend;
mod config;
mod metrics;
mod protocol;
#[cfg(test)]
mod tests;
mod worker;

pub use backend::{ProvingBackend, RawProof, Witness};
pub use config::HostConfig;
pub use protocol::HostOutput;

use crate::metrics::{METRICS, RunOutcome};
use crate::protocol::{FlightGuard, HostRequest};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("computation inputs are not valid JSON: {0}")]
    InvalidInput(#[source] serde_json::Error),
    #[error("execution host is not initialized")]
    NotInitialized,
    #[error("another request is already in flight")]
    Busy,
    #[error("proving backend did not produce a proof")]
    ProofUnavailable,
    #[error("run was cancelled")]
    Cancelled,
    #[error("failed to encode proof artifacts")]
    Encode(#[from] EncodeError),
    #[error("proving backend failed: {0}")]
    Backend(String),
    #[error("execution host worker has terminated")]
    WorkerTerminated,
}

/// Handle to a proving session running on its own thread.
///
/// Dropping the handle cancels the in-flight run, if any, and lets the worker exit.
#[derive(Debug)]
pub struct ExecutionHost {
    requests: mpsc::UnboundedSender<HostRequest>,
    in_flight: Arc<AtomicBool>,
    current_run: Mutex<Option<CancellationToken>>,
    next_run_id: AtomicU64,
}

impl ExecutionHost {
    /// Spawns the worker thread owning `backend`.
    pub fn spawn<B: ProvingBackend>(backend: B) -> std::io::Result<Self> {
        let (requests, receiver) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("execution-host".into())
            .spawn(move || worker::run_worker(backend, receiver))?;

        Ok(Self {
            requests,
            in_flight: Arc::new(AtomicBool::new(false)),
            current_run: Mutex::new(None),
            next_run_id: AtomicU64::new(0),
        })
    }

    /// Prepares the backend for the given parallelism budget.
    ///
    /// May be repeated to reconfigure the backend, but only while no run is pending.
    pub async fn initialize(&self, concurrency_hint: usize) -> Result<(), HostError> {
        let flight = FlightGuard::try_acquire(&self.in_flight)?;
        let (respond_to, response) = oneshot::channel();
        self.send(HostRequest::Initialize {
            concurrency_hint,
            respond_to,
            flight,
        })?;
        response.await.map_err(|_| HostError::WorkerTerminated)?
    }

    /// Runs the computation over `inputs` (JSON) and proves it.
    ///
    /// Malformed inputs are rejected before anything reaches the worker. Dropping the returned
    /// future cancels the run.
    pub async fn run(&self, inputs: &str) -> Result<HostOutput, HostError> {
        let inputs: serde_json::Value = serde_json::from_str(inputs).map_err(|err| {
            tracing::warn!(%err, "rejecting malformed computation inputs");
            METRICS.runs[&RunOutcome::InvalidInput].inc();
            HostError::InvalidInput(err)
        })?;
        let cancel = CancellationToken::new();
        let flight = {
            // `cancel()` takes the same lock, so it never sees the host busy with a stale token.
            let mut current_run = self.current_run.lock().unwrap();
            let flight = FlightGuard::try_acquire(&self.in_flight).inspect_err(|_| {
                METRICS.runs[&RunOutcome::Busy].inc();
            })?;
            *current_run = Some(cancel.clone());
            flight
        };
        let _cancel_on_drop = cancel.clone().drop_guard();

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);

        tracing::info!(run_id, "starting run");
        let (respond_to, response) = oneshot::channel();
        self.send(HostRequest::Run {
            run_id,
            inputs,
            cancel,
            respond_to,
            flight,
        })?;
        response.await.map_err(|_| HostError::WorkerTerminated)?
    }

    /// Discards the in-flight run. The worker stops at the next stage boundary and the pending
    /// [`ExecutionHost::run`] call resolves to [`HostError::Cancelled`].
    pub fn cancel(&self) {
        if let Some(cancel) = self.current_run.lock().unwrap().take() {
            tracing::info!("cancelling in-flight run");
            cancel.cancel();
        }
    }

    /// Whether a request is currently being processed by the worker.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn send(&self, request: HostRequest) -> Result<(), HostError> {
        self.requests
            .send(request)
            .map_err(|_| HostError::WorkerTerminated)
    }
}

impl Drop for ExecutionHost {
    fn drop(&mut self) {
        self.cancel();
    }
}
