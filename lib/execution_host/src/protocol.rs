use crate::HostError;
use crate::metrics::METRICS;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use zkquery_types::{EncodedComputeArtifact, RawSubqueryBatch};

/// Output of a successful run. Returned by value; the host keeps nothing between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostOutput {
    pub compute: EncodedComputeArtifact,
    pub data_query: RawSubqueryBatch,
}

/// Messages accepted by the worker thread. Each carries its own responder.
#[derive(Debug)]
pub(crate) enum HostRequest {
    Initialize {
        concurrency_hint: usize,
        respond_to: oneshot::Sender<Result<(), HostError>>,
        flight: FlightGuard,
    },
    Run {
        run_id: u64,
        inputs: serde_json::Value,
        cancel: CancellationToken,
        respond_to: oneshot::Sender<Result<HostOutput, HostError>>,
        flight: FlightGuard,
    },
}

/// Marks the host busy for as long as a request exists.
///
/// The guard travels with the request into the worker, so the host stays busy until the worker
/// is done with it, even if the caller stopped waiting.
#[derive(Debug)]
pub(crate) struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    pub fn try_acquire(flag: &Arc<AtomicBool>) -> Result<Self, HostError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| HostError::Busy)?;
        METRICS.in_flight.set(1);
        Ok(Self(flag.clone()))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        METRICS.in_flight.set(0);
        self.0.store(false, Ordering::Release);
    }
}
