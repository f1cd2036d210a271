use crate::backend::ProvingBackend;
use crate::metrics::{METRICS, RunOutcome, RunStage};
use crate::protocol::{HostOutput, HostRequest};
use crate::HostError;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zkquery_artifact_encoder::encode_compute_artifact;
use zkquery_types::ProofArtifact;

/// Worker loop. Owns the backend and processes requests one at a time until every sender is
/// dropped.
pub(crate) fn run_worker<B: ProvingBackend>(
    mut backend: B,
    mut requests: mpsc::UnboundedReceiver<HostRequest>,
) {
    let mut initialized = false;
    while let Some(request) = requests.blocking_recv() {
        match request {
            HostRequest::Initialize {
                concurrency_hint,
                respond_to,
                flight,
            } => {
                let result = run_stage(RunStage::Setup, || {
                    catch_backend_panic(|| backend.setup(concurrency_hint))
                });
                // A failed setup leaves the backend unusable, even if it was set up before.
                initialized = result.is_ok();
                match &result {
                    Ok(()) => tracing::info!(concurrency_hint, "proving backend is set up"),
                    Err(err) => tracing::error!(concurrency_hint, %err, "proving backend setup failed"),
                }
                drop(flight);
                respond_to.send(result).ok();
            }
            HostRequest::Run {
                run_id,
                inputs,
                cancel,
                respond_to,
                flight,
            } => {
                let result = if initialized {
                    let latency = METRICS.run_latency.start();
                    let result = execute_run(&mut backend, &inputs, &cancel);
                    let elapsed = latency.observe();
                    tracing::info!(
                        run_id,
                        elapsed_ms = elapsed.as_millis(),
                        ok = result.is_ok(),
                        "run finished"
                    );
                    result
                } else {
                    Err(HostError::NotInitialized)
                };
                METRICS.runs[&outcome(&result)].inc();
                drop(flight);
                if respond_to.send(result).is_err() {
                    tracing::debug!(run_id, "caller stopped waiting for the run result");
                }
            }
        }
    }
    tracing::info!("execution host worker is shutting down");
}

fn execute_run<B: ProvingBackend>(
    backend: &mut B,
    inputs: &serde_json::Value,
    cancel: &CancellationToken,
) -> Result<HostOutput, HostError> {
    let witness = run_stage(RunStage::Build, || catch_backend_panic(|| backend.build(inputs)))?;
    ensure_not_cancelled(cancel)?;

    let proof = run_stage(RunStage::Prove, || {
        catch_backend_panic(|| backend.prove(&witness))?.ok_or(HostError::ProofUnavailable)
    })?;
    ensure_not_cancelled(cancel)?;

    let compute = run_stage(RunStage::Encode, || {
        let raw_vk = catch_backend_panic(|| backend.verifying_key())?;
        let proof = ProofArtifact::new(
            proof.proof_bytes,
            proof.public_instances,
            witness.num_user_instances,
        );
        Ok(encode_compute_artifact(backend.circuit_log_size(), Some(&proof), &raw_vk)?)
    })?;

    Ok(HostOutput {
        compute,
        data_query: witness.data_query,
    })
}

/// Times a stage, failed attempts included.
fn run_stage<T>(stage: RunStage, f: impl FnOnce() -> Result<T, HostError>) -> Result<T, HostError> {
    let latency = METRICS.stage_latency[&stage].start();
    let result = f();
    latency.observe();
    if result.is_err() {
        METRICS.stage_failures[&stage].inc();
    }
    result
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), HostError> {
    if cancel.is_cancelled() {
        Err(HostError::Cancelled)
    } else {
        Ok(())
    }
}

/// Backend failures, panics included, are turned into values so they can be sent back over the
/// response channel.
fn catch_backend_panic<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, HostError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(HostError::Backend(format!("{err:#}"))),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(HostError::Backend(format!("backend panicked: {message}")))
        }
    }
}

fn outcome<T>(result: &Result<T, HostError>) -> RunOutcome {
    match result {
        Ok(_) => RunOutcome::Success,
        Err(HostError::ProofUnavailable) => RunOutcome::ProofUnavailable,
        Err(HostError::Cancelled) => RunOutcome::Cancelled,
        Err(_) => RunOutcome::Failed,
    }
}
