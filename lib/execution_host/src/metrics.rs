use std::time::Duration;
use vise::{Buckets, Counter, EncodeLabelSet, EncodeLabelValue, Family, Gauge, Histogram, Metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue, EncodeLabelSet)]
#[metrics(label = "stage", rename_all = "snake_case")]
pub(crate) enum RunStage {
    Setup,
    Build,
    Prove,
    Encode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue, EncodeLabelSet)]
#[metrics(label = "outcome", rename_all = "snake_case")]
pub(crate) enum RunOutcome {
    Success,
    InvalidInput,
    Busy,
    ProofUnavailable,
    Cancelled,
    Failed,
}

const PROVING_LATENCIES: Buckets = Buckets::exponential(0.01..=600.0, 2.0);

#[derive(Debug, Metrics)]
#[metrics(prefix = "execution_host")]
pub(crate) struct ExecutionHostMetrics {
    /// Time spent in each stage of a run.
    #[metrics(buckets = PROVING_LATENCIES)]
    pub stage_latency: Family<RunStage, Histogram<Duration>>,
    /// Stages that ended with an error.
    pub stage_failures: Family<RunStage, Counter>,
    /// End-to-end run latency as seen by the worker.
    #[metrics(buckets = PROVING_LATENCIES)]
    pub run_latency: Histogram<Duration>,
    /// Runs by outcome.
    pub runs: Family<RunOutcome, Counter>,
    /// 1 while a request is being processed by the worker.
    pub in_flight: Gauge<usize>,
}

#[vise::register]
pub(crate) static METRICS: vise::Global<ExecutionHostMetrics> = vise::Global::new();
