use std::time::Duration;
use vise::{Buckets, Counter, EncodeLabelSet, EncodeLabelValue, Family, Histogram, Metrics, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue, EncodeLabelSet)]
#[metrics(label = "mode", rename_all = "snake_case")]
pub(crate) enum SubmissionMode {
    Onchain,
    DryRun,
}

#[derive(Debug, Metrics)]
#[metrics(prefix = "query_sender")]
pub(crate) struct QuerySenderMetrics {
    /// Number of submitted queries.
    pub submitted: Family<SubmissionMode, Counter>,
    /// Number of query transactions that failed or reverted.
    pub failed: Counter,
    /// Time from sending a query transaction to its inclusion.
    #[metrics(unit = Unit::Seconds, buckets = Buckets::LATENCIES)]
    pub inclusion_latency: Histogram<Duration>,
}

#[vise::register]
pub(crate) static METRICS: vise::Global<QuerySenderMetrics> = vise::Global::new();
