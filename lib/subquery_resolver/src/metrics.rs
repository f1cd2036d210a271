use std::time::Duration;
use vise::{Buckets, Counter, EncodeLabelSet, EncodeLabelValue, Family, Histogram, Metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue, EncodeLabelSet)]
#[metrics(label = "kind", rename_all = "snake_case")]
pub(crate) enum ResolvedKind {
    Header,
    Account,
    Storage,
    Transaction,
    Receipt,
    SolidityNestedMapping,
}

impl From<zkquery_types::SubqueryKind> for ResolvedKind {
    fn from(kind: zkquery_types::SubqueryKind) -> Self {
        use zkquery_types::SubqueryKind;
        match kind {
            SubqueryKind::Header => Self::Header,
            SubqueryKind::Account => Self::Account,
            SubqueryKind::Storage => Self::Storage,
            SubqueryKind::Transaction => Self::Transaction,
            SubqueryKind::Receipt => Self::Receipt,
            SubqueryKind::SolidityNestedMapping => Self::SolidityNestedMapping,
        }
    }
}

#[derive(Debug, Metrics)]
#[metrics(prefix = "subquery_resolver")]
pub(crate) struct ResolverMetrics {
    /// Latency of a single block lookup, retries included.
    #[metrics(buckets = Buckets::LATENCIES)]
    pub block_fetch_latency: Histogram<Duration>,
    /// Number of distinct blocks fetched per resolution.
    #[metrics(buckets = Buckets::exponential(1.0..=1024.0, 2.0))]
    pub blocks_per_resolution: Histogram<usize>,
    /// Number of resolved subqueries by kind.
    pub resolved: Family<ResolvedKind, Counter>,
    /// Number of resolutions aborted because of a dangling reference.
    pub unresolved_references: Counter,
}

#[vise::register]
pub(crate) static METRICS: vise::Global<ResolverMetrics> = vise::Global::new();
