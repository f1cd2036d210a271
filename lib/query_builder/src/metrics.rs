use vise::{Counter, Histogram, Metrics};

#[derive(Debug, Metrics)]
#[metrics(prefix = "query_builder")]
pub(crate) struct QueryBuilderMetrics {
    /// Number of queries built.
    pub built_queries: Counter,
    /// Number of build attempts rejected as incomplete.
    pub assembly_failures: Counter,
    /// Size of the encoded data query in bytes.
    #[metrics(buckets = vise::Buckets::exponential(16.0..=65_536.0, 2.0))]
    pub data_query_size: Histogram<usize>,
}

#[vise::register]
pub(crate) static METRICS: vise::Global<QueryBuilderMetrics> = vise::Global::new();
