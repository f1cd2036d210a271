use smart_config::{DescribeConfig, DeserializeConfig};
use std::time::Duration;

/// Configuration of the subquery resolver.
#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct ResolverConfig {
    /// Max number of block lookups in flight at the same time.
    #[config(default_t = 8)]
    pub max_concurrent_requests: usize,
    /// How many times a failed block lookup is retried before resolution is aborted.
    #[config(default_t = 3)]
    pub max_retries: usize,
    /// Delay before the first retry, doubled on each attempt.
    #[config(default_t = Duration::from_millis(250))]
    pub retry_min_delay: Duration,
}
