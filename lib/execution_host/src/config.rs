use smart_config::{DescribeConfig, DeserializeConfig};

#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct HostConfig {
    /// Number of threads the proving backend may use. 0 means all available cores.
    #[config(default_t = 0)]
    pub concurrency_hint: usize,
}

impl HostConfig {
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency_hint == 0 {
            num_cpus::get()
        } else {
            self.concurrency_hint
        }
    }
}
