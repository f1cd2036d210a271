//! Node configuration, read from `ZKQUERY_`-prefixed environment variables.
//!
//! Every component config lives under its own prefix, e.g. `ZKQUERY_RESOLVER_MAX_RETRIES`
//! or `ZKQUERY_SENDER_DRY_RUN`.

use smart_config::{
    ConfigRepository, ConfigSchema, DescribeConfig, DeserializeConfig, Environment,
};
use zkquery_execution_host::HostConfig;
use zkquery_observability::PrometheusConfig;
use zkquery_query_builder::QueryBuilderConfig;
use zkquery_query_sender::SenderConfig;
use zkquery_subquery_resolver::ResolverConfig;

pub const ENV_PREFIX: &str = "ZKQUERY_";

/// Chain the subqueries read data from.
#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct SourceChainConfig {
    /// JSON-RPC endpoint used to resolve transaction references.
    #[config(default_t = "http://localhost:8545".into())]
    pub rpc_url: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: HostConfig,
    pub source_chain: SourceChainConfig,
    pub resolver: ResolverConfig,
    pub query: QueryBuilderConfig,
    pub sender: SenderConfig,
    pub prometheus: PrometheusConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(Environment::prefixed(ENV_PREFIX))
    }

    pub fn load(env: Environment) -> anyhow::Result<Self> {
        let mut schema = ConfigSchema::default();
        schema.insert(&HostConfig::DESCRIPTION, "host")?;
        schema.insert(&SourceChainConfig::DESCRIPTION, "source_chain")?;
        schema.insert(&ResolverConfig::DESCRIPTION, "resolver")?;
        schema.insert(&QueryBuilderConfig::DESCRIPTION, "query")?;
        schema.insert(&SenderConfig::DESCRIPTION, "sender")?;
        schema.insert(&PrometheusConfig::DESCRIPTION, "prometheus")?;
        let repo = ConfigRepository::new(&schema).with(env);

        Ok(Self {
            host: parse(&repo)?,
            source_chain: parse(&repo)?,
            resolver: parse(&repo)?,
            query: parse(&repo)?,
            sender: parse(&repo)?,
            prometheus: parse(&repo)?,
        })
    }
}

fn parse<C: DeserializeConfig>(repo: &ConfigRepository<'_>) -> anyhow::Result<C> {
    repo.single::<C>()?.parse().map_err(|errors| {
        anyhow::anyhow!(
            "failed parsing `{}` config: {errors:?}",
            std::any::type_name::<C>()
        )
    })
}
