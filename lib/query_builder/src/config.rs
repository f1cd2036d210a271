use alloy::consensus::constants::GWEI_TO_WEI;
use alloy::primitives::U256;
use smart_config::{DescribeConfig, DeserializeConfig};

/// Network-level parameters of a query.
#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct QueryBuilderConfig {
    /// Chain the subqueries read data from.
    #[config(default_t = 5)]
    pub source_chain_id: u64,
    /// Max fee per gas for the fulfillment transaction (in gwei).
    #[config(default_t = 25)]
    pub max_fee_per_gas_gwei: u64,
    /// Gas limit of the callback invoked once the query is fulfilled.
    #[config(default_t = 100_000)]
    pub callback_gas_limit: u32,
    /// Deposit sent along with the query (in gwei). Defaults to 0.03 ether.
    #[config(default_t = 30_000_000)]
    pub payment_gwei: u64,
    /// Address of the query contract.
    #[config(default_t = "0x0000000000000000000000000000000000000000".into())]
    pub query_address: String,
}

impl QueryBuilderConfig {
    /// Max fee per gas for the fulfillment transaction (in wei).
    pub fn max_fee_per_gas(&self) -> u64 {
        self.max_fee_per_gas_gwei.saturating_mul(GWEI_TO_WEI)
    }

    /// Deposit sent along with the query (in wei).
    pub fn payment(&self) -> U256 {
        U256::from(self.payment_gwei) * U256::from(GWEI_TO_WEI)
    }
}
