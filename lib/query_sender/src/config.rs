use alloy::consensus::constants::GWEI_TO_WEI;
use smart_config::value::SecretString;
use smart_config::{DescribeConfig, DeserializeConfig};

/// Configuration of the query sender.
#[derive(Clone, Debug, DescribeConfig, DeserializeConfig)]
#[config(derive(Default))]
pub struct SenderConfig {
    /// JSON-RPC endpoint of the chain hosting the query contract.
    #[config(default_t = "http://localhost:8545".into())]
    pub rpc_url: String,

    /// Private key to send queries from.
    // default address 0x36615Cf349d7F6344891B1e7CA7C72883F5dc049
    #[config(default_t = "0x7726827caac94a7f9e1b160f7ea819f172f7b6f9d2a97f992c38edeab82d4110".into())]
    pub operator_pk: SecretString,

    /// Max fee per gas we are willing to spend on the query transaction (in gwei).
    #[config(default_t = 200)]
    pub max_fee_per_gas_gwei: u64,

    /// Max priority fee per gas we are willing to spend (in gwei).
    #[config(default_t = 2)]
    pub max_priority_fee_per_gas_gwei: u64,

    /// Gas limit of the query transaction.
    #[config(default_t = 1_000_000)]
    pub gas_limit: u64,

    /// Whether to wait until the query transaction is included.
    #[config(default_t = true)]
    pub wait_for_receipt: bool,

    /// If true, use eth_call to simulate the query transaction instead of sending it onchain.
    #[config(default_t = false)]
    pub dry_run: bool,

    /// Optional address to simulate from in dry-run mode, so that no private key is needed.
    pub dry_run_operator_address: Option<String>,
}

impl SenderConfig {
    /// Max fee per gas we are willing to spend (in wei).
    pub fn max_fee_per_gas(&self) -> u128 {
        self.max_fee_per_gas_gwei as u128 * (GWEI_TO_WEI as u128)
    }

    /// Max priority fee per gas we are willing to spend (in wei).
    pub fn max_priority_fee_per_gas(&self) -> u128 {
        self.max_priority_fee_per_gas_gwei as u128 * (GWEI_TO_WEI as u128)
    }
}
