use alloy::primitives::B256;
use alloy::providers::{DynProvider, Provider};

/// Read access to the chain the subqueries refer to.
#[async_trait::async_trait]
pub trait ChainDataProvider: Send + Sync + std::fmt::Debug {
    /// Returns hashes of all transactions in the block, in block order,
    /// or `None` if the block does not exist.
    async fn block_transaction_hashes(&self, block_number: u64)
    -> anyhow::Result<Option<Vec<B256>>>;
}

#[async_trait::async_trait]
impl ChainDataProvider for DynProvider {
    async fn block_transaction_hashes(
        &self,
        block_number: u64,
    ) -> anyhow::Result<Option<Vec<B256>>> {
        // Hashes-only is the default kind for `eth_getBlockByNumber`.
        let block = self.get_block_by_number(block_number.into()).await?;
        Ok(block.map(|block| block.transactions.hashes().collect()))
    }
}
