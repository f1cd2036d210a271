//! Resolution of deferred transaction and receipt references.
//!
//! Subqueries produced by the computation point at transactions by `(block, index)`. The query
//! contract wants transaction hashes instead, so every such entry is looked up against the
//! chain-data provider before the data query can be built.

use alloy::primitives::B256;
use backon::{ExponentialBuilder, Retryable};
use futures::{StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use zkquery_types::{
    KindOrderError, RawSubqueryBatch, ReceiptSubquery, ResolvedSubqueryList, Subquery,
    SubqueryKind, TxSubquery,
};

mod config;
mod metrics;
mod provider;

pub use config::ResolverConfig;
pub use provider::ChainDataProvider;

use crate::metrics::METRICS;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(
        "{kind} subquery #{index} references a missing transaction (block {block_number}, tx index {tx_idx})"
    )]
    UnresolvedReference {
        kind: SubqueryKind,
        index: usize,
        block_number: u32,
        tx_idx: u32,
    },
    #[error("failed to fetch block {block_number}: {error:#}")]
    Provider {
        block_number: u32,
        error: anyhow::Error,
    },
    #[error(transparent)]
    Ordering(#[from] KindOrderError),
}

/// Transaction hashes of the fetched blocks; `None` for blocks the provider does not know.
type BlockTransactions = HashMap<u32, Option<Vec<B256>>>;

#[derive(Debug, Clone)]
pub struct SubqueryResolver {
    provider: Arc<dyn ChainDataProvider>,
    config: ResolverConfig,
}

impl SubqueryResolver {
    pub fn new(provider: Arc<dyn ChainDataProvider>, config: ResolverConfig) -> Self {
        Self { provider, config }
    }

    /// Flattens the batch in [`zkquery_types::SUBQUERY_KIND_ORDER`], replacing every
    /// `(block, index)` transaction reference with the transaction hash.
    ///
    /// Fails as a whole if any reference points to a missing block or transaction.
    pub async fn resolve(
        &self,
        batch: RawSubqueryBatch,
    ) -> Result<ResolvedSubqueryList, ResolveError> {
        let blocks = self.fetch_blocks(batch.referenced_blocks()).await?;

        let mut resolved = Vec::with_capacity(batch.len());
        resolved.extend(batch.header_subqueries.into_iter().map(Subquery::Header));
        resolved.extend(batch.account_subqueries.into_iter().map(Subquery::Account));
        resolved.extend(batch.storage_subqueries.into_iter().map(Subquery::Storage));

        for (index, tx) in batch.tx_subqueries.into_iter().enumerate() {
            let tx_hash = lookup_tx_hash(
                &blocks,
                SubqueryKind::Transaction,
                index,
                tx.block_number,
                tx.tx_idx,
            )?;
            resolved.push(Subquery::Transaction(TxSubquery {
                tx_hash,
                field_or_calldata_idx: tx.field_or_calldata_idx,
            }));
        }

        for (index, receipt) in batch.receipt_subqueries.into_iter().enumerate() {
            let tx_hash = lookup_tx_hash(
                &blocks,
                SubqueryKind::Receipt,
                index,
                receipt.block_number,
                receipt.tx_idx,
            )?;
            resolved.push(Subquery::Receipt(ReceiptSubquery {
                tx_hash,
                field_or_log_idx: receipt.field_or_log_idx,
                topic_or_data_or_address_idx: receipt.topic_or_data_or_address_idx,
                event_schema: receipt.event_schema,
            }));
        }

        resolved.extend(
            batch
                .solidity_nested_mapping_subqueries
                .into_iter()
                .map(Subquery::SolidityNestedMapping),
        );

        for subquery in &resolved {
            METRICS.resolved[&subquery.kind().into()].inc();
        }
        tracing::debug!(
            subqueries = resolved.len(),
            blocks = blocks.len(),
            "resolved data query"
        );
        Ok(ResolvedSubqueryList::from_ordered(resolved)?)
    }

    /// Fetches each referenced block once. Lookups run concurrently; the result is keyed by
    /// block number so completion order does not matter.
    async fn fetch_blocks(
        &self,
        block_numbers: impl Iterator<Item = u32>,
    ) -> Result<BlockTransactions, ResolveError> {
        let unique: BTreeSet<u32> = block_numbers.collect();
        METRICS.blocks_per_resolution.observe(unique.len());

        futures::stream::iter(unique)
            .map(|block_number| async move {
                let transactions = self.fetch_block(block_number).await?;
                Ok::<_, ResolveError>((block_number, transactions))
            })
            .buffer_unordered(self.config.max_concurrent_requests.max(1))
            .try_collect()
            .await
    }

    async fn fetch_block(&self, block_number: u32) -> Result<Option<Vec<B256>>, ResolveError> {
        let latency = METRICS.block_fetch_latency.start();
        let transactions = (|| self.provider.block_transaction_hashes(block_number.into()))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.config.retry_min_delay)
                    .with_max_times(self.config.max_retries),
            )
            .notify(|err, dur| {
                tracing::warn!(block_number, ?err, ?dur, "retrying block lookup");
            })
            .await
            .map_err(|error| ResolveError::Provider {
                block_number,
                error,
            })?;
        latency.observe();
        Ok(transactions)
    }
}

fn lookup_tx_hash(
    blocks: &BlockTransactions,
    kind: SubqueryKind,
    index: usize,
    block_number: u32,
    tx_idx: u32,
) -> Result<B256, ResolveError> {
    blocks
        .get(&block_number)
        .and_then(Option::as_ref)
        .and_then(|transactions| transactions.get(tx_idx as usize))
        .copied()
        .ok_or_else(|| {
            METRICS.unresolved_references.inc();
            tracing::warn!(
                %kind,
                index,
                block_number,
                tx_idx,
                "subquery references a missing transaction"
            );
            ResolveError::UnresolvedReference {
                kind,
                index,
                block_number,
                tx_idx,
            }
        })
}
