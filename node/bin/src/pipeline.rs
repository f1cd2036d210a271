use alloy::primitives::{Address, TxHash};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use zkquery_execution_host::ExecutionHost;
use zkquery_query_builder::{QueryBuilder, QueryBuilderConfig, SubmissionCall};
use zkquery_query_sender::QuerySubmitter;
use zkquery_subquery_resolver::SubqueryResolver;
use zkquery_types::CallbackDescriptor;

/// End-to-end flow from computation inputs to a submitted query.
///
/// Stages run strictly one after another and any failure aborts the flow before the submitter
/// is reached. Each call builds its own query, so concurrent flows share no mutable state.
pub struct QueryPipeline {
    host: Arc<ExecutionHost>,
    resolver: SubqueryResolver,
    builder_config: QueryBuilderConfig,
    submitter: Arc<dyn QuerySubmitter>,
}

impl QueryPipeline {
    pub fn new(
        host: Arc<ExecutionHost>,
        resolver: SubqueryResolver,
        builder_config: QueryBuilderConfig,
        submitter: Arc<dyn QuerySubmitter>,
    ) -> Self {
        Self {
            host,
            resolver,
            builder_config,
            submitter,
        }
    }

    /// Runs every stage up to, but excluding, submission.
    pub async fn prepare(
        &self,
        inputs: &str,
        callback: CallbackDescriptor,
        requester: Address,
    ) -> anyhow::Result<SubmissionCall> {
        let started_at = Instant::now();
        let output = self
            .host
            .run(inputs)
            .await
            .context("failed to generate proof")?;
        tracing::info!(
            k = output.compute.circuit_log_size,
            result_len = output.compute.result_len,
            subqueries = output.data_query.len(),
            elapsed = ?started_at.elapsed(),
            "proof generated"
        );

        let data_query = self
            .resolver
            .resolve(output.data_query)
            .await
            .context("failed to resolve subqueries")?;
        let query = QueryBuilder::new(self.builder_config.clone())
            .build(&output.compute, &data_query, callback)
            .context("failed to build query")?;
        Ok(query.into_submission(requester))
    }

    pub async fn generate_and_send(
        &self,
        inputs: &str,
        callback: CallbackDescriptor,
        requester: Address,
    ) -> anyhow::Result<TxHash> {
        let call = self.prepare(inputs, callback, requester).await?;
        let data_query_hash = call.data_query_hash();
        let tx_hash = self
            .submitter
            .submit(call)
            .await
            .context("failed to submit query")?;
        tracing::info!(%tx_hash, %data_query_hash, "query submitted");
        Ok(tx_hash)
    }
}
