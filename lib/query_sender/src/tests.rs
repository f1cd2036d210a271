use super::*;
use alloy::primitives::{B256, Bytes, TxKind, U256};
use zkquery_query_builder::{QueryBuilder, QueryBuilderConfig};
use zkquery_types::{
    CallbackDescriptor, EncodedComputeArtifact, HeaderSubquery, ResolvedSubqueryList, Subquery,
};

fn submission_call() -> SubmissionCall {
    let builder = QueryBuilder::new(QueryBuilderConfig {
        query_address: "0xBd5307B0Bf573E3F2864Af960167b24Aa346952b".to_owned(),
        ..QueryBuilderConfig::default()
    });
    let compute = EncodedComputeArtifact {
        circuit_log_size: 10,
        verifying_key: vec![B256::repeat_byte(1)],
        compute_proof_hex: format!("0x{}", "11".repeat(64)),
        result_len: 1,
    };
    let data_query = ResolvedSubqueryList::from_ordered(vec![Subquery::Header(HeaderSubquery {
        block_number: 1,
        field_idx: 0,
    })])
    .unwrap();
    builder
        .build(&compute, &data_query, CallbackDescriptor::default())
        .unwrap()
        .into_submission(Address::repeat_byte(2))
}

#[test]
fn fee_caps_are_converted_to_wei() {
    let config = SenderConfig::default();
    assert_eq!(config.max_fee_per_gas(), 200_000_000_000);
    assert_eq!(config.max_priority_fee_per_gas(), 2_000_000_000);
    assert!(config.wait_for_receipt);
    assert!(!config.dry_run);
}

#[test]
fn tx_request_carries_the_call() {
    let config = SenderConfig::default();
    let call = submission_call();
    let from = Address::repeat_byte(9);

    let tx = query_tx_request(&call, from, &config);
    assert_eq!(tx.from, Some(from));
    assert_eq!(tx.to, Some(TxKind::Call(call.address)));
    assert_eq!(tx.value, Some(U256::from(30_000_000_000_000_000u64)));
    assert_eq!(tx.input.input(), Some(&call.calldata()));
    assert_eq!(tx.max_fee_per_gas, Some(config.max_fee_per_gas()));
    assert_eq!(
        tx.max_priority_fee_per_gas,
        Some(config.max_priority_fee_per_gas())
    );
    assert_eq!(tx.gas, Some(1_000_000));
}

#[tokio::test]
async fn invalid_dry_run_operator_address_is_rejected() {
    let config = SenderConfig {
        dry_run_operator_address: Some("not an address".to_owned()),
        ..SenderConfig::default()
    };
    let err = DryRunQuerySubmitter::connect(config).await.err().unwrap();
    assert!(err.to_string().contains("dry-run operator address"));
}

#[tokio::test]
async fn invalid_operator_key_is_rejected() {
    let config = SenderConfig {
        operator_pk: "0x1234".into(),
        ..SenderConfig::default()
    };
    let err = OnchainQuerySubmitter::connect(config).await.err().unwrap();
    assert!(err.to_string().contains("private key"));
}

#[test]
fn successful_simulation_reports_zero_hash() {
    let call = submission_call();
    let tx_hash = dry_run_outcome::<String>(&call, Ok(Bytes::from_static(&[1]))).unwrap();
    assert_eq!(tx_hash, DryRunQuerySubmitter::TX_HASH);
    assert_eq!(tx_hash, TxHash::ZERO);
}

#[test]
fn reverted_simulation_is_an_error() {
    let call = submission_call();
    let err = dry_run_outcome(&call, Err("execution reverted: query already exists"))
        .unwrap_err();
    assert!(err.to_string().contains("execution reverted"));
    assert!(err.to_string().contains("sendQuery"));
}

#[test]
fn failed_sends_are_counted() {
    let failures_before = METRICS.failed.get();
    let _ = dry_run_outcome(&submission_call(), Err("execution reverted"));
    assert!(METRICS.failed.get() > failures_before);
}
