use alloy::hex;
use alloy::primitives::{Address, Bytes, keccak256};
use serde_json::json;
use std::time::Duration;
use zkquery_execution_host::HostError;
use zkquery_integration_tests::{InMemoryChain, Tester, bundle, tx_hash};
use zkquery_subquery_resolver::ResolveError;
use zkquery_types::CallbackDescriptor;

fn callback() -> CallbackDescriptor {
    CallbackDescriptor {
        target: Address::repeat_byte(0xcb),
        extra_data: Bytes::from_static(b"hello"),
    }
}

fn tx_at(block_number: u32, tx_idx: u32) -> serde_json::Value {
    json!({ "blockNumber": block_number, "txIdx": tx_idx, "fieldOrCalldataIdx": 0 })
}

#[test_log::test(tokio::test)]
async fn proof_and_resolved_query_are_submitted() -> anyhow::Result<()> {
    let bundle = bundle(
        &[0, 1, 2, 3],
        Some("0xabcd"),
        json!({ "txSubqueries": [tx_at(100, 2)] }),
    );
    let tester = Tester::setup(&bundle, InMemoryChain::default().with_block(100, 3)).await?;

    let tx_hash_sent = tester
        .pipeline
        .generate_and_send("{}", callback(), Tester::requester())
        .await?;
    let calls = tester.submitter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(tx_hash_sent.0[31], 1);

    let args = &calls[0].args;
    let expected_proof = hex::decode(format!("{:064x}{:032x}{:032x}abcd", 1, 2, 3))?;
    assert_eq!(&args.computeQuery.computeProof[..], expected_proof.as_slice());
    assert_eq!(args.computeQuery.resultLen, 2);
    assert_eq!(args.computeQuery.vkey.len(), 2);
    assert_eq!(&args.callback.extraData[..], b"hello");
    assert_eq!(args.refundee, Tester::requester());

    // The transaction reference was replaced with the hash at index 2 of block 100.
    assert_eq!(args.dataQueryHash, keccak256(&args.dataQuery));
    let resolved = tx_hash(100, 2);
    assert!(
        args.dataQuery
            .windows(32)
            .any(|window| window == resolved.as_slice())
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn malformed_inputs_do_not_poison_the_host() -> anyhow::Result<()> {
    let bundle = bundle(&[0, 1, 2, 3], Some("0xabcd"), json!({}));
    let tester = Tester::setup(&bundle, InMemoryChain::default()).await?;

    let err = tester
        .pipeline
        .generate_and_send("{not json", callback(), Tester::requester())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HostError>(),
        Some(HostError::InvalidInput(_))
    ));
    assert!(tester.submitter.calls().is_empty());
    assert!(!tester.host.is_busy());

    tester
        .pipeline
        .generate_and_send("{}", callback(), Tester::requester())
        .await?;
    assert_eq!(tester.submitter.calls().len(), 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn missing_proof_is_not_submitted() -> anyhow::Result<()> {
    let bundle = bundle(&[0, 1, 2, 3], None, json!({}));
    let tester = Tester::setup(&bundle, InMemoryChain::default()).await?;

    let err = tester
        .pipeline
        .generate_and_send("{}", callback(), Tester::requester())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HostError>(),
        Some(HostError::ProofUnavailable)
    ));
    assert!(tester.submitter.calls().is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn dangling_reference_is_not_submitted() -> anyhow::Result<()> {
    let bundle = bundle(
        &[0, 1, 2, 3],
        Some("0xabcd"),
        json!({ "txSubqueries": [tx_at(100, 5)] }),
    );
    let tester = Tester::setup(&bundle, InMemoryChain::default().with_block(100, 3)).await?;

    let err = tester
        .pipeline
        .generate_and_send("{}", callback(), Tester::requester())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResolveError>(),
        Some(ResolveError::UnresolvedReference { tx_idx: 5, .. })
    ));
    assert!(tester.submitter.calls().is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn data_query_order_ignores_lookup_latency() -> anyhow::Result<()> {
    let data_query = json!({
        "headerSubqueries": [{ "blockNumber": 1, "fieldIdx": 0 }],
        "txSubqueries": [tx_at(50, 0), tx_at(100, 1)],
        "receiptSubqueries": [{
            "blockNumber": 100,
            "txIdx": 0,
            "fieldOrLogIdx": 0,
            "topicOrDataOrAddressIdx": 0,
            "eventSchema": format!("0x{}", "ee".repeat(32)),
        }],
    });
    let bundle = bundle(&[0, 1, 2, 3], Some("0xabcd"), data_query);
    let chain = InMemoryChain::default()
        .with_block(50, 1)
        .with_block(100, 2)
        .with_delay(50, Duration::from_millis(100));
    let tester = Tester::setup(&bundle, chain).await?;

    let call = tester
        .pipeline
        .prepare("{}", callback(), Tester::requester())
        .await?;
    let encoded = &call.args.dataQuery[..];
    assert_eq!(&encoded[8..10], &4u16.to_be_bytes());

    let position = |hash: alloy::primitives::B256| {
        encoded
            .windows(32)
            .position(|window| window == hash.as_slice())
            .unwrap()
    };
    let first_tx = position(tx_hash(50, 0));
    let second_tx = position(tx_hash(100, 1));
    let receipt = position(tx_hash(100, 0));
    assert!(first_tx < second_tx && second_tx < receipt);
    assert!(tester.submitter.calls().is_empty());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn repeated_flows_use_fresh_salts() -> anyhow::Result<()> {
    let bundle = bundle(&[0, 1, 2, 3], Some("0xabcd"), json!({}));
    let tester = Tester::setup(&bundle, InMemoryChain::default()).await?;

    for _ in 0..3 {
        tester
            .pipeline
            .generate_and_send("{}", callback(), Tester::requester())
            .await?;
    }
    let calls = tester.submitter.calls();
    assert_eq!(calls.len(), 3);
    assert!(
        calls
            .iter()
            .all(|call| call.args.dataQueryHash == calls[0].args.dataQueryHash)
    );
    assert_ne!(calls[0].args.userSalt, calls[1].args.userSalt);
    assert_ne!(calls[1].args.userSalt, calls[2].args.userSalt);
    assert_ne!(calls[0].args.userSalt, calls[2].args.userSalt);
    Ok(())
}
