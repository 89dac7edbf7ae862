//! Fee, reference block, signing and broadcast ordering against a scripted node.

mod common;

use common::{single_node, ScriptedChannel, CHAIN_ID, TEST_WIF, TRANSACTION_HEX};
use dcore_client::blockchain::{AssetAmount, Operation, TransactionPipeline, TxState};
use dcore_client::config::TransactionConfig;
use dcore_client::crypto::hash::sha256;
use dcore_client::crypto::PrivateKey;
use dcore_client::net::RpcError;
use dcore_client::DcoreError;
use serde_json::json;

const NODE: &str = "ws://node.test:8090";

fn transfer() -> Operation {
    Operation::transfer("1.2.5", "1.2.6", AssetAmount::new(1_000, "1.3.0"), None).unwrap()
}

fn pipeline(channel: &std::sync::Arc<ScriptedChannel>) -> TransactionPipeline {
    TransactionPipeline::new(single_node(channel.clone()), TransactionConfig::default())
}

#[tokio::test]
async fn test_broadcast_follows_fixed_order() {
    let node = ScriptedChannel::node(NODE).into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let mut tx = pipeline.new_transaction();
    tx.add(transfer()).unwrap();
    let receipt = pipeline.broadcast(&mut tx, &key, true).await.unwrap();

    assert_eq!(
        node.methods(),
        vec![
            "get_required_fees",
            "get_dynamic_global_properties",
            "get_transaction_hex",
            "get_chain_id",
            "broadcast_transaction",
        ]
    );
    assert_eq!(tx.state(), TxState::Confirmed);
    assert_eq!(receipt.ref_block_num, 0x2345);
    assert_eq!(receipt.expiration, "2024-01-01T00:00:30");
    assert_eq!(tx.ref_block_prefix(), 0xddcc_bbaa);
    assert_eq!(tx.operations()[0].fee().unwrap(), &json!({ "amount": 5, "asset_id": "1.3.0" }));
}

#[tokio::test]
async fn test_signature_covers_chain_id_and_serialization() {
    let node = ScriptedChannel::node(NODE).into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let receipt = pipeline
        .broadcast_operations(vec![transfer()], &key, true)
        .await
        .unwrap();

    let encoded = hex::decode(TRANSACTION_HEX.trim_end_matches("00")).unwrap();
    let mut message = hex::decode(CHAIN_ID).unwrap();
    message.extend_from_slice(&encoded);
    let digest = sha256(&message);

    assert_eq!(receipt.signatures.len(), 1);
    let signature: [u8; 65] = hex::decode(&receipt.signatures[0]).unwrap().try_into().unwrap();
    assert!(key.public_key().verify_compact(&digest, &signature));
    assert_eq!(receipt.id.as_deref(), Some(hex::encode(&sha256(&encoded)[..20]).as_str()));

    let broadcast = node.calls_to("broadcast_transaction");
    let sent = &broadcast[0].params[0];
    assert_eq!(sent["signatures"][0], json!(receipt.signatures[0]));
    assert_eq!(sent["operations"][0][0], json!(39));
}

#[tokio::test]
async fn test_configured_chain_id_skips_the_query() {
    let node = ScriptedChannel::node(NODE).into_arc();
    let config = TransactionConfig {
        chain_id: Some(CHAIN_ID.to_string()),
        ..TransactionConfig::default()
    };
    let pipeline = TransactionPipeline::new(single_node(node.clone()), config);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    pipeline
        .broadcast_operations(vec![transfer()], &key, true)
        .await
        .unwrap();
    pipeline
        .broadcast_operations(vec![transfer()], &key, true)
        .await
        .unwrap();

    assert!(node.calls_to("get_chain_id").is_empty());
    assert_eq!(node.calls_to("broadcast_transaction").len(), 2);
}

#[tokio::test]
async fn test_unsigned_broadcast_has_no_id() {
    let node = ScriptedChannel::node(NODE).into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let receipt = pipeline
        .broadcast_operations(vec![transfer()], &key, false)
        .await
        .unwrap();

    assert_eq!(receipt.id, None);
    assert!(receipt.signatures.is_empty());
    assert!(node.calls_to("get_transaction_hex").is_empty());
    assert_eq!(node.calls_to("broadcast_transaction").len(), 1);
}

#[tokio::test]
async fn test_remote_rejection() {
    let node = ScriptedChannel::node(NODE)
        .fail(
            "broadcast_transaction",
            RpcError::Remote {
                message: "insufficient balance".into(),
            },
        )
        .into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let mut tx = pipeline.new_transaction();
    tx.add(transfer()).unwrap();
    let err = pipeline.broadcast(&mut tx, &key, true).await.unwrap_err();

    assert!(matches!(err, DcoreError::BroadcastRejected(message) if message == "insufficient balance"));
    assert_eq!(tx.state(), TxState::Failed);
}

#[tokio::test]
async fn test_transport_failure_during_broadcast() {
    let node = ScriptedChannel::node(NODE)
        .fail("broadcast_transaction", RpcError::Closed)
        .into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let err = pipeline
        .broadcast_operations(vec![transfer()], &key, true)
        .await
        .unwrap_err();
    assert!(matches!(err, DcoreError::BroadcastTransportError(_)));
}

#[tokio::test]
async fn test_fee_count_mismatch_stops_before_reference_block() {
    let node = ScriptedChannel::node(NODE)
        .respond("get_required_fees", json!([]))
        .into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let mut tx = pipeline.new_transaction();
    tx.add(transfer()).unwrap();
    let err = pipeline.broadcast(&mut tx, &key, true).await.unwrap_err();

    assert!(matches!(err, DcoreError::FeeComputationFailed(_)));
    assert_eq!(tx.state(), TxState::Failed);
    assert_eq!(node.methods(), vec!["get_required_fees"]);
}

#[tokio::test]
async fn test_fee_query_failure() {
    let node = ScriptedChannel::node(NODE)
        .fail("get_required_fees", RpcError::Transport("reset".into()))
        .into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let err = pipeline
        .broadcast_operations(vec![transfer()], &key, true)
        .await
        .unwrap_err();
    assert!(matches!(err, DcoreError::FeeComputationFailed(_)));
    assert!(node.calls_to("broadcast_transaction").is_empty());
}

#[tokio::test]
async fn test_reference_block_failure_stops_before_signing() {
    let node = ScriptedChannel::node(NODE)
        .fail("get_dynamic_global_properties", RpcError::Transport("reset".into()))
        .into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let mut tx = pipeline.new_transaction();
    tx.add(transfer()).unwrap();
    let err = pipeline.broadcast(&mut tx, &key, true).await.unwrap_err();

    assert!(matches!(err, DcoreError::SigningFailed(ref cause) if cause.contains("reset")), "{err}");
    assert_eq!(tx.state(), TxState::Failed);
    assert_eq!(
        node.methods(),
        vec!["get_required_fees", "get_dynamic_global_properties"]
    );
}

#[tokio::test]
async fn test_malformed_head_block_is_a_signing_failure() {
    let node = ScriptedChannel::node(NODE)
        .respond(
            "get_dynamic_global_properties",
            json!({ "head_block_number": 1, "head_block_id": "zz", "time": "2024-01-01T00:00:00" }),
        )
        .into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let err = pipeline
        .broadcast_operations(vec![transfer()], &key, true)
        .await
        .unwrap_err();
    assert!(matches!(err, DcoreError::SigningFailed(_)), "{err}");
    assert!(node.calls_to("broadcast_transaction").is_empty());
}

#[tokio::test]
async fn test_nested_fee_takes_outer_amount() {
    let node = ScriptedChannel::node(NODE)
        .respond(
            "get_required_fees",
            json!([[{ "amount": 7, "asset_id": "1.3.0" }, [{ "amount": 1, "asset_id": "1.3.0" }]]]),
        )
        .into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let mut tx = pipeline.new_transaction();
    tx.add(transfer()).unwrap();
    pipeline.broadcast(&mut tx, &key, false).await.unwrap();
    assert_eq!(tx.operations()[0].fee().unwrap()["amount"], 7);
}

#[tokio::test]
async fn test_broadcast_requires_operations() {
    let node = ScriptedChannel::node(NODE).into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let mut tx = pipeline.new_transaction();
    let err = pipeline.broadcast(&mut tx, &key, true).await.unwrap_err();
    assert!(matches!(err, DcoreError::InvalidState(_)));
    assert!(node.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_broadcasts_share_one_connection() {
    let node = ScriptedChannel::node(NODE).into_arc();
    let pipeline = pipeline(&node);
    let key = PrivateKey::from_wif(TEST_WIF).unwrap();

    let (first, second) = tokio::join!(
        pipeline.broadcast_operations(vec![transfer()], &key, true),
        pipeline.broadcast_operations(vec![transfer()], &key, true),
    );
    assert!(first.is_ok() && second.is_ok());
    assert_eq!(node.calls_to("broadcast_transaction").len(), 2);
    assert_eq!(node.calls_to("get_chain_id").len(), 1);
}
