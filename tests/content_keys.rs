//! Content key generation and restoration against a scripted node.

mod common;

use common::{single_node, ScriptedChannel};
use dcore_client::blockchain::ContentKeyProtocol;
use dcore_client::crypto::ElGamalKeyPair;
use dcore_client::DcoreError;
use serde_json::{json, Value};

const NODE: &str = "ws://node.test:8090";
const CONTENT: &str = "2.13.4";
const BUYER: &str = "1.2.27";

fn pairs() -> Vec<ElGamalKeyPair> {
    ["1001", "2002", "3003"]
        .iter()
        .map(|private| ElGamalKeyPair::from_decimal_private(private).unwrap())
        .collect()
}

fn node_with_purchase(buyer_public: &str) -> ScriptedChannel {
    ScriptedChannel::new(NODE)
        .respond("get_objects", json!([{ "id": CONTENT, "URI": "ipfs:QmContent" }]))
        .respond(
            "get_buying_by_consumer_URI",
            json!({ "id": "2.12.9", "consumer": BUYER, "URI": "ipfs:QmContent", "pubKey": { "s": buyer_public } }),
        )
        .respond("restore_encryption_key", json!("c0ffee"))
}

#[tokio::test]
async fn test_restore_uses_the_key_of_the_purchase() {
    let candidates = pairs();
    let node = node_with_purchase(&candidates[1].public_decimal()).into_arc();
    let protocol = ContentKeyProtocol::new(single_node(node.clone()));

    let key = protocol
        .restore_content_keys(CONTENT, BUYER, &candidates)
        .await
        .unwrap();
    assert_eq!(key, "c0ffee");

    assert_eq!(
        node.methods(),
        vec!["get_objects", "get_buying_by_consumer_URI", "restore_encryption_key"]
    );
    assert_eq!(node.calls_to("get_objects")[0].params, vec![json!([CONTENT])]);
    assert_eq!(
        node.calls_to("get_buying_by_consumer_URI")[0].params,
        vec![json!(BUYER), json!("ipfs:QmContent")]
    );
    assert_eq!(
        node.calls_to("restore_encryption_key")[0].params,
        vec![json!({ "s": "2002" }), json!("2.12.9")]
    );
}

#[tokio::test]
async fn test_restore_without_matching_key() {
    let stranger = ElGamalKeyPair::from_decimal_private("4004").unwrap();
    let node = node_with_purchase(&stranger.public_decimal()).into_arc();
    let protocol = ContentKeyProtocol::new(single_node(node.clone()));

    let err = protocol
        .restore_content_keys(CONTENT, BUYER, &pairs())
        .await
        .unwrap_err();
    assert!(matches!(err, DcoreError::KeyNotFound(id) if id == CONTENT));
    assert!(node.calls_to("restore_encryption_key").is_empty());
}

#[tokio::test]
async fn test_restore_unknown_content() {
    let node = ScriptedChannel::new(NODE)
        .respond("get_objects", json!([null]))
        .into_arc();
    let protocol = ContentKeyProtocol::new(single_node(node.clone()));

    let err = protocol
        .restore_content_keys(CONTENT, BUYER, &pairs())
        .await
        .unwrap_err();
    assert!(matches!(err, DcoreError::NotFound(_)));
    assert_eq!(node.methods(), vec!["get_objects"]);
}

#[tokio::test]
async fn test_restore_without_purchase() {
    let node = ScriptedChannel::new(NODE)
        .respond("get_objects", json!([{ "id": CONTENT, "URI": "ipfs:QmContent" }]))
        .respond("get_buying_by_consumer_URI", Value::Null)
        .into_arc();
    let protocol = ContentKeyProtocol::new(single_node(node));

    let err = protocol
        .restore_content_keys(CONTENT, BUYER, &pairs())
        .await
        .unwrap_err();
    assert!(matches!(err, DcoreError::NotFound(_)));
}

#[tokio::test]
async fn test_generate_content_keys() {
    let node = ScriptedChannel::new(NODE)
        .respond(
            "generate_content_keys",
            json!({
                "key": "5f1a",
                "quorum": 2,
                "parts": [
                    { "C1": { "s": "11" }, "D1": { "s": "12" } },
                    { "C1": { "s": "21" }, "D1": { "s": "22" } }
                ]
            }),
        )
        .into_arc();
    let protocol = ContentKeyProtocol::new(single_node(node.clone()));
    let seeders = vec!["1.2.17".to_string(), "1.2.18".to_string()];

    let keys = protocol.generate_content_keys(&seeders).await.unwrap();

    assert_eq!(keys.key, "5f1a");
    assert_eq!(keys.quorum, 2);
    assert_eq!(keys.parts.len(), 2);
    assert_eq!(node.calls_to("generate_content_keys")[0].params, vec![json!(seeders)]);
}
