//! Memo decryption with rotated keys.

mod common;

use common::TEST_WIF;
use dcore_client::blockchain::{AssetAmount, Memo, MemoDecryptor, Operation, Wallet};
use dcore_client::crypto::PrivateKey;

#[test]
fn test_any_candidate_that_opens_the_memo_wins() {
    let sender = PrivateKey::from_wif(TEST_WIF).unwrap();
    let old = PrivateKey::from_brain_key("cunning shallow magic", 0).unwrap();
    let current = PrivateKey::from_brain_key("cunning shallow magic", 1).unwrap();
    let memo = Memo::encrypt("invoice 42", &sender, &old.public_key(), Some(7));

    let candidates = vec![current.to_wif(), "not a key".to_string(), old.to_wif()];
    assert_eq!(MemoDecryptor::decrypted_message(&memo, &candidates), "invoice 42");
}

#[test]
fn test_no_candidate_yields_empty_string() {
    let sender = PrivateKey::from_wif(TEST_WIF).unwrap();
    let recipient = PrivateKey::from_brain_key("cunning shallow magic", 0).unwrap();
    let memo = Memo::encrypt("invoice 42", &sender, &recipient.public_key(), None);

    let stranger = PrivateKey::from_brain_key("cunning shallow magic", 9).unwrap();
    assert_eq!(MemoDecryptor::decrypted_message_with_keys(&memo, &[stranger]), "");
    assert_eq!(MemoDecryptor::decrypted_message::<&str>(&memo, &[]), "");
}

#[test]
fn test_sender_can_read_own_memo() {
    let sender = PrivateKey::from_wif(TEST_WIF).unwrap();
    let recipient = PrivateKey::from_brain_key("cunning shallow magic", 0).unwrap();
    let memo = Memo::encrypt("for the record", &sender, &recipient.public_key(), None);

    assert_eq!(MemoDecryptor::decrypted_message(&memo, &[TEST_WIF]), "for the record");
}

#[test]
fn test_memo_survives_transfer_payload() {
    let alice = Wallet::from_wif(TEST_WIF).unwrap();
    let bob = Wallet::from_brain_key("cunning shallow magic", 0).unwrap();
    let memo = alice.memo_to(&bob.public_key(), "rent");

    let op = Operation::transfer("1.2.5", "1.2.6", AssetAmount::new(1, "1.3.0"), Some(memo)).unwrap();
    let from_payload: Memo = serde_json::from_value(op.payload()["memo"].clone()).unwrap();

    assert!(op.payload()["memo"]["nonce"].is_string());
    assert_eq!(bob.read_memo(&from_payload).unwrap(), "rent");
}
