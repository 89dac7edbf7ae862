//! Content key generation and restoration.
//!
//! # Data Flow
//! ```text
//! publish:  seeders → generate_content_keys → { key, quorum, parts[C1, D1] }
//! buy:      request_to_buy carries the buyer's ElGamal public key
//! restore:  content id → URI → purchase record (pubKey)
//!           → candidate ElGamal pair with that public key
//!           → restore_encryption_key(private, purchase id) → content key
//! ```
//!
//! Buyers may have rotated keys since the purchase, so restoration is handed
//! every ElGamal pair the caller holds and picks the one the purchase used.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::crypto::elgamal::{parse_decimal, ElGamalKeyPair};
use crate::error::{DcoreError, DcoreResult};
use crate::net::ConnectionManager;

/// One seeder's share of a content key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyParts {
    #[serde(rename = "C1")]
    pub c1: Value,
    #[serde(rename = "D1")]
    pub d1: Value,
}

/// A freshly generated content key and its seeder shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKeys {
    pub key: String,
    pub quorum: u32,
    pub parts: Vec<KeyParts>,
}

#[derive(Debug, Clone, Deserialize)]
struct ElGamalPublic {
    s: String,
}

/// Purchase record of one account for one content URI.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyingRecord {
    pub id: String,
    #[serde(rename = "pubKey")]
    pub_key: ElGamalPublic,
}

impl BuyingRecord {
    /// Decimal ElGamal public key recorded at purchase time.
    pub fn buyer_public_key(&self) -> &str {
        &self.pub_key.s
    }
}

/// Key exchange for purchased content.
#[derive(Debug, Clone)]
pub struct ContentKeyProtocol {
    manager: Arc<ConnectionManager>,
}

impl ContentKeyProtocol {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Ask the network for a content key split across `seeders`.
    pub async fn generate_content_keys(&self, seeders: &[String]) -> DcoreResult<ContentKeys> {
        let client = self.manager.connect().await?;
        let keys: ContentKeys = client
            .database("generate_content_keys", vec![json!(seeders)])
            .await?;
        tracing::debug!(seeders = seeders.len(), quorum = keys.quorum, "Content keys generated");
        Ok(keys)
    }

    /// Recover the decryption key of `content_id` bought by `account_id`.
    pub async fn restore_content_keys(
        &self,
        content_id: &str,
        account_id: &str,
        candidates: &[ElGamalKeyPair],
    ) -> DcoreResult<String> {
        let client = self.manager.connect().await?;

        let objects: Vec<Value> = client.database("get_objects", vec![json!([content_id])]).await?;
        let uri = objects
            .first()
            .and_then(|content| content.get("URI"))
            .and_then(Value::as_str)
            .ok_or_else(|| DcoreError::NotFound(format!("Content {}", content_id)))?
            .to_string();

        let record: Option<BuyingRecord> = client
            .database("get_buying_by_consumer_URI", vec![json!(account_id), json!(uri)])
            .await?;
        let record = record.ok_or_else(|| {
            DcoreError::NotFound(format!("Purchase of {} by {}", content_id, account_id))
        })?;

        let key = select_key(candidates, record.buyer_public_key(), content_id)?;

        let restored: String = client
            .database(
                "restore_encryption_key",
                vec![json!({ "s": key.private_decimal() }), json!(record.id)],
            )
            .await?;
        tracing::info!(content = content_id, purchase = %record.id, "Content key restored");
        Ok(restored)
    }
}

/// The candidate whose public key equals the purchase's.
fn select_key<'a>(
    candidates: &'a [ElGamalKeyPair],
    buyer_public: &str,
    content_id: &str,
) -> DcoreResult<&'a ElGamalKeyPair> {
    let expected = parse_decimal(buyer_public)?;
    let mut matches = candidates.iter().filter(|pair| pair.public_key == expected);

    let first = matches
        .next()
        .ok_or_else(|| DcoreError::KeyNotFound(content_id.to_string()))?;
    let extra = matches.count();
    if extra > 0 {
        tracing::warn!(
            content = content_id,
            duplicates = extra,
            "Several candidate keys match the purchase; using the first"
        );
    }
    Ok(first)
}
