//! Transfer memos and best-effort memo decryption.
//!
//! A memo is encrypted with the ECDH secret of the sender's private key and
//! the receiver's public key, so either party can open it with their own
//! private key and the other side's public key.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::aes::{decrypt_with_checksum, encrypt_with_checksum};
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::error::{DcoreError, DcoreResult};
use crate::observability::metrics;

/// An encrypted memo attached to a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub from: PublicKey,
    pub to: PublicKey,
    #[serde(serialize_with = "nonce_as_string", deserialize_with = "nonce_from_any")]
    pub nonce: u64,
    /// Hex ciphertext.
    pub message: String,
}

impl Memo {
    /// Encrypt `message` from `sender` to `recipient`. A random nonce is used when none is given.
    pub fn encrypt(
        message: &str,
        sender: &PrivateKey,
        recipient: &PublicKey,
        nonce: Option<u64>,
    ) -> Self {
        let nonce = nonce.unwrap_or_else(|| rand::thread_rng().gen());
        let ciphertext = encrypt_with_checksum(sender, recipient, nonce, message.as_bytes());
        Self {
            from: sender.public_key(),
            to: recipient.clone(),
            nonce,
            message: hex::encode(ciphertext),
        }
    }

    /// Open the memo with either party's private key.
    pub fn decrypt(&self, key: &PrivateKey) -> DcoreResult<String> {
        let counterparty = if key.public_key() == self.from {
            &self.to
        } else {
            &self.from
        };
        let ciphertext = hex::decode(&self.message)
            .map_err(|e| DcoreError::Crypto(format!("Memo message is not hex: {}", e)))?;
        let plaintext = decrypt_with_checksum(key, counterparty, self.nonce, &ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| DcoreError::Crypto("Memo plaintext is not UTF-8".to_string()))
    }
}

/// Tries candidate keys against historical memos.
///
/// Keys rotate, so the key that opens an old memo may not be the current
/// one. Every failure is a normal outcome here.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoDecryptor;

impl MemoDecryptor {
    /// Plaintext of `memo` under the first WIF that opens it, or an empty string.
    ///
    /// Malformed WIFs are skipped.
    pub fn decrypted_message<S: AsRef<str>>(memo: &Memo, candidate_wifs: &[S]) -> String {
        let keys = candidate_wifs.iter().filter_map(|wif| match PrivateKey::from_wif(wif.as_ref()) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed candidate key");
                None
            }
        });
        Self::first_match(memo, keys)
    }

    /// Same as [`MemoDecryptor::decrypted_message`] for already parsed keys.
    pub fn decrypted_message_with_keys(memo: &Memo, candidates: &[PrivateKey]) -> String {
        Self::first_match(memo, candidates.iter().cloned())
    }

    fn first_match(memo: &Memo, keys: impl Iterator<Item = PrivateKey>) -> String {
        for (attempt, key) in keys.enumerate() {
            match memo.decrypt(&key) {
                Ok(plaintext) => {
                    metrics::record_memo_decryption(true);
                    tracing::debug!(attempt, "Memo decrypted");
                    return plaintext;
                }
                Err(DcoreError::ChecksumMismatch) => continue,
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Memo candidate failed");
                }
            }
        }
        metrics::record_memo_decryption(false);
        String::new()
    }
}

fn nonce_as_string<S: Serializer>(nonce: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(nonce)
}

fn nonce_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Nonce {
        Number(u64),
        Text(String),
    }

    match Nonce::deserialize(deserializer)? {
        Nonce::Number(n) => Ok(n),
        Nonce::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
