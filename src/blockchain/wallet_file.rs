//! Wallet export files.
//!
//! The file is plain JSON; only `cipher_keys` is secret. It holds the hex
//! ciphertext ([`encrypt_to_hex_string`]) of a JSON [`PlainKeys`] blob whose
//! `checksum` is `sha512(password)` in hex, which is how a wrong password
//! is told apart from a readable file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use zeroize::Zeroizing;

use crate::crypto::elgamal::ElGamalKeyPair;
use crate::crypto::envelope::{decrypt_hex_string, encrypt_to_hex_string};
use crate::crypto::hash::sha512_hex;
use crate::crypto::keys::PrivateKey;
use crate::error::{DcoreError, DcoreResult};

/// Decrypted key material of a wallet file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainKeys {
    /// `(public key string, WIF)` pairs.
    pub ec_keys: Vec<(String, String)>,
    /// `(public, private)` ElGamal pairs as decimal strings.
    pub el_gamal_keys: Vec<(String, String)>,
    pub checksum: String,
}

impl PlainKeys {
    /// Add an EC key and the ElGamal pair derived from it.
    pub fn add_key(&mut self, key: &PrivateKey) {
        self.ec_keys.push((key.public_key().to_string(), key.to_wif()));
        let pair = ElGamalKeyPair::from_private_key(key);
        self.el_gamal_keys.push((pair.public_decimal(), pair.private_decimal()));
    }

    /// Parsed EC keys; entries with a malformed WIF are skipped.
    pub fn private_keys(&self) -> Vec<PrivateKey> {
        self.ec_keys
            .iter()
            .filter_map(|(public, wif)| match PrivateKey::from_wif(wif) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(public_key = %public, error = %e, "Skipping unreadable wallet key");
                    None
                }
            })
            .collect()
    }

    /// Parsed ElGamal pairs; the public half is recomputed from the private one.
    pub fn el_gamal_pairs(&self) -> Vec<ElGamalKeyPair> {
        self.el_gamal_keys
            .iter()
            .filter_map(|(public, private)| match ElGamalKeyPair::from_decimal_private(private) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    tracing::warn!(public_key = %public, error = %e, "Skipping unreadable ElGamal key");
                    None
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for PlainKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainKeys")
            .field("ec_keys", &self.ec_keys.len())
            .field("el_gamal_keys", &self.el_gamal_keys.len())
            .finish_non_exhaustive()
    }
}

/// A wallet export file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletExport {
    pub version: u32,
    pub chain_id: String,
    pub my_accounts: Vec<Value>,
    pub cipher_keys: String,
    pub extra_keys: Vec<Value>,
    pub pending_account_registrations: Vec<Value>,
    pub pending_miner_registrations: Vec<Value>,
    pub ws_server: String,
    pub ws_user: String,
    pub ws_password: String,
}

impl WalletExport {
    pub fn from_json(json: &str) -> DcoreResult<Self> {
        serde_json::from_str(json).map_err(|e| DcoreError::Crypto(format!("Invalid wallet file: {}", e)))
    }

    pub fn to_json(&self) -> DcoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DcoreError::Crypto(format!("Wallet serialization failed: {}", e)))
    }

    pub fn load(path: &Path) -> DcoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DcoreError::NotFound(format!("Wallet file {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Encrypt `keys` under `password` into `cipher_keys`, stamping the checksum.
    pub fn lock(&mut self, mut keys: PlainKeys, password: &str) -> DcoreResult<()> {
        keys.checksum = sha512_hex(password.as_bytes());
        let plain = Zeroizing::new(
            serde_json::to_string(&keys)
                .map_err(|e| DcoreError::Crypto(format!("Key serialization failed: {}", e)))?,
        );
        self.cipher_keys = encrypt_to_hex_string(&plain, password);
        Ok(())
    }

    /// Decrypt `cipher_keys`. A wrong password is [`DcoreError::ChecksumMismatch`].
    pub fn unlock(&self, password: &str) -> DcoreResult<PlainKeys> {
        let plain = Zeroizing::new(
            decrypt_hex_string(&self.cipher_keys, password).map_err(|_| DcoreError::ChecksumMismatch)?,
        );
        let keys: PlainKeys = serde_json::from_str(&plain).map_err(|_| DcoreError::ChecksumMismatch)?;
        if keys.checksum != sha512_hex(password.as_bytes()) {
            return Err(DcoreError::ChecksumMismatch);
        }
        Ok(keys)
    }
}
