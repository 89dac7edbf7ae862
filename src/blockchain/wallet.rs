//! Signing identity of one account.
//!
//! # Security
//! - Keys are loaded from WIF, a brain key or the environment
//! - Keys are never logged or serialized; `Debug` shows only public data
//! - The ElGamal pair is derived from the EC key, never stored separately

use crate::blockchain::memo::Memo;
use crate::crypto::elgamal::ElGamalKeyPair;
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::error::{DcoreError, DcoreResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "DCORE_PRIVATE_KEY";

/// An EC key and its derived ElGamal pair, optionally tied to an account id.
#[derive(Debug, Clone)]
pub struct Wallet {
    key: PrivateKey,
    el_gamal: ElGamalKeyPair,
    account_id: Option<String>,
}

impl Wallet {
    pub fn new(key: PrivateKey) -> Self {
        let el_gamal = ElGamalKeyPair::from_private_key(&key);
        tracing::info!(public_key = %key.public_key(), "Wallet initialized");
        Self {
            key,
            el_gamal,
            account_id: None,
        }
    }

    /// Create a wallet from a WIF-encoded private key.
    pub fn from_wif(wif: &str) -> DcoreResult<Self> {
        Ok(Self::new(PrivateKey::from_wif(wif)?))
    }

    /// Create a wallet from a brain key and sequence number.
    pub fn from_brain_key(brain_key: &str, sequence: u32) -> DcoreResult<Self> {
        Ok(Self::new(PrivateKey::from_brain_key(brain_key, sequence)?))
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `DCORE_PRIVATE_KEY` (WIF) from environment.
    pub fn from_env() -> DcoreResult<Self> {
        let wif = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            DcoreError::InvalidKey(format!("Environment variable {} not set", PRIVATE_KEY_ENV_VAR))
        })?;
        Self::from_wif(&wif)
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    pub fn el_gamal(&self) -> &ElGamalKeyPair {
        &self.el_gamal
    }

    /// Sign a 32-byte digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> DcoreResult<[u8; 65]> {
        self.key.sign_digest(digest)
    }

    /// Encrypt a memo for `recipient` with a random nonce.
    pub fn memo_to(&self, recipient: &PublicKey, message: &str) -> Memo {
        Memo::encrypt(message, &self.key, recipient, None)
    }

    pub fn read_memo(&self, memo: &Memo) -> DcoreResult<String> {
        memo.decrypt(&self.key)
    }
}
