//! Elliptic-curve keys of the network (secp256k1).
//!
//! # Formats
//! - Private keys travel as WIF: base58(`0x80 || key || checksum`), the
//!   checksum being the first 4 bytes of a double SHA-256.
//! - Public keys travel as `DCT` + base58(`compressed point || ripemd160(point)[..4]`).
//!
//! # Security
//! - Private keys are never logged; `Debug` is redacted.
//! - Secret scalars are zeroized on drop by `k256`.

use k256::ecdsa::signature::hazmat::RandomizedPrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::crypto::hash::{ripemd160, sha256, sha512};
use crate::error::{DcoreError, DcoreResult};

/// Prefix of every public key string on the network.
pub const ADDRESS_PREFIX: &str = "DCT";

const WIF_VERSION: u8 = 0x80;
const MAX_SIGNING_ATTEMPTS: usize = 64;

/// A secp256k1 private key.
#[derive(Clone)]
pub struct PrivateKey {
    secret: k256::SecretKey,
}

impl PrivateKey {
    /// Create a key from its raw 32-byte scalar.
    pub fn from_bytes(bytes: &[u8]) -> DcoreResult<Self> {
        let secret = k256::SecretKey::from_slice(bytes)
            .map_err(|e| DcoreError::InvalidKey(format!("Invalid private key bytes: {}", e)))?;
        Ok(Self { secret })
    }

    /// Parse a WIF-encoded private key.
    pub fn from_wif(wif: &str) -> DcoreResult<Self> {
        let raw = Zeroizing::new(
            bs58::decode(wif.trim())
                .into_vec()
                .map_err(|e| DcoreError::InvalidKey(format!("Invalid WIF encoding: {}", e)))?,
        );
        if raw.len() != 37 || raw[0] != WIF_VERSION {
            return Err(DcoreError::InvalidKey("Invalid WIF length or version".to_string()));
        }

        let (payload, checksum) = raw.split_at(33);
        if sha256(&sha256(payload))[..4] != *checksum {
            return Err(DcoreError::InvalidKey("WIF checksum mismatch".to_string()));
        }

        Self::from_bytes(&payload[1..])
    }

    /// Derive a key from a brain key and a sequence number.
    ///
    /// The brain key is normalized (trimmed, inner whitespace collapsed) and
    /// the key is `sha256(sha512(normalized + " " + sequence))`.
    pub fn from_brain_key(brain_key: &str, sequence: u32) -> DcoreResult<Self> {
        let normalized = normalize_brain_key(brain_key);
        if normalized.is_empty() {
            return Err(DcoreError::InvalidKey("Brain key is empty".to_string()));
        }
        let seed = Zeroizing::new(format!("{} {}", normalized, sequence));
        let stretched = Zeroizing::new(sha512(seed.as_bytes()));
        Self::from_bytes(&sha256(&stretched[..]))
    }

    /// Raw 32-byte scalar.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Encode as WIF.
    pub fn to_wif(&self) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(37));
        payload.push(WIF_VERSION);
        payload.extend_from_slice(&self.to_bytes()[..]);
        let checksum = sha256(&sha256(&payload));
        payload.extend_from_slice(&checksum[..4]);
        bs58::encode(payload.as_slice()).into_string()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.secret.public_key(),
        }
    }

    /// ECDH shared secret with `other`: SHA-512 of the shared point's x coordinate.
    pub fn shared_secret(&self, other: &PublicKey) -> Zeroizing<[u8; 64]> {
        let shared = k256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), other.inner.as_affine());
        Zeroizing::new(sha512(shared.raw_secret_bytes()))
    }

    /// Sign a 32-byte digest, returning the 65-byte compact recoverable form.
    ///
    /// The network only accepts canonical signatures, so non-canonical
    /// results are discarded and signing is repeated with fresh randomness.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> DcoreResult<[u8; 65]> {
        let signing_key = SigningKey::from(&self.secret);

        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| DcoreError::SigningFailed(format!("ECDSA signing failed: {}", e)))?;
        let (signature, recovery_id) = normalize(signature, recovery_id);
        let compact = compact_signature(&signature, recovery_id);
        if is_canonical(&compact) {
            return Ok(compact);
        }

        let verifying_key = *signing_key.verifying_key();
        for attempt in 1..=MAX_SIGNING_ATTEMPTS {
            let signature: Signature = signing_key
                .sign_prehash_with_rng(&mut OsRng, digest)
                .map_err(|e| DcoreError::SigningFailed(format!("ECDSA signing failed: {}", e)))?;
            let signature = signature.normalize_s().unwrap_or(signature);
            let recovery_id =
                RecoveryId::trial_recovery_from_prehash(&verifying_key, digest, &signature)
                    .map_err(|e| DcoreError::SigningFailed(format!("Key recovery failed: {}", e)))?;
            let compact = compact_signature(&signature, recovery_id);
            if is_canonical(&compact) {
                tracing::trace!(attempt, "Canonical signature found");
                return Ok(compact);
            }
        }

        Err(DcoreError::SigningFailed(
            "Could not produce a canonical signature".to_string(),
        ))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public_key().to_string())
            .finish_non_exhaustive()
    }
}

impl FromStr for PrivateKey {
    type Err = DcoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wif(s)
    }
}

/// A compressed secp256k1 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: k256::PublicKey,
}

impl PublicKey {
    /// Create a key from SEC1 bytes (compressed or not).
    pub fn from_bytes(bytes: &[u8]) -> DcoreResult<Self> {
        let inner = k256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|e| DcoreError::InvalidKey(format!("Invalid public key bytes: {}", e)))?;
        Ok(Self { inner })
    }

    /// Compressed 33-byte SEC1 encoding.
    pub fn to_bytes(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out.copy_from_slice(self.inner.to_encoded_point(true).as_bytes());
        out
    }

    /// Check a compact signature produced by [`PrivateKey::sign_digest`].
    pub fn verify_compact(&self, digest: &[u8; 32], compact: &[u8; 65]) -> bool {
        let Some(recovery_id) = compact[0]
            .checked_sub(31)
            .and_then(RecoveryId::from_byte)
        else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&compact[1..]) else {
            return false;
        };
        VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map(|recovered| recovered == VerifyingKey::from(&self.inner))
            .unwrap_or(false)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let point = self.to_bytes();
        let mut payload = Vec::with_capacity(37);
        payload.extend_from_slice(&point);
        payload.extend_from_slice(&ripemd160(&point)[..4]);
        write!(f, "{}{}", ADDRESS_PREFIX, bs58::encode(payload).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl FromStr for PublicKey {
    type Err = DcoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s.strip_prefix(ADDRESS_PREFIX).ok_or_else(|| {
            DcoreError::InvalidKey(format!("Public key must start with {}", ADDRESS_PREFIX))
        })?;
        let raw = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| DcoreError::InvalidKey(format!("Invalid public key encoding: {}", e)))?;
        if raw.len() != 37 {
            return Err(DcoreError::InvalidKey("Invalid public key length".to_string()));
        }
        let (point, checksum) = raw.split_at(33);
        if ripemd160(point)[..4] != *checksum {
            return Err(DcoreError::InvalidKey("Public key checksum mismatch".to_string()));
        }
        Self::from_bytes(point)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Trim and collapse whitespace the way brain keys are compared.
pub fn normalize_brain_key(brain_key: &str) -> String {
    brain_key.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize(signature: Signature, recovery_id: RecoveryId) -> (Signature, RecoveryId) {
    match signature.normalize_s() {
        Some(low_s) => (
            low_s,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    }
}

fn compact_signature(signature: &Signature, recovery_id: RecoveryId) -> [u8; 65] {
    let mut out = [0u8; 65];
    out[0] = 27 + 4 + recovery_id.to_byte();
    out[1..].copy_from_slice(&signature.to_bytes());
    out
}

/// The node rejects signatures whose r or s would need a sign byte in DER.
fn is_canonical(c: &[u8; 65]) -> bool {
    c[1] & 0x80 == 0
        && !(c[1] == 0 && c[2] & 0x80 == 0)
        && c[33] & 0x80 == 0
        && !(c[33] == 0 && c[34] & 0x80 == 0)
}
