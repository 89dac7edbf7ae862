//! AES-256-CBC keyed from a SHA-512 seed, and the checksummed
//! encryption used for memos.
//!
//! # Key schedule
//! ```text
//! h   = sha512(seed)
//! key = h[0..32]      (hex digest chars 0..64)
//! iv  = h[32..48]     (hex digest chars 64..96)
//! ```
//!
//! # Checksummed payload
//! ```text
//! seed       = decimal(nonce) || hex(sha512(ecdh_x(priv, pub)))
//! ciphertext = AES(seed, sha256(message)[0..4] || message)
//! ```

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::crypto::hash::{sha256, sha512};
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::error::{DcoreError, DcoreResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const CHECKSUM_LEN: usize = 4;

/// An AES-256-CBC key/IV pair with PKCS#7 padding.
pub struct Aes {
    key: Zeroizing<[u8; 32]>,
    iv: [u8; 16],
}

impl Aes {
    pub fn new(key: [u8; 32], iv: [u8; 16]) -> Self {
        Self {
            key: Zeroizing::new(key),
            iv,
        }
    }

    /// Derive key and IV from `sha512(seed)`.
    pub fn from_seed(seed: &[u8]) -> Self {
        let hash = Zeroizing::new(sha512(seed));
        let mut key = [0u8; 32];
        let mut iv = [0u8; 16];
        key.copy_from_slice(&hash[..32]);
        iv.copy_from_slice(&hash[32..48]);
        Self::new(key, iv)
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes256CbcEnc::new(
            GenericArray::from_slice(&self.key[..]),
            GenericArray::from_slice(&self.iv),
        )
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypt and strip padding. Fails on a bad length or bad padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> DcoreResult<Vec<u8>> {
        Aes256CbcDec::new(
            GenericArray::from_slice(&self.key[..]),
            GenericArray::from_slice(&self.iv),
        )
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DcoreError::Crypto("Invalid ciphertext or padding".to_string()))
    }
}

fn shared_cipher(private_key: &PrivateKey, public_key: &PublicKey, nonce: u64) -> Aes {
    let secret = private_key.shared_secret(public_key);
    let mut seed = Zeroizing::new(nonce.to_string().into_bytes());
    seed.extend_from_slice(hex::encode(&secret[..]).as_bytes());
    Aes::from_seed(&seed)
}

/// Encrypt `message` for the holder of the private key behind `public_key`.
pub fn encrypt_with_checksum(
    private_key: &PrivateKey,
    public_key: &PublicKey,
    nonce: u64,
    message: &[u8],
) -> Vec<u8> {
    let mut payload = Zeroizing::new(Vec::with_capacity(CHECKSUM_LEN + message.len()));
    payload.extend_from_slice(&sha256(message)[..CHECKSUM_LEN]);
    payload.extend_from_slice(message);
    shared_cipher(private_key, public_key, nonce).encrypt(&payload)
}

/// Reverse of [`encrypt_with_checksum`].
///
/// Every failure (padding, length, checksum) is reported as
/// [`DcoreError::ChecksumMismatch`]: a wrong key cannot be told apart from
/// corrupted data.
pub fn decrypt_with_checksum(
    private_key: &PrivateKey,
    public_key: &PublicKey,
    nonce: u64,
    ciphertext: &[u8],
) -> DcoreResult<Vec<u8>> {
    let payload = shared_cipher(private_key, public_key, nonce)
        .decrypt(ciphertext)
        .map_err(|_| DcoreError::ChecksumMismatch)?;
    if payload.len() < CHECKSUM_LEN {
        return Err(DcoreError::ChecksumMismatch);
    }

    let (checksum, message) = payload.split_at(CHECKSUM_LEN);
    if sha256(message)[..CHECKSUM_LEN] != *checksum {
        return Err(DcoreError::ChecksumMismatch);
    }
    Ok(message.to_vec())
}
