//! Password-based encryption.
//!
//! Two schemes live here and they are not interchangeable:
//! - [`encrypt`] / [`decrypt`]: salted envelope serialized as JSON
//!   `{"ct": base64, "iv": hex, "s": hex}`. Key and IV come from an
//!   OpenSSL-style MD5 key stretch of password and salt.
//! - [`encrypt_to_hex_string`] / [`decrypt_hex_string`]: the wallet file
//!   scheme. Key and IV are sliced from `sha512(password)`, nothing is
//!   embedded in the output, which is the raw ciphertext in hex.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::aes::Aes;
use crate::error::{DcoreError, DcoreResult};

const SALT_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    ct: String,
    iv: String,
    s: String,
}

/// MD5 key stretch: `D_i = md5(D_{i-1} || password || salt)` until 48 bytes.
fn stretch_password(password: &[u8], salt: &[u8]) -> Aes {
    let mut material = Zeroizing::new(Vec::with_capacity(64));
    let mut block: Vec<u8> = Vec::new();
    while material.len() < 48 {
        let mut ctx = md5::Context::new();
        ctx.consume(&block);
        ctx.consume(password);
        ctx.consume(salt);
        block = ctx.compute().0.to_vec();
        material.extend_from_slice(&block);
    }

    let mut key = [0u8; 32];
    let mut iv = [0u8; 16];
    key.copy_from_slice(&material[..32]);
    iv.copy_from_slice(&material[32..48]);
    Aes::new(key, iv)
}

fn encrypt_with_salt(message: &str, password: &str, salt: [u8; SALT_LEN]) -> DcoreResult<String> {
    let cipher = stretch_password(password.as_bytes(), &salt);
    let envelope = Envelope {
        ct: STANDARD.encode(cipher.encrypt(message.as_bytes())),
        iv: hex::encode(cipher.iv()),
        s: hex::encode(salt),
    };
    serde_json::to_string(&envelope).map_err(|e| DcoreError::Crypto(e.to_string()))
}

/// Encrypt `message` into a salted JSON envelope.
pub fn encrypt(message: &str, password: &str) -> DcoreResult<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encrypt_with_salt(message, password, salt)
}

/// Open an envelope produced by [`encrypt`].
pub fn decrypt(envelope: &str, password: &str) -> DcoreResult<String> {
    let envelope: Envelope = serde_json::from_str(envelope)
        .map_err(|e| DcoreError::Crypto(format!("Malformed envelope: {}", e)))?;
    let salt = hex::decode(&envelope.s)
        .map_err(|e| DcoreError::Crypto(format!("Malformed envelope salt: {}", e)))?;
    let ciphertext = STANDARD
        .decode(&envelope.ct)
        .map_err(|e| DcoreError::Crypto(format!("Malformed envelope ciphertext: {}", e)))?;

    let plaintext = stretch_password(password.as_bytes(), &salt).decrypt(&ciphertext)?;
    String::from_utf8(plaintext)
        .map_err(|_| DcoreError::Crypto("Envelope plaintext is not UTF-8".to_string()))
}

/// Encrypt `message` in the wallet file format.
pub fn encrypt_to_hex_string(message: &str, password: &str) -> String {
    hex::encode(Aes::from_seed(password.as_bytes()).encrypt(message.as_bytes()))
}

/// Decrypt the wallet file format.
pub fn decrypt_hex_string(ciphertext: &str, password: &str) -> DcoreResult<String> {
    let raw = hex::decode(ciphertext.trim())
        .map_err(|e| DcoreError::Crypto(format!("Ciphertext is not hex: {}", e)))?;
    let plaintext = Aes::from_seed(password.as_bytes()).decrypt(&raw)?;
    String::from_utf8(plaintext)
        .map_err(|_| DcoreError::Crypto("Decrypted text is not UTF-8".to_string()))
}
