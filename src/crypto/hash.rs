//! Digest helpers.
//!
//! Thin wrappers over the RustCrypto digests plus the hex forms the network
//! uses in account names, content hashes and key derivation.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha512::digest(data));
    out
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

pub fn md5(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

/// Hex-encoded SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hex-encoded SHA-512.
pub fn sha512_hex(data: &[u8]) -> String {
    hex::encode(sha512(data))
}

/// Hex-encoded RIPEMD-160.
pub fn ripemd160_hex(data: &[u8]) -> String {
    hex::encode(ripemd160(data))
}

/// Hex-encoded MD5.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(md5(data))
}

/// Account name the network derives for an email-registered user.
pub fn account_name_from_email(email: &str) -> String {
    format!("u{}", md5_hex(email.as_bytes()))
}
