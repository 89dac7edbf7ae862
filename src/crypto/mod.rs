//! Cryptographic primitives of the client engine.
//!
//! # Responsibilities
//! - secp256k1 keys, WIF and `DCT` public key strings
//! - ECDH-keyed AES with checksum (memos)
//! - password envelopes and the wallet file cipher
//! - ElGamal key derivation for content purchases
//!
//! Everything in here is synchronous and free of I/O.

pub mod aes;
pub mod elgamal;
pub mod envelope;
pub mod hash;
pub mod keys;

pub use self::aes::{decrypt_with_checksum, encrypt_with_checksum, Aes};
pub use elgamal::{
    el_gamal_private, el_gamal_private_from_wif, el_gamal_public, ElGamalKeyPair,
    EL_GAMAL_GENERATOR, EL_GAMAL_MODULUS,
};
pub use envelope::{decrypt, decrypt_hex_string, encrypt, encrypt_to_hex_string};
pub use hash::{account_name_from_email, md5_hex, ripemd160_hex, sha256_hex, sha512_hex};
pub use keys::{normalize_brain_key, PrivateKey, PublicKey, ADDRESS_PREFIX};
