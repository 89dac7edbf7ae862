//! ElGamal key pairs used by the content key protocol.
//!
//! A buyer's ElGamal private key is derived from one of their secp256k1
//! keys, so it never has to be stored:
//! ```text
//! private = int(sha512(ec_private_key_bytes))   (big-endian)
//! public  = GENERATOR ^ private mod MODULUS
//! ```
//! Both halves travel as decimal strings.

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

use crate::crypto::hash::sha512;
use crate::crypto::keys::PrivateKey;
use crate::error::{DcoreError, DcoreResult};

/// Group generator.
pub const EL_GAMAL_GENERATOR: u32 = 3;

/// Group modulus, a 512-bit safe prime fixed by the network.
pub const EL_GAMAL_MODULUS: &str = "11760620558671662461946567396662025495126946227619472274601251081547302009186313201119191293557856181195016058359990840577430081932807832465057884143546419";

const MODULUS_BE: [u8; 64] = [
    0xe0, 0x8c, 0xb7, 0x41, 0x80, 0x2d, 0xd6, 0xd5, 0xce, 0xd3, 0x06, 0x6a, 0x7d, 0xca, 0x66, 0xa4,
    0x14, 0x20, 0xc9, 0xa7, 0x93, 0x2d, 0x29, 0x48, 0x71, 0xdd, 0x0b, 0xef, 0x6d, 0x02, 0x0f, 0xdb,
    0x00, 0xa3, 0x4d, 0x27, 0xcc, 0x01, 0xea, 0x62, 0x2a, 0x63, 0xae, 0xaa, 0x86, 0x29, 0x8b, 0x2d,
    0xae, 0x47, 0x94, 0x34, 0xbd, 0x2c, 0x96, 0x87, 0x13, 0x0e, 0xab, 0x34, 0x5b, 0xbe, 0xf0, 0x33,
];

fn modulus() -> &'static BigUint {
    static MODULUS: OnceLock<BigUint> = OnceLock::new();
    MODULUS.get_or_init(|| BigUint::from_bytes_be(&MODULUS_BE))
}

/// ElGamal private key for `key`.
pub fn el_gamal_private(key: &PrivateKey) -> BigUint {
    BigUint::from_bytes_be(&sha512(&key.to_bytes()[..]))
}

/// ElGamal private key for a WIF-encoded secp256k1 key.
pub fn el_gamal_private_from_wif(wif: &str) -> DcoreResult<BigUint> {
    Ok(el_gamal_private(&PrivateKey::from_wif(wif)?))
}

/// `GENERATOR ^ private mod MODULUS`.
pub fn el_gamal_public(private: &BigUint) -> BigUint {
    BigUint::from(EL_GAMAL_GENERATOR).modpow(private, modulus())
}

/// A derived ElGamal key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalKeyPair {
    #[serde(serialize_with = "as_decimal", deserialize_with = "from_decimal")]
    pub private_key: BigUint,
    #[serde(serialize_with = "as_decimal", deserialize_with = "from_decimal")]
    pub public_key: BigUint,
}

impl ElGamalKeyPair {
    pub fn from_private_key(key: &PrivateKey) -> Self {
        let private_key = el_gamal_private(key);
        let public_key = el_gamal_public(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    pub fn from_wif(wif: &str) -> DcoreResult<Self> {
        Ok(Self::from_private_key(&PrivateKey::from_wif(wif)?))
    }

    /// Build a pair from a decimal private key, recomputing the public half.
    pub fn from_decimal_private(private: &str) -> DcoreResult<Self> {
        let private_key = parse_decimal(private)?;
        let public_key = el_gamal_public(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn private_decimal(&self) -> String {
        self.private_key.to_str_radix(10)
    }

    pub fn public_decimal(&self) -> String {
        self.public_key.to_str_radix(10)
    }
}

impl fmt::Debug for ElGamalKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElGamalKeyPair")
            .field("public_key", &self.public_decimal())
            .finish_non_exhaustive()
    }
}

/// Parse a decimal big integer as sent by the node.
pub fn parse_decimal(value: &str) -> DcoreResult<BigUint> {
    BigUint::parse_bytes(value.trim().as_bytes(), 10)
        .ok_or_else(|| DcoreError::InvalidKey(format!("Not a decimal integer: {:?}", value)))
}

fn as_decimal<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.to_str_radix(10))
}

fn from_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_decimal(&s).map_err(serde::de::Error::custom)
}
