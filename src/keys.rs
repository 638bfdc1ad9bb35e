//! Wallet keypairs and the encryption-at-rest seam.
//!
//! Signing keys never leave this module or the engines in cleartext. The
//! store only ever sees ciphertext produced by the injected `KeyCipher`;
//! the cipher implementation itself lives outside this crate.

use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("key cipher failure: {0}")]
    Cipher(String),
}

/// A freshly generated wallet.
pub struct Keypair {
    /// 0x-prefixed lower-case EVM address
    pub address: String,
    /// 0x-prefixed hex of the 32-byte secret scalar
    pub secret_hex: String,
}

pub fn generate_keypair() -> Keypair {
    let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
    Keypair {
        address: address_of(&signing_key),
        secret_hex: format!("0x{}", hex::encode(signing_key.to_bytes())),
    }
}

/// Derive the EVM address: keccak256 of the uncompressed public key
/// (sans 0x04 tag), last 20 bytes.
pub fn address_of(key: &SigningKey) -> String {
    let pubkey = key.verifying_key().to_encoded_point(false);
    let hash = Keccak256::digest(&pubkey.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

pub fn signing_key_from_hex(secret_hex: &str) -> Result<SigningKey, KeyError> {
    let stripped = secret_hex.strip_prefix("0x").unwrap_or(secret_hex);
    let bytes =
        hex::decode(stripped).map_err(|e| KeyError::InvalidKey(format!("bad hex: {}", e)))?;
    SigningKey::from_slice(&bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))
}

/// Encryption-at-rest boundary for stored signing keys.
pub trait KeyCipher: Send + Sync {
    fn seal(&self, secret_hex: &str) -> Result<String, KeyError>;
    fn open(&self, sealed: &str) -> Result<String, KeyError>;
}

/// Identity cipher for tests and local development. Never deploy this.
#[cfg(feature = "mock-chain")]
pub struct PassthroughCipher;

#[cfg(feature = "mock-chain")]
impl KeyCipher for PassthroughCipher {
    fn seal(&self, secret_hex: &str) -> Result<String, KeyError> {
        Ok(secret_hex.to_string())
    }

    fn open(&self, sealed: &str) -> Result<String, KeyError> {
        Ok(sealed.to_string())
    }
}
