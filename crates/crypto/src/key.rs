//! Secret keys and the providers that hand them out.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::CryptoError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit symmetric key. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("bad hex: {e}")))?;
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Derives a key as SHA-256 of `passphrase`.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Source of the secret used to seal chunks.
///
/// Called once per chunk attempt; an error there is treated by the upload
/// session like any other failed attempt.
pub trait KeyProvider: Send + Sync {
    fn secret(&self) -> Result<SecretKey, CryptoError>;
}

/// Hands out a fixed key.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    key: SecretKey,
}

impl StaticKeyProvider {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Ok(Self::new(SecretKey::from_hex(s)?))
    }
}

impl KeyProvider for StaticKeyProvider {
    fn secret(&self) -> Result<SecretKey, CryptoError> {
        Ok(self.key.clone())
    }
}

/// Key derived from a shared passphrase (SHA-256).
#[derive(Debug, Clone)]
pub struct PassphraseKeyProvider {
    key: SecretKey,
}

impl PassphraseKeyProvider {
    /// Fails on an empty passphrase.
    pub fn new(passphrase: &str) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::InvalidKey("empty passphrase".into()));
        }
        Ok(Self {
            key: SecretKey::from_passphrase(passphrase),
        })
    }
}

impl KeyProvider for PassphraseKeyProvider {
    fn secret(&self) -> Result<SecretKey, CryptoError> {
        Ok(self.key.clone())
    }
}

/// Reads a hex key from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeyProvider for EnvKeyProvider {
    fn secret(&self) -> Result<SecretKey, CryptoError> {
        let value = std::env::var(&self.var)
            .map_err(|_| CryptoError::KeyUnavailable(format!("{} is not set", self.var)))?;
        SecretKey::from_hex(&value)
    }
}
