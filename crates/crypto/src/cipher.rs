use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::CryptoError;
use crate::key::SecretKey;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Symmetric primitive used to seal one chunk.
///
/// `encrypt` must not be deterministic across calls: a retried chunk is
/// sealed again under a fresh nonce.
pub trait EncryptionProvider: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError>;

    fn decrypt(&self, envelope: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError>;
}

/// AES-256-GCM with a random 96-bit nonce prepended to the ciphertext.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmProvider;

impl EncryptionProvider for Aes256GcmProvider {
    fn encrypt(&self, plaintext: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    fn decrypt(&self, envelope: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError> {
        if envelope.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decrypt(format!(
                "envelope too short: {} bytes",
                envelope.len()
            )));
        }
        let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt("authentication failed".into()))
    }
}

/// How a sealed envelope is encoded for the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Armor {
    /// Binary envelope, `application/octet-stream`.
    Raw,
    /// Standard base64 text, `text/plain`.
    #[default]
    Base64,
}

impl Armor {
    pub fn content_type(self) -> &'static str {
        match self {
            Armor::Raw => "application/octet-stream",
            Armor::Base64 => "text/plain",
        }
    }

    pub fn encode(self, envelope: Vec<u8>) -> Vec<u8> {
        match self {
            Armor::Raw => envelope,
            Armor::Base64 => STANDARD.encode(envelope).into_bytes(),
        }
    }

    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Armor::Raw => Ok(data.to_vec()),
            Armor::Base64 => STANDARD
                .decode(data)
                .map_err(|e| CryptoError::Encoding(e.to_string())),
        }
    }
}
