//! Per-chunk confidentiality for sealed uploads.
//!
//! Every chunk is sealed independently as
//! `nonce (12 B) || AES-256-GCM ciphertext || tag (16 B)`, optionally
//! base64-armored for text transports. The secret never lives in this
//! crate: callers inject a [`KeyProvider`] and the key is fetched per
//! chunk, so a revoked or missing key surfaces as a per-chunk failure.

mod cipher;
mod encryptor;
mod key;

pub use cipher::{Aes256GcmProvider, Armor, EncryptionProvider, NONCE_LEN, TAG_LEN};
pub use encryptor::{ChunkEncryptor, open_chunk};
pub use key::{
    EnvKeyProvider, KEY_LEN, KeyProvider, PassphraseKeyProvider, SecretKey, StaticKeyProvider,
};

/// Errors produced by the crypto crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}
