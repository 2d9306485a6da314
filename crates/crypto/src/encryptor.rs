use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::CryptoError;
use crate::cipher::{Aes256GcmProvider, Armor, EncryptionProvider};
use crate::key::{KeyProvider, SecretKey};

/// Seals chunk plaintext into wire blobs.
///
/// Composes an injected [`KeyProvider`] with an [`EncryptionProvider`] and
/// an [`Armor`]. Cheap to clone; the upload session moves a clone into a
/// blocking task per attempt.
#[derive(Clone)]
pub struct ChunkEncryptor {
    keys: Arc<dyn KeyProvider>,
    provider: Arc<dyn EncryptionProvider>,
    armor: Armor,
}

impl ChunkEncryptor {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        provider: Arc<dyn EncryptionProvider>,
        armor: Armor,
    ) -> Self {
        Self {
            keys,
            provider,
            armor,
        }
    }

    /// AES-256-GCM sealing with the given key source.
    pub fn aes_gcm(keys: Arc<dyn KeyProvider>, armor: Armor) -> Self {
        Self::new(keys, Arc::new(Aes256GcmProvider), armor)
    }

    /// Seals one chunk. The input is never modified.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Bytes, CryptoError> {
        let key = self.keys.secret()?;
        let envelope = self.provider.encrypt(plaintext, &key)?;
        trace!(
            plain = plaintext.len(),
            sealed = envelope.len(),
            "chunk sealed"
        );
        Ok(Bytes::from(self.armor.encode(envelope)))
    }

    /// Reverses [`seal`](Self::seal) with the same key source.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.keys.secret()?;
        let envelope = self.armor.decode(sealed)?;
        self.provider.decrypt(&envelope, &key)
    }

    pub fn armor(&self) -> Armor {
        self.armor
    }

    /// Content type of the blobs produced by [`seal`](Self::seal).
    pub fn content_type(&self) -> &'static str {
        self.armor.content_type()
    }
}

/// Opens an AES-256-GCM sealed chunk, as the receiving side would.
pub fn open_chunk(key: &SecretKey, sealed: &[u8], armor: Armor) -> Result<Vec<u8>, CryptoError> {
    let envelope = armor.decode(sealed)?;
    Aes256GcmProvider.decrypt(&envelope, key)
}
