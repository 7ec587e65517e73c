//! Content encryption using ChaCha20-Poly1305
//!
//! A [`Dek`] (data encryption key) encrypts the content bodies of every item
//! written under one session. Cipher texts are self-contained: the nonce travels
//! with them, so decrypting needs nothing but the cipher text and the key.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of ChaCha20-Poly1305 key in bytes (256 bits)
pub const DEK_SIZE: usize = 32;
/// Size of the BLAKE3 digest sealed in front of every body
pub const DIGEST_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum DekError {
    #[error("dek error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A session's 256-bit content key
///
/// Sealed bodies are laid out as `nonce (12) || aead(digest (32) || body)`,
/// where the digest is the BLAKE3 hash of the body and is checked again on open.
/// Key material never leaves the process in any serialized form; recipients
/// only ever see it wrapped, see [`super::WrappedDek`].
#[derive(PartialEq, Eq, Clone)]
pub struct Dek([u8; DEK_SIZE]);

impl fmt::Debug for Dek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dek(..)")
    }
}

impl From<[u8; DEK_SIZE]> for Dek {
    fn from(bytes: [u8; DEK_SIZE]) -> Self {
        Dek(bytes)
    }
}

impl Dek {
    pub fn generate() -> Self {
        let mut key = [0; DEK_SIZE];
        getrandom::getrandom(&mut key).expect("failed to generate random bytes");
        Self(key)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, DekError> {
        let key: [u8; DEK_SIZE] = data.try_into().map_err(|_| {
            anyhow::anyhow!("invalid dek size, expected {}, got {}", DEK_SIZE, data.len())
        })?;
        Ok(key.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn aead(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Seal a body under this key with a fresh random nonce
    pub fn encrypt(&self, body: &[u8]) -> Result<Vec<u8>, DekError> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;

        let payload = [blake3::hash(body).as_bytes().as_slice(), body].concat();
        let sealed = self
            .aead()
            .encrypt(Nonce::from_slice(&nonce), payload.as_slice())
            .map_err(|_| anyhow::anyhow!("body encryption failed"))?;

        Ok([nonce.as_slice(), sealed.as_slice()].concat())
    }

    /// Open a body sealed by [`Dek::encrypt`]
    ///
    /// Fails on truncated input, on a tag mismatch (tampering or the wrong
    /// session key) and on a digest mismatch.
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, DekError> {
        if sealed.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("sealed body shorter than its nonce").into());
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let payload = self
            .aead()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow::anyhow!("body decryption failed"))?;

        if payload.len() < DIGEST_SIZE {
            return Err(anyhow::anyhow!("opened body shorter than its digest").into());
        }
        let (digest, body) = payload.split_at(DIGEST_SIZE);
        if digest != blake3::hash(body).as_bytes() {
            return Err(anyhow::anyhow!("body digest mismatch").into());
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dek_encrypt_decrypt() {
        let dek = Dek::generate();
        let data = b"hello world, this is a private post body";

        let encrypted = dek.encrypt(data).unwrap();
        let decrypted = dek.decrypt(&encrypted).unwrap();

        assert_eq!(data.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_dek_size_validation() {
        assert!(Dek::from_slice(&[1u8; 16]).is_err());
        assert!(Dek::from_slice(&[1u8; 64]).is_err());
        assert!(Dek::from_slice(&[1u8; DEK_SIZE]).is_ok());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let dek = Dek::generate();
        let mut encrypted = dek.encrypt(b"test data for integrity check").unwrap();

        encrypted[NONCE_SIZE + 10] ^= 0xFF;
        assert!(dek.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = Dek::generate().encrypt(b"for someone else").unwrap();
        assert!(Dek::generate().decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_empty_data_encryption() {
        let dek = Dek::generate();
        let encrypted = dek.encrypt(b"").unwrap();
        assert!(dek.decrypt(&encrypted).unwrap().is_empty());
        assert!(dek.decrypt(&encrypted[..NONCE_SIZE - 1]).is_err());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let dek = Dek::from([7u8; DEK_SIZE]);
        assert_eq!(format!("{:?}", dek), "Dek(..)");
    }
}
