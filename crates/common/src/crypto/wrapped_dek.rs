//! DEK wrapping using ECDH + AES Key Wrap
//!
//! A session's DEK is wrapped once per recipient. Wrapping combines an
//! ephemeral X25519 key agreement with AES Key Wrap (RFC 3394):
//!
//! 1. Generate an ephemeral keypair and convert it (and the recipient key) to X25519
//! 2. ECDH yields a shared secret used as the key-encryption key
//! 3. AES-KW wraps the DEK under that secret
//! 4. The result is `ephemeral_pubkey || wrapped_dek`
//!
//! Unwrapping repeats the agreement from the recipient side. AES-KW carries an
//! integrity check, so a wrong private key fails instead of yielding garbage.

use aes_kw::KekAes256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::dek::{Dek, DEK_SIZE};
use super::keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};

/// Size of the AES-KW integrity block in bytes
pub const KW_BLOCK_SIZE: usize = 8;
/// Total size of a wrapped DEK: ephemeral public key (32) then the AES-KW output (40)
pub const WRAPPED_DEK_SIZE: usize = PUBLIC_KEY_SIZE + DEK_SIZE + KW_BLOCK_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum WrapError {
    #[error("wrap error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

/// A session DEK wrapped for exactly one recipient key
///
/// This is what a session member entry stores; the server never sees the DEK.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct WrappedDek(pub(crate) [u8; WRAPPED_DEK_SIZE]);

/// Key-encryption key agreed between one side's secret and the other's public key
fn agree_kek(secret: &SecretKey, public: &PublicKey) -> Result<KekAes256, KeyError> {
    let shared = secret.to_x25519().diffie_hellman(&public.to_x25519()?);
    Ok(KekAes256::from(*shared.as_bytes()))
}

impl Serialize for WrappedDek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for WrappedDek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        WrappedDek::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}

impl From<[u8; WRAPPED_DEK_SIZE]> for WrappedDek {
    fn from(bytes: [u8; WRAPPED_DEK_SIZE]) -> Self {
        WrappedDek(bytes)
    }
}

impl TryFrom<&[u8]> for WrappedDek {
    type Error = WrapError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; WRAPPED_DEK_SIZE] = bytes.try_into().map_err(|_| {
            anyhow::anyhow!(
                "invalid wrapped dek size, expected {}, got {}",
                WRAPPED_DEK_SIZE,
                bytes.len()
            )
        })?;
        Ok(WrappedDek(bytes))
    }
}

impl WrappedDek {
    /// Wrap `dek` for `recipient` under a fresh ephemeral key
    pub fn new(dek: &Dek, recipient: &PublicKey) -> Result<Self, WrapError> {
        let ephemeral = SecretKey::generate();
        let wrapped = agree_kek(&ephemeral, recipient)?
            .wrap_vec(dek.bytes())
            .map_err(|_| anyhow::anyhow!("AES-KW wrap failed"))?;

        let bytes = [ephemeral.public().to_bytes().as_slice(), wrapped.as_slice()].concat();
        WrappedDek::try_from(bytes.as_slice())
    }

    /// Unwrap the DEK with the recipient's secret key
    ///
    /// AES-KW checks integrity, so an entry wrapped for another key or
    /// tampered with fails here instead of yielding a wrong DEK.
    pub fn recover(&self, recipient: &SecretKey) -> Result<Dek, WrapError> {
        let (ephemeral, wrapped) = self.0.split_at(PUBLIC_KEY_SIZE);
        let ephemeral = PublicKey::try_from(ephemeral)?;
        let unwrapped = agree_kek(recipient, &ephemeral)?
            .unwrap_vec(wrapped)
            .map_err(|_| anyhow::anyhow!("AES-KW unwrap failed"))?;
        Ok(Dek::from_slice(&unwrapped).map_err(|e| anyhow::anyhow!("unwrapped {}", e))?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wrap_and_recover() {
        let dek = Dek::from([42u8; DEK_SIZE]);
        let private_key = SecretKey::generate();
        let wrapped = WrappedDek::new(&dek, &private_key.public()).unwrap();
        assert_eq!(dek, wrapped.recover(&private_key).unwrap());
    }

    #[test]
    fn test_recover_with_other_key_fails() {
        let dek = Dek::generate();
        let alice = SecretKey::generate();
        let bob = SecretKey::generate();

        let wrapped = WrappedDek::new(&dek, &alice.public()).unwrap();
        assert_eq!(dek, wrapped.recover(&alice).unwrap());
        assert!(wrapped.recover(&bob).is_err());
    }

    #[test]
    fn test_wrapping_is_randomized() {
        let dek = Dek::generate();
        let recipient = SecretKey::generate().public();
        let first = WrappedDek::new(&dek, &recipient).unwrap();
        let second = WrappedDek::new(&dek, &recipient).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_json_form_recovers() {
        let dek = Dek::generate();
        let private_key = SecretKey::generate();
        let wrapped = WrappedDek::new(&dek, &private_key.public()).unwrap();

        let json = serde_json::to_string(&wrapped).unwrap();
        let from_json: WrappedDek = serde_json::from_str(&json).unwrap();
        assert_eq!(dek, from_json.recover(&private_key).unwrap());
    }

    #[test]
    fn test_deserialize_invalid_length() {
        let short = serde_json::to_string(&vec![0u8; WRAPPED_DEK_SIZE - 1]).unwrap();
        assert!(serde_json::from_str::<WrappedDek>(&short).is_err());

        let long = serde_json::to_string(&vec![0u8; WRAPPED_DEK_SIZE + 1]).unwrap();
        assert!(serde_json::from_str::<WrappedDek>(&long).is_err());
    }

    #[test]
    fn test_tampered_wrap_fails() {
        let private_key = SecretKey::generate();
        let mut wrapped = WrappedDek::new(&Dek::generate(), &private_key.public()).unwrap();
        wrapped.0[WRAPPED_DEK_SIZE - 1] ^= 0x01;
        assert!(wrapped.recover(&private_key).is_err());
    }

    #[test]
    fn test_swapped_ephemeral_key_fails() {
        let private_key = SecretKey::generate();
        let mut wrapped = WrappedDek::new(&Dek::generate(), &private_key.public()).unwrap();
        let other = SecretKey::generate().public().to_bytes();
        wrapped.0[..PUBLIC_KEY_SIZE].copy_from_slice(&other);
        assert!(wrapped.recover(&private_key).is_err());
    }
}
