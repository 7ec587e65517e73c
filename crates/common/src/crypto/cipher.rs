//! Stateless content cipher
//!
//! Thin functions over [`Dek`] and [`WrappedDek`] that speak in terms of the
//! private-content pipeline: payloads are serialized with `serde_json`, encrypted
//! under a session DEK, and the DEK itself is wrapped per recipient. Every
//! function is a pure function of its inputs.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::dek::Dek;
use super::keys::{PublicKey, SecretKey};
use super::wrapped_dek::WrappedDek;
use crate::types::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// Tamper, corruption, or a key that does not match
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),
    /// The cipher text decrypted but the payload did not have the expected shape
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl CipherError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CipherError::DecryptionFailure(_) | CipherError::Payload(_) => {
                ErrorCode::DecryptionFailure
            }
            CipherError::EncryptionFailure(_) => ErrorCode::InvalidRequest,
        }
    }
}

/// Fresh random symmetric key
pub fn generate_dek() -> Dek {
    Dek::generate()
}

/// Fresh asymmetric keypair
pub fn generate_key_pair() -> (PublicKey, SecretKey) {
    let secret_key = SecretKey::generate();
    (secret_key.public(), secret_key)
}

/// Encrypt raw plaintext bytes under `dek`
pub fn encrypt_bytes(plaintext: &[u8], dek: &Dek) -> Result<Vec<u8>, CipherError> {
    dek.encrypt(plaintext)
        .map_err(|e| CipherError::EncryptionFailure(e.to_string()))
}

/// Decrypt cipher text produced by [`encrypt_bytes`]
pub fn decrypt_bytes(cipher_text: &[u8], dek: &Dek) -> Result<Vec<u8>, CipherError> {
    dek.decrypt(cipher_text)
        .map_err(|e| CipherError::DecryptionFailure(e.to_string()))
}

/// Serialize `payload` and encrypt it under `dek`
pub fn encrypt_content<T: Serialize + ?Sized>(
    payload: &T,
    dek: &Dek,
) -> Result<Vec<u8>, CipherError> {
    let plaintext = serde_json::to_vec(payload)?;
    encrypt_bytes(&plaintext, dek)
}

/// Decrypt `cipher_text` under `dek` and deserialize the payload
pub fn decrypt_content<T: DeserializeOwned>(
    cipher_text: &[u8],
    dek: &Dek,
) -> Result<T, CipherError> {
    let plaintext = decrypt_bytes(cipher_text, dek)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Wrap `dek` for one recipient
pub fn encrypt_dek(dek: &Dek, recipient: &PublicKey) -> Result<WrappedDek, CipherError> {
    WrappedDek::new(dek, recipient).map_err(|e| CipherError::EncryptionFailure(e.to_string()))
}

/// Unwrap a DEK entry with the recipient's private key
pub fn decrypt_dek(encrypted_dek: &WrappedDek, secret_key: &SecretKey) -> Result<Dek, CipherError> {
    encrypted_dek
        .recover(secret_key)
        .map_err(|e| CipherError::DecryptionFailure(e.to_string()))
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_content_round_trip() {
        let dek = generate_dek();
        let payload = json!({ "text": "only for my circle", "tags": ["a", "b"] });

        let cipher_text = encrypt_content(&payload, &dek).unwrap();
        let recovered: serde_json::Value = decrypt_content(&cipher_text, &dek).unwrap();
        assert_eq!(payload, recovered);
    }

    #[test]
    fn test_wrong_dek_is_decryption_failure() {
        let cipher_text = encrypt_content("hello", &generate_dek()).unwrap();
        let err = decrypt_content::<String>(&cipher_text, &generate_dek()).unwrap_err();
        assert!(matches!(err, CipherError::DecryptionFailure(_)));
        assert_eq!(err.code(), ErrorCode::DecryptionFailure);
    }

    #[test]
    fn test_dek_round_trip_and_mismatch() {
        let dek = generate_dek();
        let (public_key, secret_key) = generate_key_pair();
        let (_, other_secret) = generate_key_pair();

        let wrapped = encrypt_dek(&dek, &public_key).unwrap();
        assert_eq!(dek, decrypt_dek(&wrapped, &secret_key).unwrap());

        let err = decrypt_dek(&wrapped, &other_secret).unwrap_err();
        assert!(matches!(err, CipherError::DecryptionFailure(_)));
    }

    #[test]
    fn test_payload_shape_mismatch() {
        let dek = generate_dek();
        let cipher_text = encrypt_content(&json!({ "text": "x" }), &dek).unwrap();
        let err = decrypt_content::<Vec<u32>>(&cipher_text, &dek).unwrap_err();
        assert!(matches!(err, CipherError::Payload(_)));
    }
}
