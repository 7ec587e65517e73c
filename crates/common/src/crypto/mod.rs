//! Cryptographic primitives for private content
//!
//! - **Identity keys**: each account owns one Ed25519 keypair (`SecretKey`/`PublicKey`),
//!   converted to X25519 whenever it takes part in a key agreement
//! - **Content encryption**: ChaCha20-Poly1305 under a per-session [`Dek`]
//! - **Key distribution**: the DEK is wrapped once per recipient as a [`WrappedDek`]
//!   (ephemeral ECDH + AES-KW)
//!
//! # Wrapping a DEK
//!
//! 1. Generate an ephemeral keypair
//! 2. Convert it and the recipient's public key to X25519
//! 3. ECDH to derive a shared secret
//! 4. AES-KW wrap the DEK with the shared secret
//! 5. Package as `ephemeral_pubkey || wrapped_dek`
//!
//! The recipient reverses steps 2-4 with their private key.
//!
//! The [`cipher`] module exposes the stateless operations the rest of the crate uses.

pub mod cipher;
mod dek;
mod keys;
mod wrapped_dek;

pub use cipher::CipherError;
pub use dek::{Dek, DekError, DEK_SIZE};
pub use keys::{KeyError, PublicKey, SecretKey};
pub use wrapped_dek::{WrapError, WrappedDek, WRAPPED_DEK_SIZE};
