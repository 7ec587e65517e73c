//! Sessions
//!
//! A session is one DEK shared with a fixed recipient set: the author plus
//! their trusted circle at the time of creation. The DEK is wrapped once per
//! recipient under that recipient's current public key, and a member can read
//! the session iff they hold the private key matching their entry.
//!
//! Each account has independent session lineages per [`Scope`](crate::types::Scope),
//! so posts and profile data never share a DEK.

mod manager;
mod trusted;

pub use manager::{SessionError, SessionHandle, SessionManager};
pub use trusted::{
    KeyValueStore, MemoryKeyValueStore, MemoryTrustedCircleCache, PersistedTrustedCircleCache,
    TrustedCircleCache,
};
