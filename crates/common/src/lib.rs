/**
 * Per-account wiring of the pipeline:
 *  key store, sessions, writers and feeds
 */
pub mod agent;
/**
 * Backend service traits, their request/response
 *  types, and an in-memory implementation
 */
pub mod backend;
pub mod config;
/**
 * Cryptographic types and operations.
 *  - Identity keypairs
 *  - Content encryption under a DEK
 *  - Per-recipient DEK wrapping
 */
pub mod crypto;
/**
 * Partial-failure-tolerant decryption of
 *  item batches
 */
pub mod decrypt;
/**
 * Private and public feed sources and the
 *  cursor-pairing merger between them
 */
pub mod feed;
pub mod item;
pub mod keystore;
pub mod posts;
pub mod profile;
/**
 * Sessions: one DEK shared with a fixed
 *  recipient set, plus trusted-circle caching
 */
pub mod session;
pub mod testkit;
pub mod types;

pub mod prelude {
    pub use crate::agent::{PrivateAgent, Services};
    pub use crate::backend::{Audience, BackendError};
    pub use crate::config::PipelineConfig;
    pub use crate::crypto::{Dek, PublicKey, SecretKey, WrappedDek};
    pub use crate::feed::{CompositeCursor, FeedItem, FeedMerger, FeedPage, FeedSource, FetchParams};
    pub use crate::types::{Did, ErrorCode, Scope};
}
