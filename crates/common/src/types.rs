use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a session (one DEK shared with a fixed recipient set)
pub type SessionId = Uuid;
/// Identifier the key service assigns to each published keypair
pub type KeyPairId = Uuid;
/// Identifier of a stored item, assigned by the content service
pub type ItemId = String;

/// Account identifier on the federated network
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    pub fn new(did: impl Into<String>) -> Self {
        Self(did.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Did {
    fn from(did: &str) -> Self {
        Self(did.to_string())
    }
}

impl From<String> for Did {
    fn from(did: String) -> Self {
        Self(did)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace separating independent session lineages of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Post,
    Profile,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Post => "post",
            Scope::Profile => "profile",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error code carried by every pipeline error
///
/// `NotFound` is the only code pipeline logic branches on; everything else
/// is propagated as unexpected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    DecryptionFailure,
    InvalidRequest,
    Transport,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NotFound",
            ErrorCode::DecryptionFailure => "DecryptionFailure",
            ErrorCode::InvalidRequest => "InvalidRequest",
            ErrorCode::Transport => "Transport",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
