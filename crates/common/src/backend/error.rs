use crate::types::ErrorCode;

/// Failure reported by a backend service
///
/// `NotFound` is expected and drives create-on-demand flows; everything else
/// is unexpected and propagates.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl BackendError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BackendError::NotFound(_) => ErrorCode::NotFound,
            BackendError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            BackendError::Transport(_) => ErrorCode::Transport,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }
}
