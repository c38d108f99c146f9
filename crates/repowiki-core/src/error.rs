//! Error types shared across the workspace

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("git failure: {0}")]
    Git(String),

    #[error("unsupported repository type: {0}")]
    UnsupportedRepositoryType(String),

    #[error("store precondition failed: {0}")]
    StorePrecondition(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<crate::store::StoreError> for Error {
    fn from(e: crate::store::StoreError) -> Self {
        match e {
            crate::store::StoreError::PreconditionFailed(msg) => Self::StorePrecondition(msg),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<crate::git::GitError> for Error {
    fn from(e: crate::git::GitError) -> Self {
        Self::Git(e.to_string())
    }
}
