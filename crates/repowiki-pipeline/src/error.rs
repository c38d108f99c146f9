//! Pipeline error taxonomy

use repowiki_core::store::StoreError;
use repowiki_core::GitError;
use repowiki_kernel::KernelError;
use thiserror::Error;

pub type StageResult<T> = Result<T, StageError>;

#[derive(Error, Debug)]
pub enum StageError {
    /// Terminal for this run; bubbles to the worker which marks the
    /// repository Failed.
    #[error("stage {stage} failed: {message}")]
    Failed { stage: String, message: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("cancelled")]
    Cancelled,
}

impl StageError {
    pub fn failed(stage: &str, message: impl Into<String>) -> Self {
        Self::Failed {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Transient errors are worth another attempt inside the stage retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StageError::Kernel(e) => e.is_transient(),
            _ => false,
        }
    }

    /// A lost lease: the worker must abandon the row without further
    /// writes.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, StageError::Store(StoreError::PreconditionFailed(_)))
    }
}
