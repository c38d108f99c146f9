//! Git transport contract — clone/pull/diff/log primitives
//!
//! The pipeline never touches the git wire protocol itself; it consumes
//! this trait. The binary ships a subprocess implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("clone failed: {0}")]
    CloneFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("diff failed: {0}")]
    DiffFailed(String),

    #[error("log failed: {0}")]
    LogFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GitResult<T> = std::result::Result<T, GitError>;

/// Result of materializing a remote into a local working tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloneOutcome {
    pub local_path: String,
    pub repository_name: String,
    pub branch_name: String,
    pub organization: String,
    /// Head commit hash.
    pub version: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullOutcome {
    /// Commits newer than the `since` version, oldest first.
    pub commits: Vec<CommitInfo>,
    pub head_version: String,
}

/// One changed path between two commits, git name-status style
/// ("A", "M", "D", "R100", ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiffEntry {
    pub status: String,
    pub path: String,
}

#[async_trait::async_trait]
pub trait GitClient: Send + Sync {
    async fn clone_repository(
        &self,
        address: &str,
        user: Option<&str>,
        password: Option<&str>,
        branch: Option<&str>,
        target_dir: &str,
    ) -> GitResult<CloneOutcome>;

    /// Fetch + fast-forward the working tree, returning commits since the
    /// given version (exclusive) and the new head.
    async fn pull(
        &self,
        local_path: &str,
        since: Option<&str>,
        user: Option<&str>,
        password: Option<&str>,
    ) -> GitResult<PullOutcome>;

    async fn diff(&self, local_path: &str, from: &str, to: &str) -> GitResult<Vec<DiffEntry>>;

    /// Recent history, newest first.
    async fn log(&self, local_path: &str, limit: usize) -> GitResult<Vec<CommitInfo>>;
}
