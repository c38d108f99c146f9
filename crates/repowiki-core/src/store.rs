//! Store contract — every write is a single short transaction
//!
//! Multiple worker processes coordinate exclusively through this interface.
//! Claiming is an atomic lease: a conditional write that sets owner and
//! lease deadline. Writes made under a lease validate the caller still
//! holds it and fail with `PreconditionFailed` otherwise — the worker
//! abandons the row without further writes.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    CatalogueNode, CommitRecord, DocumentRecord, FileItem, MindMapNode, MindMapRecord,
    OverviewRecord, RepoStatus, Repository,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait::async_trait]
pub trait DocStore: Send + Sync {
    // --- repository queue ---

    async fn insert_repository(&self, repo: Repository) -> StoreResult<()>;

    async fn get_repository(&self, id: Uuid) -> StoreResult<Option<Repository>>;

    /// Atomically claim the next workable repository: status Pending or
    /// Processing (Processing first, to finish interrupted work), and not
    /// currently leased by a live owner. Returns the row with
    /// `status=Processing`, `owner=self`, and a fresh lease deadline.
    async fn lease_repository(
        &self,
        owner: &str,
        lease: Duration,
    ) -> StoreResult<Option<Repository>>;

    /// Claim a Completed repository whose document is stale, for the
    /// incremental updater. Same lease discipline; the row re-enters
    /// Processing.
    async fn lease_stale_repository(
        &self,
        owner: &str,
        lease: Duration,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Repository>>;

    /// Persist repository fields. Fails with `PreconditionFailed` when the
    /// caller no longer holds the lease.
    async fn update_repository(&self, repo: &Repository, owner: &str) -> StoreResult<()>;

    /// Final status write: sets status and error, clears the lease.
    async fn release_repository(
        &self,
        id: Uuid,
        owner: &str,
        status: RepoStatus,
        error: Option<String>,
    ) -> StoreResult<()>;

    // --- documents ---

    async fn upsert_document(&self, doc: DocumentRecord) -> StoreResult<DocumentRecord>;

    async fn get_document(&self, repository_id: Uuid) -> StoreResult<Option<DocumentRecord>>;

    // --- overview (delete + insert) ---

    async fn replace_overview(&self, document_id: Uuid, content: &str) -> StoreResult<()>;

    async fn get_overview(&self, document_id: Uuid) -> StoreResult<Option<OverviewRecord>>;

    // --- mind map (delete + insert) ---

    async fn replace_mind_map(&self, repository_id: Uuid, root: MindMapNode) -> StoreResult<()>;

    async fn get_mind_map(&self, repository_id: Uuid) -> StoreResult<Option<MindMapRecord>>;

    // --- catalogue forest ---

    /// Delete all existing catalogue rows for the repository, insert the
    /// new forest.
    async fn replace_catalogue(
        &self,
        repository_id: Uuid,
        nodes: Vec<CatalogueNode>,
    ) -> StoreResult<()>;

    /// Live (non-deleted) nodes, ordered by (parent, order_index).
    async fn list_catalogue(&self, repository_id: Uuid) -> StoreResult<Vec<CatalogueNode>>;

    async fn insert_catalogue_node(&self, node: CatalogueNode) -> StoreResult<()>;

    async fn update_catalogue_node(&self, node: &CatalogueNode) -> StoreResult<()>;

    // --- file items (upsert by catalogue id) ---

    async fn upsert_file_item(&self, item: FileItem) -> StoreResult<()>;

    async fn get_file_item(&self, catalogue_id: Uuid) -> StoreResult<Option<FileItem>>;

    // --- commit records (delete + insert) ---

    async fn replace_commit_records(
        &self,
        repository_id: Uuid,
        records: Vec<CommitRecord>,
    ) -> StoreResult<()>;

    async fn list_commit_records(&self, repository_id: Uuid) -> StoreResult<Vec<CommitRecord>>;
}
