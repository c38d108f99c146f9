//! In-memory store — the reference `DocStore` used by the binary's
//! single-process mode and by every test.
//!
//! All operations take one lock, so each is a single short transaction and
//! the lease claim is a true compare-and-swap.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::store::{DocStore, StoreError, StoreResult};
use crate::types::{
    CatalogueNode, CommitRecord, DocumentRecord, FileItem, MindMapNode, MindMapRecord,
    OverviewRecord, RepoStatus, Repository,
};

#[derive(Default)]
struct Inner {
    repositories: HashMap<Uuid, Repository>,
    /// Keyed by repository id — one document per repository.
    documents: HashMap<Uuid, DocumentRecord>,
    /// Keyed by document id.
    overviews: HashMap<Uuid, OverviewRecord>,
    /// Keyed by repository id.
    mind_maps: HashMap<Uuid, MindMapRecord>,
    catalogues: HashMap<Uuid, CatalogueNode>,
    /// Keyed by catalogue id.
    file_items: HashMap<Uuid, FileItem>,
    /// Keyed by repository id.
    commits: HashMap<Uuid, Vec<CommitRecord>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lease_is_free(repo: &Repository, now: DateTime<Utc>) -> bool {
        match (&repo.owner, repo.lease_deadline) {
            (None, _) => true,
            (Some(_), Some(deadline)) => deadline < now,
            (Some(_), None) => false,
        }
    }
}

#[async_trait::async_trait]
impl DocStore for MemoryStore {
    async fn insert_repository(&self, repo: Repository) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.repositories.contains_key(&repo.id) {
            return Err(StoreError::Conflict(format!(
                "repository {} already exists",
                repo.id
            )));
        }
        inner.repositories.insert(repo.id, repo);
        Ok(())
    }

    async fn get_repository(&self, id: Uuid) -> StoreResult<Option<Repository>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.repositories.get(&id).cloned())
    }

    async fn lease_repository(
        &self,
        owner: &str,
        lease: Duration,
    ) -> StoreResult<Option<Repository>> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();

        let mut candidates: Vec<&Repository> = inner
            .repositories
            .values()
            .filter(|r| {
                matches!(r.status, RepoStatus::Pending | RepoStatus::Processing)
                    && Self::lease_is_free(r, now)
            })
            .collect();
        // Interrupted work first, then oldest submission.
        candidates.sort_by_key(|r| (r.status != RepoStatus::Processing, r.created_at));

        let id = match candidates.first() {
            Some(r) => r.id,
            None => return Ok(None),
        };

        let repo = inner.repositories.get_mut(&id).unwrap();
        repo.status = RepoStatus::Processing;
        repo.owner = Some(owner.to_string());
        repo.lease_deadline = Some(now + lease);
        repo.updated_at = now;
        Ok(Some(repo.clone()))
    }

    async fn lease_stale_repository(
        &self,
        owner: &str,
        lease: Duration,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Repository>> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();

        let id = {
            let mut candidates: Vec<(&Repository, DateTime<Utc>)> = inner
                .repositories
                .values()
                .filter(|r| r.status == RepoStatus::Completed && Self::lease_is_free(r, now))
                .filter_map(|r| {
                    inner
                        .documents
                        .get(&r.id)
                        .filter(|d| d.last_update < stale_before)
                        .map(|d| (r, d.last_update))
                })
                .collect();
            candidates.sort_by_key(|(_, last_update)| *last_update);
            match candidates.first() {
                Some((r, _)) => r.id,
                None => return Ok(None),
            }
        };

        let repo = inner.repositories.get_mut(&id).unwrap();
        repo.status = RepoStatus::Processing;
        repo.owner = Some(owner.to_string());
        repo.lease_deadline = Some(now + lease);
        repo.updated_at = now;
        Ok(Some(repo.clone()))
    }

    async fn update_repository(&self, repo: &Repository, owner: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .repositories
            .get_mut(&repo.id)
            .ok_or_else(|| StoreError::NotFound(format!("repository {}", repo.id)))?;
        if stored.owner.as_deref() != Some(owner) {
            return Err(StoreError::PreconditionFailed(format!(
                "lease on repository {} not held by {}",
                repo.id, owner
            )));
        }
        let (held_owner, held_deadline) = (stored.owner.clone(), stored.lease_deadline);
        *stored = repo.clone();
        stored.owner = held_owner;
        stored.lease_deadline = held_deadline;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn release_repository(
        &self,
        id: Uuid,
        owner: &str,
        status: RepoStatus,
        error: Option<String>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .repositories
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("repository {}", id)))?;
        if stored.owner.as_deref() != Some(owner) {
            return Err(StoreError::PreconditionFailed(format!(
                "lease on repository {} not held by {}",
                id, owner
            )));
        }
        stored.status = status;
        stored.error = error;
        stored.owner = None;
        stored.lease_deadline = None;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_document(&self, doc: DocumentRecord) -> StoreResult<DocumentRecord> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .documents
            .entry(doc.repository_id)
            .and_modify(|existing| {
                existing.git_path = doc.git_path.clone();
                existing.last_update = doc.last_update;
                existing.status = doc.status;
            })
            .or_insert(doc);
        Ok(entry.clone())
    }

    async fn get_document(&self, repository_id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.documents.get(&repository_id).cloned())
    }

    async fn replace_overview(&self, document_id: Uuid, content: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.overviews.insert(
            document_id,
            OverviewRecord {
                id: Uuid::new_v4(),
                document_id,
                content: content.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_overview(&self, document_id: Uuid) -> StoreResult<Option<OverviewRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.overviews.get(&document_id).cloned())
    }

    async fn replace_mind_map(&self, repository_id: Uuid, root: MindMapNode) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.mind_maps.insert(
            repository_id,
            MindMapRecord {
                id: Uuid::new_v4(),
                repository_id,
                root,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_mind_map(&self, repository_id: Uuid) -> StoreResult<Option<MindMapRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.mind_maps.get(&repository_id).cloned())
    }

    async fn replace_catalogue(
        &self,
        repository_id: Uuid,
        nodes: Vec<CatalogueNode>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let removed: Vec<Uuid> = inner
            .catalogues
            .values()
            .filter(|n| n.repository_id == repository_id)
            .map(|n| n.id)
            .collect();
        for id in removed {
            inner.catalogues.remove(&id);
            inner.file_items.remove(&id);
        }
        for node in nodes {
            inner.catalogues.insert(node.id, node);
        }
        Ok(())
    }

    async fn list_catalogue(&self, repository_id: Uuid) -> StoreResult<Vec<CatalogueNode>> {
        let inner = self.inner.lock().unwrap();
        let mut nodes: Vec<CatalogueNode> = inner
            .catalogues
            .values()
            .filter(|n| n.repository_id == repository_id && !n.is_deleted)
            .cloned()
            .collect();
        nodes.sort_by_key(|n| (n.parent_id, n.order_index));
        Ok(nodes)
    }

    async fn insert_catalogue_node(&self, node: CatalogueNode) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.catalogues.contains_key(&node.id) {
            return Err(StoreError::Conflict(format!(
                "catalogue node {} already exists",
                node.id
            )));
        }
        inner.catalogues.insert(node.id, node);
        Ok(())
    }

    async fn update_catalogue_node(&self, node: &CatalogueNode) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.catalogues.get_mut(&node.id) {
            Some(stored) => {
                *stored = node.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("catalogue node {}", node.id))),
        }
    }

    async fn upsert_file_item(&self, item: FileItem) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.file_items.insert(item.catalogue_id, item);
        Ok(())
    }

    async fn get_file_item(&self, catalogue_id: Uuid) -> StoreResult<Option<FileItem>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.file_items.get(&catalogue_id).cloned())
    }

    async fn replace_commit_records(
        &self,
        repository_id: Uuid,
        records: Vec<CommitRecord>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.commits.insert(repository_id, records);
        Ok(())
    }

    async fn list_commit_records(&self, repository_id: Uuid) -> StoreResult<Vec<CommitRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records = inner
            .commits
            .get(&repository_id)
            .cloned()
            .unwrap_or_default();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
