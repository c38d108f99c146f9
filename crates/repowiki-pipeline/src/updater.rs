//! Incremental updater — staleness-driven catalogue reconciliation
//!
//! A second periodic loop sharing the worker's lease discipline. For each
//! completed repository past the staleness threshold: pull, summarize the
//! new commits with their diffs, ask the model which catalogue items the
//! commits invalidate, apply the diff, and regenerate only the affected
//! leaves.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use repowiki_core::config::Config;
use repowiki_core::store::{DocStore, StoreResult};
use repowiki_core::types::{CatalogueNode, CommitRecord, RepoStatus, Repository};
use repowiki_core::{CommitInfo, GitClient};
use repowiki_kernel::extract::extract_json_fence;
use repowiki_kernel::prompts::vars;

use crate::context::StageContext;
use crate::error::{StageError, StageResult};
use crate::retry::{invoke_collected, RetryPolicy};
use crate::stages::{per_doc, slugify};
use crate::worker::{default_kernel_factory, KernelFactory};

#[derive(Debug, Default, Deserialize)]
struct CatalogueDiff {
    #[serde(default)]
    update: Vec<String>,
    #[serde(default)]
    add: Vec<AddedItem>,
    #[serde(default)]
    delete: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddedItem {
    title: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    parent_id: Option<String>,
}

pub struct Updater {
    store: Arc<dyn DocStore>,
    git: Arc<dyn GitClient>,
    config: Arc<Config>,
    owner: String,
    kernel_factory: KernelFactory,
}

impl Updater {
    pub fn new(store: Arc<dyn DocStore>, git: Arc<dyn GitClient>, config: Arc<Config>) -> Self {
        Self {
            store,
            git,
            config,
            owner: format!("updater-{}", Uuid::new_v4()),
            kernel_factory: default_kernel_factory(),
        }
    }

    pub fn with_kernel_factory(mut self, factory: KernelFactory) -> Self {
        self.kernel_factory = factory;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn run(&self, cancel: CancellationToken) {
        info!(owner = %self.owner, "updater started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.step(&cancel).await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(Duration::from_secs(
                            self.config.worker.updater_interval_secs,
                        )) => {}
                    }
                }
                Err(e) => {
                    error!(owner = %self.owner, "updater step failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(
                        self.config.worker.poll_interval_secs,
                    ))
                    .await;
                }
            }
        }
        info!(owner = %self.owner, "updater stopped");
    }

    /// Claim and refresh at most one stale repository.
    pub async fn step(&self, cancel: &CancellationToken) -> StoreResult<bool> {
        let lease = chrono::Duration::seconds(self.config.worker.lease_duration_secs);
        let stale_before =
            Utc::now() - chrono::Duration::days(self.config.document.update_interval_days);
        let repo = match self
            .store
            .lease_stale_repository(&self.owner, lease, stale_before)
            .await?
        {
            Some(repo) => repo,
            None => return Ok(false),
        };
        info!(repository = %repo.id, "claimed stale repository");

        match self.refresh(repo.clone(), cancel.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_lease_lost() => {
                warn!(repository = %repo.id, "lease lost during update: {}", e);
            }
            Err(StageError::Cancelled) => {
                warn!(repository = %repo.id, "update cancelled");
            }
            Err(e) => {
                error!(repository = %repo.id, "incremental update failed: {}", e);
                tokio::time::sleep(Duration::from_secs(self.config.worker.poll_interval_secs))
                    .await;
                let _ = self
                    .store
                    .release_repository(repo.id, &self.owner, RepoStatus::Failed, Some(e.to_string()))
                    .await;
            }
        }
        Ok(true)
    }

    async fn refresh(&self, mut repo: Repository, cancel: CancellationToken) -> StageResult<()> {
        let working = repo
            .local_path
            .clone()
            .ok_or_else(|| StageError::failed("update", "repository has no working tree"))?;

        let pull = self
            .git
            .pull(
                &working,
                repo.version.as_deref(),
                repo.user_name.as_deref(),
                repo.password.as_deref(),
            )
            .await?;

        if pull.commits.is_empty() {
            info!(repository = %repo.id, "no new commits");
            self.touch_document(&repo).await?;
            self.store
                .release_repository(repo.id, &self.owner, RepoStatus::Completed, None)
                .await?;
            return Ok(());
        }

        let summary = self
            .commit_summary(&working, repo.version.as_deref(), &pull.commits)
            .await;
        let nodes = self.store.list_catalogue(repo.id).await?;
        let document = self
            .store
            .get_document(repo.id)
            .await?
            .ok_or_else(|| StageError::failed("update", "repository has no document"))?;

        let kernel = (self.kernel_factory)(&working, &self.config)?;
        let catalogue_json = serde_json::to_string_pretty(
            &nodes
                .iter()
                .map(|n| {
                    serde_json::json!({
                        "id": n.id,
                        "title": n.title,
                        "name": n.name,
                        "description": n.description,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default();
        let manifest = repo
            .optimized_directory_structure
            .clone()
            .unwrap_or_default();

        let prompt = kernel.render(
            "AnalyzeNewCatalogue",
            &vars([
                ("git_commit", summary.as_str()),
                ("document_catalogue", catalogue_json.as_str()),
                ("catalogue", manifest.as_str()),
                ("git_repository", repo.address.as_str()),
            ]),
        )?;

        let output = RetryPolicy::standard()
            .run("update", |_| {
                invoke_collected(&kernel, prompt.clone(), cancel.clone())
            })
            .await?;
        let json = extract_json_fence(&output).unwrap_or_else(|| output.trim().to_string());
        let diff: CatalogueDiff = serde_json::from_str(&json)
            .map_err(|e| StageError::failed("update", format!("unparsable catalogue diff: {}", e)))?;

        self.apply_diff(&repo, &nodes, diff).await?;

        // Regenerate only the leaves the diff invalidated.
        {
            let mut ctx = StageContext {
                repo: &mut repo,
                document: &document,
                kernel: &kernel,
                store: self.store.as_ref(),
                git: self.git.as_ref(),
                config: &self.config,
                owner: &self.owner,
                cancel,
            };
            per_doc::run(&mut ctx).await?;
        }

        // The update log reflects what this refresh ingested.
        if self.config.document.enable_warehouse_commit {
            let records: Vec<CommitRecord> = pull
                .commits
                .iter()
                .map(|c| {
                    let mut lines = c.message.lines();
                    CommitRecord {
                        id: Uuid::new_v4(),
                        repository_id: repo.id,
                        title: lines.next().unwrap_or_default().to_string(),
                        description: lines.collect::<Vec<_>>().join("\n").trim().to_string(),
                        commit_date: c.date,
                        created_at: Utc::now(),
                    }
                })
                .collect();
            self.store.replace_commit_records(repo.id, records).await?;
        }

        repo.version = Some(pull.head_version);
        self.store.update_repository(&repo, &self.owner).await?;
        self.touch_document(&repo).await?;
        self.store
            .release_repository(repo.id, &self.owner, RepoStatus::Completed, None)
            .await?;
        info!(repository = %repo.id, commits = pull.commits.len(), "incremental update complete");
        Ok(())
    }

    /// Compact per-commit diff summary fed to the reconciliation prompt.
    async fn commit_summary(
        &self,
        working: &str,
        since: Option<&str>,
        commits: &[CommitInfo],
    ) -> String {
        let mut out = String::new();
        let mut prev = since.map(|s| s.to_string());
        for commit in commits {
            out.push_str("<commit>\n");
            out.push_str(commit.message.trim());
            out.push('\n');
            if let Some(prev_id) = &prev {
                match self.git.diff(working, prev_id, &commit.id).await {
                    Ok(entries) => {
                        for entry in entries {
                            out.push_str(&format!(" - {}: {}\n", entry.status, entry.path));
                        }
                    }
                    Err(e) => warn!("diff failed for {}: {}", commit.id, e),
                }
            }
            out.push_str("</commit>\n");
            prev = Some(commit.id.clone());
        }
        out
    }

    async fn apply_diff(
        &self,
        repo: &Repository,
        nodes: &[CatalogueNode],
        diff: CatalogueDiff,
    ) -> StageResult<()> {
        let find = |id: &str| nodes.iter().find(|n| n.id.to_string() == id);

        for id in &diff.delete {
            if let Some(node) = find(id) {
                let mut deleted = node.clone();
                deleted.is_deleted = true;
                self.store.update_catalogue_node(&deleted).await?;
            }
        }
        for id in &diff.update {
            if let Some(node) = find(id) {
                let mut stale = node.clone();
                stale.is_completed = false;
                self.store.update_catalogue_node(&stale).await?;
            }
        }

        let mut seen_urls: Vec<String> = nodes.iter().map(|n| n.url.clone()).collect();
        for (index, item) in diff.add.iter().enumerate() {
            let base_url = slugify(&item.title);
            let mut url = base_url.clone();
            let mut suffix = 1;
            while seen_urls.contains(&url) {
                suffix += 1;
                url = format!("{}-{}", base_url, suffix);
            }
            seen_urls.push(url.clone());

            let display = if item.name.is_empty() {
                item.title.clone()
            } else {
                item.name.clone()
            };
            self.store
                .insert_catalogue_node(CatalogueNode {
                    id: Uuid::new_v4(),
                    repository_id: repo.id,
                    parent_id: item
                        .parent_id
                        .as_deref()
                        .and_then(|p| Uuid::parse_str(p).ok()),
                    title: item.title.clone(),
                    name: display.clone(),
                    url,
                    description: item.description.clone(),
                    prompt: if item.prompt.is_empty() {
                        format!("Document the {} area of this repository.", display)
                    } else {
                        item.prompt.clone()
                    },
                    order_index: nodes.len() + index,
                    is_completed: false,
                    is_deleted: false,
                    created_at: Utc::now(),
                })
                .await?;
        }
        Ok(())
    }

    async fn touch_document(&self, repo: &Repository) -> StageResult<()> {
        if let Some(document) = self.store.get_document(repo.id).await? {
            self.store
                .upsert_document(repowiki_core::types::DocumentRecord {
                    last_update: Utc::now(),
                    status: RepoStatus::Completed,
                    ..document
                })
                .await?;
        }
        Ok(())
    }
}
