//! Worker loop — lease, clone, orchestrate, transition
//!
//! One long-running task per worker process; one repository at a time.
//! Coordination across workers happens exclusively through the store's
//! lease claim. The worker owns the working tree for the duration of its
//! lease.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use repowiki_core::config::Config;
use repowiki_core::store::{DocStore, StoreResult};
use repowiki_core::types::{DocumentRecord, RepoKind, RepoStatus, Repository};
use repowiki_core::GitClient;
use repowiki_kernel::{Kernel, KernelError};

use crate::context::StageContext;
use crate::error::StageError;
use crate::orchestrator::Orchestrator;

pub const UNSUPPORTED_KIND_ERROR: &str = "unsupported repository type";

/// Builds a kernel scoped to one working tree. Injectable for tests.
pub type KernelFactory =
    Arc<dyn Fn(&str, &Config) -> Result<Kernel, KernelError> + Send + Sync>;

pub fn default_kernel_factory() -> KernelFactory {
    Arc::new(|working_path, config| {
        Kernel::new(
            &config.llm.endpoint,
            &config.llm.chat_api_key,
            working_path,
            &config.llm.chat_model,
            true,
            config,
        )
    })
}

pub struct Worker {
    store: Arc<dyn DocStore>,
    git: Arc<dyn GitClient>,
    config: Arc<Config>,
    owner: String,
    kernel_factory: KernelFactory,
}

impl Worker {
    pub fn new(store: Arc<dyn DocStore>, git: Arc<dyn GitClient>, config: Arc<Config>) -> Self {
        Self {
            store,
            git,
            config,
            owner: format!("worker-{}", Uuid::new_v4()),
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

    /// The loop body, forever: claim, process, or sleep when idle.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(owner = %self.owner, "worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.step(&cancel).await {
                Ok(true) => {}
                Ok(false) => self.idle_sleep(&cancel).await,
                Err(e) => {
                    error!(owner = %self.owner, "worker step failed: {}", e);
                    self.idle_sleep(&cancel).await;
                }
            }
        }
        info!(owner = %self.owner, "worker stopped");
    }

    /// Claim and process at most one repository. Returns whether work was
    /// found.
    pub async fn step(&self, cancel: &CancellationToken) -> StoreResult<bool> {
        let lease = chrono::Duration::seconds(self.config.worker.lease_duration_secs);
        let repo = match self.store.lease_repository(&self.owner, lease).await? {
            Some(repo) => repo,
            None => return Ok(false),
        };
        info!(repository = %repo.id, address = %repo.address, "claimed repository");
        self.process(repo, cancel.clone()).await;
        Ok(true)
    }

    async fn process(&self, mut repo: Repository, cancel: CancellationToken) {
        match repo.kind {
            RepoKind::Git => {
                if !self.prepare_git(&mut repo).await {
                    return;
                }
            }
            RepoKind::File => {
                repo.local_path = Some(repo.address.clone());
                if repo.name.is_none() {
                    repo.name = Path::new(&repo.address)
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string());
                }
                if self.save(&repo).await.is_err() {
                    return;
                }
            }
            RepoKind::Unknown => {
                warn!(repository = %repo.id, "unsupported repository type");
                self.finish(&repo, RepoStatus::Failed, Some(UNSUPPORTED_KIND_ERROR.to_string()))
                    .await;
                return;
            }
        }

        let working = repo.local_path.clone().unwrap_or_default();
        let document = match self
            .store
            .upsert_document(DocumentRecord::new(repo.id, working.clone()))
            .await
        {
            Ok(doc) => doc,
            Err(e) => {
                error!(repository = %repo.id, "document upsert failed: {}", e);
                self.fail(&repo, e.to_string()).await;
                return;
            }
        };

        let kernel = match (self.kernel_factory)(&working, &self.config) {
            Ok(kernel) => kernel,
            Err(e) => {
                error!(repository = %repo.id, "kernel construction failed: {}", e);
                self.fail(&repo, e.to_string()).await;
                return;
            }
        };

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

        match Orchestrator::run(&mut ctx).await {
            Ok(()) => {
                info!(repository = %repo.id, "pipeline completed");
                let _ = self
                    .store
                    .upsert_document(DocumentRecord {
                        status: RepoStatus::Completed,
                        last_update: Utc::now(),
                        ..document
                    })
                    .await;
                self.finish(&repo, RepoStatus::Completed, None).await;
            }
            Err(StageError::Cancelled) => {
                // Partial state is valid for resume; the lease will lapse.
                warn!(repository = %repo.id, "pipeline cancelled mid-run");
            }
            Err(e) if e.is_lease_lost() => {
                // Another worker owns the row now; no further writes.
                warn!(repository = %repo.id, "lease lost, abandoning: {}", e);
            }
            Err(e) => {
                error!(repository = %repo.id, "pipeline failed: {}", e);
                tokio::time::sleep(Duration::from_secs(
                    self.config.worker.poll_interval_secs,
                ))
                .await;
                let _ = self
                    .store
                    .upsert_document(DocumentRecord {
                        status: RepoStatus::Failed,
                        ..document
                    })
                    .await;
                self.fail(&repo, e.to_string()).await;
            }
        }
    }

    /// Clone and record the resolved remote metadata.
    async fn prepare_git(&self, repo: &mut Repository) -> bool {
        let target = Path::new(&self.config.worker.clone_root)
            .join(repo.id.to_string())
            .to_string_lossy()
            .to_string();
        let outcome = self
            .git
            .clone_repository(
                &repo.address,
                repo.user_name.as_deref(),
                repo.password.as_deref(),
                repo.branch.as_deref(),
                &target,
            )
            .await;
        match outcome {
            Ok(cloned) => {
                repo.name = Some(cloned.repository_name);
                repo.resolved_branch = Some(cloned.branch_name);
                repo.organization = Some(cloned.organization);
                repo.version = Some(cloned.version);
                repo.local_path = Some(cloned.local_path);
                self.save(repo).await.is_ok()
            }
            Err(e) => {
                error!(repository = %repo.id, "clone failed: {}", e);
                tokio::time::sleep(Duration::from_secs(
                    self.config.worker.poll_interval_secs,
                ))
                .await;
                self.fail(repo, e.to_string()).await;
                false
            }
        }
    }

    async fn save(&self, repo: &Repository) -> StoreResult<()> {
        if let Err(e) = self.store.update_repository(repo, &self.owner).await {
            warn!(repository = %repo.id, "repository update failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    async fn fail(&self, repo: &Repository, message: String) {
        self.finish(repo, RepoStatus::Failed, Some(message)).await;
    }

    async fn finish(&self, repo: &Repository, status: RepoStatus, error: Option<String>) {
        if let Err(e) = self
            .store
            .release_repository(repo.id, &self.owner, status, error)
            .await
        {
            warn!(repository = %repo.id, "release failed: {}", e);
        }
    }

    async fn idle_sleep(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(self.config.worker.poll_interval_secs)) => {}
        }
    }
}
