//! Shared stage context

use tokio_util::sync::CancellationToken;

use repowiki_core::config::Config;
use repowiki_core::store::DocStore;
use repowiki_core::types::{DocumentRecord, Repository};
use repowiki_core::GitClient;
use repowiki_kernel::Kernel;

use crate::error::{StageError, StageResult};

/// Everything a stage runner needs. Stages mutate the repository value and
/// persist through the store under the worker's lease.
pub struct StageContext<'a> {
    pub repo: &'a mut Repository,
    pub document: &'a DocumentRecord,
    pub kernel: &'a Kernel,
    pub store: &'a dyn DocStore,
    pub git: &'a dyn GitClient,
    pub config: &'a Config,
    pub owner: &'a str,
    pub cancel: CancellationToken,
}

impl StageContext<'_> {
    /// Persist the current repository fields under the lease.
    pub async fn save_repo(&self) -> StageResult<()> {
        self.store
            .update_repository(self.repo, self.owner)
            .await
            .map_err(StageError::from)
    }

    /// The optimized manifest set by the catalogue stage; empty before it.
    pub fn manifest(&self) -> String {
        self.repo
            .optimized_directory_structure
            .clone()
            .unwrap_or_default()
    }

    pub fn branch(&self) -> String {
        self.repo
            .resolved_branch
            .clone()
            .or_else(|| self.repo.branch.clone())
            .unwrap_or_else(|| "main".to_string())
    }

    pub fn working_path(&self) -> String {
        self.repo.local_path.clone().unwrap_or_default()
    }

    pub fn check_cancelled(&self) -> StageResult<()> {
        if self.cancel.is_cancelled() {
            Err(StageError::Cancelled)
        } else {
            Ok(())
        }
    }
}
