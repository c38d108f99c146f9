//! Repowiki Core - domain entities, config, error handling, and the store contract

pub mod config;
pub mod error;
pub mod git;
pub mod memory;
pub mod store;
pub mod types;

pub use config::{CatalogueFormat, Config, DocumentConfig, LlmConfig, WorkerConfig};
pub use error::{Error, Result};
pub use git::{CloneOutcome, CommitInfo, DiffEntry, GitClient, GitError, PullOutcome};
pub use memory::MemoryStore;
pub use store::{DocStore, StoreError, StoreResult};
pub use types::*;
