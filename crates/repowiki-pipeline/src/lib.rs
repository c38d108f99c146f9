//! Repowiki Pipeline - stage runners, orchestrator, worker loop, and the
//! incremental updater

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod stages;
pub mod updater;
pub mod worker;

pub use context::StageContext;
pub use error::{StageError, StageResult};
pub use orchestrator::Orchestrator;
pub use updater::Updater;
pub use worker::{KernelFactory, Worker};
