//! repowiki — repository ingestion and documentation pipeline

mod git;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use repowiki_core::config::Config;
use repowiki_core::store::DocStore;
use repowiki_core::types::{RepoKind, RepoStatus, Repository};
use repowiki_core::MemoryStore;
use repowiki_pipeline::{Updater, Worker};

use crate::git::SubprocessGit;

#[derive(Parser)]
#[command(name = "repowiki", about = "Turn repositories into documentation")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker and incremental-updater loops until interrupted.
    Serve,
    /// Enqueue one repository and process it to completion.
    Run {
        /// Remote git address, or a local directory for --kind file.
        address: String,
        #[arg(long)]
        branch: Option<String>,
        /// Repository kind: git or file.
        #[arg(long, default_value = "git")]
        kind: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let mut config: Config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => match std::fs::read_to_string("repowiki.toml") {
            Ok(text) => toml::from_str(&text).context("parsing repowiki.toml")?,
            Err(_) => Config::default(),
        },
    };
    if let Ok(key) = std::env::var("REPOWIKI_CHAT_API_KEY") {
        config.llm.chat_api_key = key;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(cli.config.as_ref())?);
    let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
    let git: Arc<dyn repowiki_core::GitClient> = Arc::new(SubprocessGit::new());

    match cli.command {
        Command::Serve => {
            let worker = Worker::new(store.clone(), git.clone(), config.clone());
            let updater = Updater::new(store, git, config);
            let cancel = CancellationToken::new();

            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown requested");
                ctrl_c_cancel.cancel();
            });

            tokio::join!(worker.run(cancel.clone()), updater.run(cancel));
        }
        Command::Run {
            address,
            branch,
            kind,
        } => {
            let kind = match kind.as_str() {
                "git" => RepoKind::Git,
                "file" => RepoKind::File,
                _ => RepoKind::Unknown,
            };
            let repo = Repository::new(address, kind, branch);
            let id = repo.id;
            store.insert_repository(repo).await?;

            let worker = Worker::new(store.clone(), git, config);
            let cancel = CancellationToken::new();
            loop {
                let worked = worker.step(&cancel).await?;
                let current = store
                    .get_repository(id)
                    .await?
                    .context("repository vanished")?;
                match current.status {
                    RepoStatus::Completed => {
                        info!(repository = %id, "completed");
                        break;
                    }
                    RepoStatus::Failed => {
                        anyhow::bail!(
                            "processing failed: {}",
                            current.error.unwrap_or_else(|| "unknown error".into())
                        );
                    }
                    _ if !worked => {
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}
