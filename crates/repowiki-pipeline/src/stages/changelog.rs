//! Stage 8 — commit update log (git repositories only)
//!
//! The record set is regenerated wholesale from recent history. Records
//! are inserted oldest first so creation order matches commit date order.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use repowiki_core::types::{CommitRecord, RepoKind};

use crate::context::StageContext;
use crate::error::StageResult;

pub const NAME: &str = "changelog";

/// How much history feeds the update log.
const LOG_LIMIT: usize = 50;

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    if ctx.repo.kind != RepoKind::Git || !ctx.config.document.enable_warehouse_commit {
        return Ok(());
    }

    let working = ctx.working_path();
    let mut commits = ctx.git.log(&working, LOG_LIMIT).await?;
    // Oldest first.
    commits.sort_by_key(|c| c.date);

    let records: Vec<CommitRecord> = commits
        .into_iter()
        .map(|c| {
            let mut lines = c.message.lines();
            let title = lines.next().unwrap_or_default().to_string();
            let description = lines.collect::<Vec<_>>().join("\n").trim().to_string();
            CommitRecord {
                id: Uuid::new_v4(),
                repository_id: ctx.repo.id,
                title,
                description,
                commit_date: c.date,
                created_at: Utc::now(),
            }
        })
        .collect();

    info!(repository = %ctx.repo.id, count = records.len(), "update log regenerated");
    ctx.store
        .replace_commit_records(ctx.repo.id, records)
        .await?;
    Ok(())
}
