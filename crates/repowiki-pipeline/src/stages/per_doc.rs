//! Stage 7 — per-leaf document generation
//!
//! One generation call per incomplete catalogue leaf. The file item is
//! upserted first and the leaf marked completed only after that write, so
//! an interruption re-runs at most the in-flight leaf.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use repowiki_core::types::{CatalogueNode, FileItem};
use repowiki_kernel::extract_wrapped;
use repowiki_kernel::prompts::vars;

use crate::context::StageContext;
use crate::error::StageResult;
use crate::retry::{invoke_collected, RetryPolicy};

pub const NAME: &str = "per_doc";

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    let nodes = ctx.store.list_catalogue(ctx.repo.id).await?;
    let leaves: Vec<&CatalogueNode> = nodes
        .iter()
        .filter(|n| !nodes.iter().any(|other| other.parent_id == Some(n.id)))
        .collect();

    for leaf in leaves {
        ctx.check_cancelled()?;
        if leaf.is_completed {
            continue;
        }
        generate_leaf(ctx, leaf).await?;
    }
    Ok(())
}

/// Generate and persist one leaf document, then flip its completion flag.
pub async fn generate_leaf(ctx: &StageContext<'_>, leaf: &CatalogueNode) -> StageResult<()> {
    let manifest = ctx.manifest();
    let prompt = ctx.kernel.render(
        "GenerateDocs",
        &vars([
            ("prompt", leaf.prompt.as_str()),
            ("title", leaf.name.as_str()),
            ("catalogue", manifest.as_str()),
            ("git_repository", ctx.repo.address.as_str()),
            ("branch", ctx.branch().as_str()),
        ]),
    )?;

    // The access log scopes the source list to this leaf's generation.
    ctx.kernel.access_log().clear();

    let output = RetryPolicy::standard()
        .run(NAME, |_| {
            invoke_collected(ctx.kernel, prompt.clone(), ctx.cancel.clone())
        })
        .await?;

    let content = extract_wrapped(&output, "blog").trim().to_string();
    let sources = ctx.kernel.access_log().paths();

    ctx.store
        .upsert_file_item(FileItem {
            id: Uuid::new_v4(),
            catalogue_id: leaf.id,
            title: leaf.name.clone(),
            content,
            source_files: sources,
            created_at: Utc::now(),
        })
        .await?;

    let mut completed = leaf.clone();
    completed.is_completed = true;
    ctx.store.update_catalogue_node(&completed).await?;

    info!(repository = %ctx.repo.id, leaf = %leaf.title, "leaf document generated");
    Ok(())
}
