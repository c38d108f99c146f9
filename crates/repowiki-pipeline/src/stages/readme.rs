//! Stage 1 — README acquisition
//!
//! Prefers the repository's own README file; generates one with the
//! CodeAnalysis plugin when none exists. The repository row is re-synced
//! from the file system even on the use-existing branch.

use std::path::Path;

use tracing::info;

use repowiki_kernel::extract_tag;
use repowiki_kernel::prompts::vars;

use crate::context::StageContext;
use crate::error::StageResult;
use crate::retry::{invoke_collected, RetryPolicy};
use crate::stages::{find_readme, raw_manifest};

pub const NAME: &str = "readme";

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    if ctx
        .repo
        .readme
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty())
    {
        return Ok(());
    }

    let working = ctx.working_path();
    let root = Path::new(&working);

    let readme = match find_readme(root) {
        Some(existing) => existing,
        None => generate_readme(ctx, root).await?,
    };

    info!(repository = %ctx.repo.id, chars = readme.len(), "readme resolved");
    ctx.repo.readme = Some(readme);
    ctx.save_repo().await
}

async fn generate_readme(ctx: &StageContext<'_>, root: &Path) -> StageResult<String> {
    let (tree, _) = raw_manifest(root, ctx.config.document.catalogue_format)?;
    let prompt = ctx.kernel.render(
        "CodeAnalysis/GenerateReadme",
        &vars([
            ("catalogue", tree.as_str()),
            ("git_repository", ctx.repo.address.as_str()),
            ("branch", ctx.branch().as_str()),
        ]),
    )?;

    let output = RetryPolicy::standard()
        .run(NAME, |_| {
            invoke_collected(ctx.kernel, prompt.clone(), ctx.cancel.clone())
        })
        .await?;

    Ok(extract_tag(&output, "readme")
        .unwrap_or(output)
        .trim()
        .to_string())
}
