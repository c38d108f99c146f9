//! Stage 2 — optimized directory manifest
//!
//! Small trees are stored verbatim. Large trees go through the directory
//! simplifier prompt so downstream prompts see only what matters. The
//! cutoff is strict: exactly the threshold still triggers the filter.

use std::path::Path;

use tracing::info;

use repowiki_kernel::extract_wrapped;
use repowiki_kernel::prompts::vars;

use crate::context::StageContext;
use crate::error::StageResult;
use crate::retry::{invoke_collected, RetryPolicy};
use crate::stages::raw_manifest;

pub const NAME: &str = "catalogue";

/// Trees with fewer files than this skip the LLM filter entirely.
pub const SMART_FILTER_THRESHOLD: usize = 800;

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    if ctx
        .repo
        .optimized_directory_structure
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty())
    {
        return Ok(());
    }

    let working = ctx.working_path();
    let (raw, file_count) = raw_manifest(Path::new(&working), ctx.config.document.catalogue_format)?;

    let manifest = if file_count < SMART_FILTER_THRESHOLD
        || !ctx.config.document.enable_smart_filter
    {
        raw
    } else {
        info!(
            repository = %ctx.repo.id,
            file_count,
            "large tree, running directory simplifier"
        );
        simplify(ctx, &raw).await?
    };

    ctx.repo.optimized_directory_structure = Some(manifest);
    ctx.save_repo().await
}

async fn simplify(ctx: &StageContext<'_>, raw: &str) -> StageResult<String> {
    let prompt = ctx.kernel.render(
        "CodeAnalysis/CodeDirSimplifier",
        &vars([
            ("code_files", raw),
            ("readme", ctx.repo.readme.as_deref().unwrap_or_default()),
        ]),
    )?;

    let output = RetryPolicy::smart_filter()
        .run(NAME, |_| {
            invoke_collected(ctx.kernel, prompt.clone(), ctx.cancel.clone())
        })
        .await?;

    Ok(extract_wrapped(&output, "response_file").trim().to_string())
}
