//! Stage 5 — project overview
//!
//! Always re-runs: the prior overview row is deleted and replaced.

use repowiki_kernel::prompts::vars;
use repowiki_kernel::{extract_tag, strip_tag};

use crate::context::StageContext;
use crate::error::StageResult;
use crate::retry::{invoke_collected, RetryPolicy};

pub const NAME: &str = "overview";

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    let manifest = ctx.manifest();
    let prompt = ctx.kernel.render(
        "Overview",
        &vars([
            ("catalogue", manifest.as_str()),
            ("git_repository", ctx.repo.address.as_str()),
            ("branch", ctx.branch().as_str()),
            ("readme", ctx.repo.readme.as_deref().unwrap_or_default()),
        ]),
    )?;

    let output = RetryPolicy::standard()
        .run(NAME, |_| {
            invoke_collected(ctx.kernel, prompt.clone(), ctx.cancel.clone())
        })
        .await?;

    // Reasoning is stripped first; the blog wrapper is optional.
    let without_analysis = strip_tag(&output, "project_analysis");
    let content = extract_tag(&without_analysis, "blog").unwrap_or(without_analysis);

    ctx.store
        .replace_overview(ctx.document.id, content.trim())
        .await?;
    Ok(())
}
