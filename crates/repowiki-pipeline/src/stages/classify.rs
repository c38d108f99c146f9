//! Stage 3 — repository classification
//!
//! Steers which documentation outline prompt is used later. An unparseable
//! answer leaves the classification unset and the pipeline continues with
//! the base prompt variants.

use tracing::{info, warn};

use repowiki_core::types::Classification;
use repowiki_kernel::extract_classification;
use repowiki_kernel::prompts::vars;

use crate::context::StageContext;
use crate::error::StageResult;
use crate::retry::RetryPolicy;

pub const NAME: &str = "classify";

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    if ctx.repo.classification.is_some() {
        return Ok(());
    }

    let manifest = ctx.manifest();
    let prompt = ctx.kernel.render(
        "RepositoryClassification",
        &vars([
            ("category", manifest.as_str()),
            ("readme", ctx.repo.readme.as_deref().unwrap_or_default()),
        ]),
    )?;

    let output = RetryPolicy::standard()
        .run(NAME, |_| async {
            Ok(ctx
                .kernel
                .invoke_prompt(&prompt, ctx.cancel.clone())
                .await?)
        })
        .await?;

    let classification = extract_classification(&output)
        .and_then(|token| {
            let parsed = Classification::parse(&token);
            if parsed.is_none() {
                warn!(repository = %ctx.repo.id, token, "unparseable classification");
            }
            parsed
        });

    if let Some(classification) = classification {
        info!(repository = %ctx.repo.id, %classification, "classified");
        ctx.repo.classification = Some(classification);
        ctx.save_repo().await?;
    }
    Ok(())
}
