//! Pipeline orchestrator — stages 1–8 in dependency order
//!
//! Idempotent by construction: each stage's skip rule plus its persistence
//! contract lets re-entry after a crash resume from the first stage whose
//! output is missing from the store. Stages 4 and 5 regenerate every run;
//! stage 6 keeps an existing forest so stage 7 progress survives.

use tracing::{info, Instrument};

use crate::context::StageContext;
use crate::error::StageResult;
use crate::stages;

macro_rules! run_stage {
    ($module:ident, $ctx:expr) => {{
        $ctx.check_cancelled()?;
        let span = tracing::info_span!(
            "stage",
            repository = %$ctx.repo.id,
            stage = stages::$module::NAME,
        );
        stages::$module::run($ctx).instrument(span).await?;
        info!(
            repository = %$ctx.repo.id,
            stage = stages::$module::NAME,
            "stage complete"
        );
    }};
}

pub struct Orchestrator;

impl Orchestrator {
    /// Drive every stage against the given context.
    pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
        run_stage!(readme, ctx);
        run_stage!(catalogue, ctx);
        run_stage!(classify, ctx);
        run_stage!(mindmap, ctx);
        run_stage!(overview, ctx);
        run_stage!(think, ctx);
        run_stage!(per_doc, ctx);
        run_stage!(changelog, ctx);
        Ok(())
    }
}
