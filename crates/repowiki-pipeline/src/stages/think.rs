//! Stage 6 — documentation catalogue design
//!
//! Selects the classification-specific outline prompt (base fallback),
//! parses the returned JSON into a catalogue forest, and replaces the
//! stored forest wholesale with every node not yet completed. Skipped when
//! a forest already exists so a resumed run keeps its per-leaf progress.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use repowiki_core::types::CatalogueNode;
use repowiki_kernel::extract_wrapped;
use repowiki_kernel::prompts::vars;

use crate::context::StageContext;
use crate::error::{StageError, StageResult};
use crate::retry::{invoke_collected, RetryPolicy};
use crate::stages::slugify;

pub const NAME: &str = "catalogue_think";

#[derive(Debug, Deserialize)]
pub struct OutlineRoot {
    #[serde(default)]
    pub items: Vec<OutlineItem>,
}

#[derive(Debug, Deserialize)]
pub struct OutlineItem {
    pub title: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub children: Vec<OutlineItem>,
}

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    // A live forest means this stage already ran; regenerating here would
    // wipe per-leaf completion flags and redo finished documents. The
    // incremental updater owns catalogue changes after that point.
    if !ctx.store.list_catalogue(ctx.repo.id).await?.is_empty() {
        return Ok(());
    }

    let manifest = ctx.manifest();
    let name = ctx.repo.name.clone().unwrap_or_default();
    let prompt = ctx.kernel.render_variant(
        "AnalyzeCatalogue",
        ctx.repo.classification,
        &vars([
            ("code_files", manifest.as_str()),
            ("git_repository", ctx.repo.address.as_str()),
            ("repository_name", name.as_str()),
        ]),
    )?;

    let output = RetryPolicy::standard()
        .run(NAME, |_| {
            invoke_collected(ctx.kernel, prompt.clone(), ctx.cancel.clone())
        })
        .await?;

    let json = extract_wrapped(&output, "documentation_structure");
    let outline: OutlineRoot = serde_json::from_str(json.trim())
        .map_err(|e| StageError::failed(NAME, format!("unparsable outline: {}", e)))?;
    if outline.items.is_empty() {
        return Err(StageError::failed(NAME, "outline has no items"));
    }

    let nodes = to_forest(ctx.repo.id, &outline.items);
    ctx.store.replace_catalogue(ctx.repo.id, nodes).await?;
    Ok(())
}

/// Flatten the nested outline into rows. Url slugs are made unique per
/// repository by suffixing duplicates.
pub fn to_forest(repository_id: Uuid, items: &[OutlineItem]) -> Vec<CatalogueNode> {
    let mut out = Vec::new();
    let mut seen_urls: Vec<String> = Vec::new();
    walk(repository_id, None, items, &mut out, &mut seen_urls);
    out
}

fn walk(
    repository_id: Uuid,
    parent_id: Option<Uuid>,
    items: &[OutlineItem],
    out: &mut Vec<CatalogueNode>,
    seen_urls: &mut Vec<String>,
) {
    for (index, item) in items.iter().enumerate() {
        let display = if item.name.is_empty() {
            item.title.clone()
        } else {
            item.name.clone()
        };
        let base_url = slugify(&item.title);
        let mut url = base_url.clone();
        let mut suffix = 1;
        while seen_urls.contains(&url) {
            suffix += 1;
            url = format!("{}-{}", base_url, suffix);
        }
        seen_urls.push(url.clone());

        let node = CatalogueNode {
            id: Uuid::new_v4(),
            repository_id,
            parent_id,
            title: item.title.clone(),
            name: display.clone(),
            url,
            description: item.description.clone(),
            prompt: if item.prompt.is_empty() {
                // Placeholder until an operator refines it.
                format!("Document the {} area of this repository.", display)
            } else {
                item.prompt.clone()
            },
            order_index: index,
            is_completed: false,
            is_deleted: false,
            created_at: Utc::now(),
        };
        let id = node.id;
        out.push(node);
        walk(repository_id, Some(id), &item.children, out, seen_urls);
    }
}
