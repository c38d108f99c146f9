//! Stage 4 — knowledge mind map
//!
//! Always re-runs on a full pipeline: the prior map is deleted and the new
//! one inserted. Navigation lines are `##Title:path`; paths resolve to web
//! URLs at read time, not here.

use repowiki_core::types::MindMapNode;
use repowiki_kernel::prompts::vars;
use repowiki_kernel::strip_tag;

use crate::context::StageContext;
use crate::error::StageResult;
use crate::retry::{invoke_collected, RetryPolicy};

pub const NAME: &str = "mindmap";

pub async fn run(ctx: &mut StageContext<'_>) -> StageResult<()> {
    let manifest = ctx.manifest();
    let prompt = ctx.kernel.render(
        "GenerateMindMap",
        &vars([
            ("catalogue", manifest.as_str()),
            ("repository_url", ctx.repo.address.as_str()),
            ("branch", ctx.branch().as_str()),
        ]),
    )?;

    let output = RetryPolicy::standard()
        .run(NAME, |_| {
            invoke_collected(ctx.kernel, prompt.clone(), ctx.cancel.clone())
        })
        .await?;

    let cleaned = strip_tag(&output, "thinking");
    let title = ctx
        .repo
        .name
        .clone()
        .unwrap_or_else(|| ctx.repo.address.clone());
    let root = parse_mind_map(&cleaned, &title);

    ctx.store.replace_mind_map(ctx.repo.id, root).await?;
    Ok(())
}

/// Parse `#`-heading lines into a tree. Each line is `Title` or
/// `Title:path`; heading depth expresses nesting. Non-heading lines are
/// ignored.
pub fn parse_mind_map(text: &str, root_title: &str) -> MindMapNode {
    let mut root = MindMapNode::new(root_title);
    // Stack of (level, index-path into the tree).
    let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        let level = trimmed.chars().take_while(|&c| c == '#').count();
        if level == 0 {
            continue;
        }
        let rest = trimmed[level..].trim();
        if rest.is_empty() {
            continue;
        }
        let (title, url) = match rest.split_once(':') {
            Some((t, u)) if !u.trim().is_empty() => {
                (t.trim().to_string(), Some(u.trim().to_string()))
            }
            _ => (rest.trim_end_matches(':').trim().to_string(), None),
        };
        let mut node = MindMapNode::new(title);
        node.url = url;

        while stack.last().is_some_and(|(l, _)| *l >= level) {
            stack.pop();
        }
        let parent_path = stack.last().map(|(_, p)| p.clone()).unwrap_or_default();
        let parent = node_at_mut(&mut root, &parent_path);
        parent.children.push(node);
        let mut path = parent_path;
        path.push(parent.children.len() - 1);
        // Borrow of parent ends before we record the child path.
        stack.push((level, path));
    }
    root
}

fn node_at_mut<'a>(root: &'a mut MindMapNode, path: &[usize]) -> &'a mut MindMapNode {
    let mut node = root;
    for &i in path {
        node = &mut node.children[i];
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_nest_by_depth() {
        let text = "# Core\n## Engine:src/engine.rs\n## Utils\n# Extras\n";
        let root = parse_mind_map(text, "repo");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].title, "Core");
        assert_eq!(root.children[0].children.len(), 2);
        assert_eq!(
            root.children[0].children[0].url.as_deref(),
            Some("src/engine.rs")
        );
        assert_eq!(root.children[1].title, "Extras");
    }

    #[test]
    fn prose_lines_are_ignored() {
        let text = "intro text\n# Only\nmore prose\n";
        let root = parse_mind_map(text, "repo");
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn skipped_levels_attach_to_nearest_ancestor() {
        let text = "# Top\n### Deep:a/b.rs\n";
        let root = parse_mind_map(text, "repo");
        assert_eq!(root.children[0].children[0].title, "Deep");
    }
}
