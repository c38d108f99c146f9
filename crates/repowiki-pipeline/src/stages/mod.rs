//! Stage runners, one module per pipeline stage.
//!
//! Every stage is safely re-invokable: its skip rule combined with its
//! persistence contract (pass-through, delete-then-insert, or per-node
//! upsert) makes re-entry after a crash resume correctly.

pub mod catalogue;
pub mod changelog;
pub mod classify;
pub mod mindmap;
pub mod overview;
pub mod per_doc;
pub mod readme;
pub mod think;

use std::path::Path;

use repowiki_core::config::CatalogueFormat;
use repowiki_scan::{scan, FileTree};

use crate::error::{StageError, StageResult};

/// Render the raw (unfiltered) manifest of a working tree in the
/// configured format, along with the scanned file count.
pub fn raw_manifest(root: &Path, format: CatalogueFormat) -> StageResult<(String, usize)> {
    let paths =
        scan(root).map_err(|e| StageError::failed("scan", e.to_string()))?;
    let count = repowiki_scan::scanner::file_count(&paths);
    let tree = FileTree::build(&paths);
    let rendered = match format {
        CatalogueFormat::Compact => tree.compact(),
        CatalogueFormat::Json => tree.to_json(),
        CatalogueFormat::Pathlist => tree.to_pathlist(),
    };
    Ok((rendered, count))
}

/// Locate an existing README in the working tree root.
pub fn find_readme(root: &Path) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "README.md",
        "README.MD",
        "readme.md",
        "Readme.md",
        "README",
        "README.rst",
        "README.txt",
    ];
    for name in CANDIDATES {
        let path = root.join(name);
        if let Ok(content) = std::fs::read_to_string(&path) {
            if !content.trim().is_empty() {
                return Some(content);
            }
        }
    }
    None
}

/// Url slug from a display title: lowercase, alphanumerics kept, runs of
/// anything else collapsed to single dashes.
pub fn slugify(title: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "item".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("API / Reference!"), "api-reference");
        assert_eq!(slugify("???"), "item");
    }
}
