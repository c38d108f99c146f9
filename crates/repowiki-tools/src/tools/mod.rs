//! Individual tool implementations.
//!
//! Each tool is a self-contained module. To add a new tool:
//! 1. Create a new file in this directory
//! 2. Implement the Tool trait
//! 3. Add `pub mod <name>;` here
//! 4. Register it in create_registry() in ../lib.rs

pub mod deps;
pub mod file_info;
pub mod read;
pub mod read_lines;
pub mod tree;

use std::path::{Path, PathBuf};

/// Resolve a model-supplied path against the working tree, refusing
/// escapes. Returns the absolute path and the normalized relative form.
pub(crate) fn resolve_path(root: &Path, path: &str) -> Result<(PathBuf, String), String> {
    let trimmed = path.trim().trim_start_matches('/');
    let joined = root.join(trimmed);
    let resolved = joined.canonicalize().unwrap_or(joined);
    let canon_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    if !resolved.starts_with(&canon_root) {
        return Err(format!("Path escapes the working tree: {}", path));
    }
    let rel = resolved
        .strip_prefix(&canon_root)
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_else(|_| trimmed.to_string());
    Ok((resolved, rel))
}
