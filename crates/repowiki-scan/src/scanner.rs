//! Working-tree scanner — deterministic, gitignore-aware path enumeration

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::ignore::IgnoreRules;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid root: {0}")]
    InvalidRoot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    Dir,
}

/// One entry of the scan: a relative `/`-separated path and its kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub path: String,
    pub kind: PathKind,
}

impl PathInfo {
    pub fn is_file(&self) -> bool {
        self.kind == PathKind::File
    }
}

/// Enumerate the working tree depth-first, lexically ordered per directory,
/// honoring the root `.gitignore`. The `.git` metadata directory is always
/// skipped.
pub fn scan(root: &Path) -> Result<Vec<PathInfo>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::InvalidRoot(root.display().to_string()));
    }
    let rules = IgnoreRules::load(root);
    scan_with_rules(root, &rules)
}

pub fn scan_with_rules(root: &Path, rules: &IgnoreRules) -> Result<Vec<PathInfo>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::InvalidRoot(root.display().to_string()));
    }

    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("scan: skipping unreadable entry: {}", e);
                continue;
            }
        };
        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let rel_str = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let is_dir = entry.file_type().is_dir();
        if rules.is_ignored(&rel_str, is_dir) {
            continue;
        }
        out.push(PathInfo {
            path: rel_str,
            kind: if is_dir { PathKind::Dir } else { PathKind::File },
        });
    }

    Ok(out)
}

/// Number of files (not directories) in a scan result — the smart-filter
/// threshold counts files only.
pub fn file_count(paths: &[PathInfo]) -> usize {
    paths.iter().filter(|p| p.is_file()).count()
}
