//! Parser capability traits and shared text helpers
//!
//! A language contributes either a text parser (regex-level extraction of
//! imports, functions, and calls) or a semantic analyzer producing a
//! whole-project model. Semantic analyzers win for extensions they claim.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A function extracted from source text.
#[derive(Clone, Debug, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    /// Body text, used for call extraction.
    #[serde(skip)]
    pub body: String,
    /// 1-based line of the definition.
    pub line: usize,
}

/// Per-extension text parser capability set.
pub trait LanguageParser: Send + Sync {
    /// Extensions this parser claims, without the leading dot.
    fn extensions(&self) -> &[&str];

    fn extract_imports(&self, source: &str) -> Vec<String>;

    fn extract_functions(&self, source: &str) -> Vec<FunctionInfo>;

    /// Identifiers invoked inside a function body.
    fn extract_calls(&self, body: &str) -> Vec<String>;

    /// Resolve an import token to an absolute file path, given the file it
    /// appears in and the project root. Unresolvable imports yield None and
    /// are ignored.
    fn resolve_import(&self, import: &str, current_file: &Path, root: &Path) -> Option<PathBuf>;
}

#[derive(Clone, Debug, Default)]
pub struct TypeModel {
    pub methods: Vec<FunctionInfo>,
}

#[derive(Clone, Debug, Default)]
pub struct FileModel {
    pub functions: Vec<FunctionInfo>,
    pub types: HashMap<String, TypeModel>,
}

/// Whole-project model produced by a semantic analyzer. Keys are
/// root-relative `/`-separated paths.
#[derive(Clone, Debug, Default)]
pub struct ProjectModel {
    pub files: HashMap<String, FileModel>,
    pub dependencies: HashMap<String, HashSet<String>>,
}

/// Whole-project analysis capability. Takes precedence over text parsers
/// for files whose extension it claims.
#[async_trait::async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    fn claims_extension(&self, ext: &str) -> bool;

    async fn analyze_project(
        &self,
        files: &[PathBuf],
        root: &Path,
    ) -> Result<ProjectModel, String>;
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of_offset(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Extract a `{ ... }` block starting at the given offset of the opening
/// brace. Returns the body including braces, or the rest of the source when
/// braces never balance.
pub(crate) fn balanced_block(source: &str, open: usize) -> &str {
    let bytes = source.as_bytes();
    if open >= bytes.len() || bytes[open] != b'{' {
        return "";
    }
    let mut depth = 0usize;
    let mut in_str: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(quote) = in_str {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                in_str = None;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => in_str = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return &source[open..=i];
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    &source[open..]
}

/// Find the offset of the next `{` at or after `from`, skipping nothing.
pub(crate) fn next_brace(source: &str, from: usize) -> Option<usize> {
    source[from.min(source.len())..]
        .find('{')
        .map(|i| from + i)
}

/// Generic call-site extraction: identifiers followed by `(`, minus the
/// given keyword set, deduplicated in first-seen order.
pub(crate) fn extract_call_idents(body: &str, keywords: &[&str]) -> Vec<String> {
    static CALL: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = CALL.get_or_init(|| regex::Regex::new(r"\b([A-Za-z_$][A-Za-z0-9_$]*)\s*\(").unwrap());
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for cap in re.captures_iter(body) {
        let name = cap[1].to_string();
        if keywords.contains(&name.as_str()) {
            continue;
        }
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}
