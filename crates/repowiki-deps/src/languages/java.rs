//! Java text parser

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::parser::{
    balanced_block, extract_call_idents, line_of_offset, next_brace, FunctionInfo, LanguageParser,
};

const KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "super", "this", "synchronized",
    "assert",
];

pub struct JavaParser;

impl JavaParser {
    fn import_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([\w.]+?)(?:\.\*)?\s*;").unwrap()
        })
    }

    fn method_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(
                r"(?m)^\s*(?:(?:public|protected|private|static|final|synchronized|abstract|native)\s+)*[\w<>\[\],.\s]+?\s+(\w+)\s*\([^;{}]*\)\s*(?:throws\s+[\w,.\s]+)?\{",
            )
            .unwrap()
        })
    }
}

impl LanguageParser for JavaParser {
    fn extensions(&self) -> &[&str] {
        &["java"]
    }

    fn extract_imports(&self, source: &str) -> Vec<String> {
        Self::import_re()
            .captures_iter(source)
            .map(|cap| cap[1].to_string())
            .collect()
    }

    fn extract_functions(&self, source: &str) -> Vec<FunctionInfo> {
        let mut out: Vec<FunctionInfo> = Vec::new();
        for cap in Self::method_re().captures_iter(source) {
            let whole = cap.get(0).unwrap();
            let name = cap[1].to_string();
            // Control-flow statements look like methods to the regex.
            if KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            let body = next_brace(source, whole.start())
                .map(|open| balanced_block(source, open).to_string())
                .unwrap_or_default();
            out.push(FunctionInfo {
                name,
                body,
                line: line_of_offset(source, whole.start()),
            });
        }
        out
    }

    fn extract_calls(&self, body: &str) -> Vec<String> {
        extract_call_idents(body, KEYWORDS)
    }

    fn resolve_import(&self, import: &str, _current_file: &Path, root: &Path) -> Option<PathBuf> {
        let relative: PathBuf = import.split('.').collect();
        let relative = relative.with_extension("java");
        for prefix in ["", "src/main/java", "src", "app/src/main/java"] {
            let candidate = if prefix.is_empty() {
                root.join(&relative)
            } else {
                root.join(prefix).join(&relative)
            };
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}
