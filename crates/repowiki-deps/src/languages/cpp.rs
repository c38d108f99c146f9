//! C / C++ text parser

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::parser::{
    balanced_block, extract_call_idents, line_of_offset, next_brace, FunctionInfo, LanguageParser,
};

const KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "sizeof", "defined", "static_cast",
    "dynamic_cast", "reinterpret_cast", "const_cast", "new", "delete",
];

pub struct CppParser;

impl CppParser {
    fn include_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        // Only quoted includes are project files; angle includes are system.
        RE.get_or_init(|| Regex::new(r#"(?m)^\s*#\s*include\s+"([^"]+)""#).unwrap())
    }

    fn function_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(
                r"(?m)^[A-Za-z_][\w:<>,*&\s]*?\b([A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:const\s*)?(?:noexcept\s*)?\{",
            )
            .unwrap()
        })
    }
}

impl LanguageParser for CppParser {
    fn extensions(&self) -> &[&str] {
        &["c", "h", "cpp", "hpp", "cc", "hh", "cxx"]
    }

    fn extract_imports(&self, source: &str) -> Vec<String> {
        Self::include_re()
            .captures_iter(source)
            .map(|cap| cap[1].to_string())
            .collect()
    }

    fn extract_functions(&self, source: &str) -> Vec<FunctionInfo> {
        let mut out: Vec<FunctionInfo> = Vec::new();
        for cap in Self::function_re().captures_iter(source) {
            let whole = cap.get(0).unwrap();
            let name = cap[1].to_string();
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

    fn resolve_import(&self, import: &str, current_file: &Path, root: &Path) -> Option<PathBuf> {
        let relative = current_file.parent()?.join(import);
        if relative.is_file() {
            return Some(relative);
        }
        let from_root = root.join(import);
        if from_root.is_file() {
            return Some(from_root);
        }
        for dir in ["include", "src"] {
            let candidate = root.join(dir).join(import);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}
