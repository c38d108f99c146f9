//! Go text parser

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::parser::{
    balanced_block, extract_call_idents, line_of_offset, next_brace, FunctionInfo, LanguageParser,
};

const KEYWORDS: &[&str] = &[
    "if", "for", "switch", "select", "return", "defer", "go", "make", "new", "len", "cap",
    "append", "copy", "panic", "recover", "close", "delete", "func",
];

pub struct GoParser;

impl GoParser {
    fn import_single_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r#"(?m)^\s*import\s+(?:\w+\s+)?"([^"]+)""#).unwrap())
    }

    fn import_block_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"(?s)import\s*\(([^)]*)\)").unwrap())
    }

    fn import_line_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r#"(?m)^\s*(?:\w+\s+)?"([^"]+)""#).unwrap())
    }

    fn func_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"(?m)^func\s+(?:\([^)]*\)\s*)?(\w+)\s*\(").unwrap())
    }
}

impl LanguageParser for GoParser {
    fn extensions(&self) -> &[&str] {
        &["go"]
    }

    fn extract_imports(&self, source: &str) -> Vec<String> {
        let mut out: Vec<String> = Self::import_single_re()
            .captures_iter(source)
            .map(|cap| cap[1].to_string())
            .collect();
        for block in Self::import_block_re().captures_iter(source) {
            for line in Self::import_line_re().captures_iter(&block[1]) {
                let target = line[1].to_string();
                if !out.contains(&target) {
                    out.push(target);
                }
            }
        }
        out
    }

    fn extract_functions(&self, source: &str) -> Vec<FunctionInfo> {
        let mut out = Vec::new();
        for cap in Self::func_re().captures_iter(source) {
            let whole = cap.get(0).unwrap();
            let body = next_brace(source, whole.end())
                .map(|open| balanced_block(source, open).to_string())
                .unwrap_or_default();
            out.push(FunctionInfo {
                name: cap[1].to_string(),
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
        // Module-qualified paths: drop the domain-bearing prefix, then probe
        // the package directory under the root. A package resolves to its
        // lexically first .go file.
        let mut segments: Vec<&str> = import.split('/').collect();
        if segments
            .first()
            .is_some_and(|first| first.contains('.'))
        {
            segments.remove(0);
            // The module name segment follows the domain.
            if !segments.is_empty() && !root.join(segments[0]).is_dir() {
                segments.remove(0);
            }
        }
        if segments.is_empty() {
            return None;
        }
        let dir = segments.iter().fold(root.to_path_buf(), |p, s| p.join(s));
        if !dir.is_dir() {
            return None;
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().and_then(|e| e.to_str()) == Some("go")
                    && !p
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with("_test.go"))
            })
            .collect();
        files.sort();
        files.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_cover_single_and_block() {
        let src = "package main\n\nimport \"fmt\"\n\nimport (\n\t\"os\"\n\tlog \"github.com/acme/app/internal/log\"\n)\n";
        let imports = GoParser.extract_imports(src);
        assert!(imports.contains(&"fmt".to_string()));
        assert!(imports.contains(&"os".to_string()));
        assert!(imports.contains(&"github.com/acme/app/internal/log".to_string()));
    }

    #[test]
    fn methods_and_functions() {
        let src = "func Run() {\n\tstep()\n}\n\nfunc (s *Server) Start() {\n\ts.listen()\n}\n";
        let funcs = GoParser.extract_functions(src);
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].name, "Run");
        assert_eq!(funcs[1].name, "Start");
        assert!(funcs[1].body.contains("listen"));
    }
}
