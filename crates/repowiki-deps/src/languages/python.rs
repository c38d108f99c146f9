//! Python text parser

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::parser::{extract_call_idents, FunctionInfo, LanguageParser};

const KEYWORDS: &[&str] = &[
    "if", "for", "while", "print", "len", "range", "isinstance", "super", "str", "int", "float",
    "list", "dict", "set", "tuple", "type", "return",
];

pub struct PythonParser;

impl PythonParser {
    fn import_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"(?m)^\s*(?:from\s+([.\w]+)\s+import|import\s+([.\w]+))").unwrap()
        })
    }

    fn def_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"(?m)^([ \t]*)(?:async\s+)?def\s+(\w+)\s*\(").unwrap())
    }
}

impl LanguageParser for PythonParser {
    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn extract_imports(&self, source: &str) -> Vec<String> {
        let mut out = Vec::new();
        for cap in Self::import_re().captures_iter(source) {
            let target = cap
                .get(1)
                .or_else(|| cap.get(2))
                .map(|m| m.as_str().to_string());
            if let Some(target) = target {
                if !out.contains(&target) {
                    out.push(target);
                }
            }
        }
        out
    }

    fn extract_functions(&self, source: &str) -> Vec<FunctionInfo> {
        let lines: Vec<&str> = source.lines().collect();
        let mut out = Vec::new();
        for cap in Self::def_re().captures_iter(source) {
            let whole = cap.get(0).unwrap();
            let indent = cap[1].len();
            let name = cap[2].to_string();
            let line = crate::parser::line_of_offset(source, whole.start());

            // Body runs until the first non-blank line at or below the
            // definition's indent.
            let mut body = String::new();
            for l in lines.iter().skip(line) {
                let trimmed = l.trim_end();
                if !trimmed.trim().is_empty() {
                    let l_indent = l.len() - l.trim_start().len();
                    if l_indent <= indent {
                        break;
                    }
                }
                body.push_str(l);
                body.push('\n');
            }
            out.push(FunctionInfo { name, body, line });
        }
        out
    }

    fn extract_calls(&self, body: &str) -> Vec<String> {
        extract_call_idents(body, KEYWORDS)
    }

    fn resolve_import(&self, import: &str, current_file: &Path, root: &Path) -> Option<PathBuf> {
        let dots = import.chars().take_while(|&c| c == '.').count();
        let rest = &import[dots..];
        let base: PathBuf = if dots > 0 {
            // One dot is the current package, each further dot walks up.
            let mut dir = current_file.parent()?.to_path_buf();
            for _ in 1..dots {
                dir = dir.parent()?.to_path_buf();
            }
            dir
        } else {
            root.to_path_buf()
        };

        let mut path = base;
        for segment in rest.split('.').filter(|s| !s.is_empty()) {
            path = path.join(segment);
        }

        let module = path.with_extension("py");
        if module.is_file() {
            return Some(module);
        }
        let package = path.join("__init__.py");
        if package.is_file() {
            return Some(package);
        }
        None
    }
}
