//! JavaScript / TypeScript text parser

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::parser::{
    balanced_block, extract_call_idents, line_of_offset, next_brace, FunctionInfo, LanguageParser,
};

const KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "typeof", "new", "await",
    "import", "require", "super", "constructor",
];

pub struct JsParser;

impl JsParser {
    fn import_res() -> &'static [Regex; 3] {
        static RES: OnceLock<[Regex; 3]> = OnceLock::new();
        RES.get_or_init(|| {
            [
                Regex::new(r#"(?m)^\s*import\s+(?:[^'"]+\s+from\s+)?['"]([^'"]+)['"]"#).unwrap(),
                Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
                Regex::new(r#"(?m)^\s*export\s+[^'"]+\s+from\s+['"]([^'"]+)['"]"#).unwrap(),
            ]
        })
    }

    fn function_res() -> &'static [Regex; 2] {
        static RES: OnceLock<[Regex; 2]> = OnceLock::new();
        RES.get_or_init(|| {
            [
                Regex::new(
                    r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*\(",
                )
                .unwrap(),
                Regex::new(
                    r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s*)?(?:function\b|\([^)]*\)\s*=>)",
                )
                .unwrap(),
            ]
        })
    }
}

impl LanguageParser for JsParser {
    fn extensions(&self) -> &[&str] {
        &["js", "jsx", "ts", "tsx", "mjs", "cjs"]
    }

    fn extract_imports(&self, source: &str) -> Vec<String> {
        let mut out = Vec::new();
        for re in Self::import_res() {
            for cap in re.captures_iter(source) {
                let target = cap[1].to_string();
                if !out.contains(&target) {
                    out.push(target);
                }
            }
        }
        out
    }

    fn extract_functions(&self, source: &str) -> Vec<FunctionInfo> {
        let mut out: Vec<FunctionInfo> = Vec::new();
        for re in Self::function_res() {
            for cap in re.captures_iter(source) {
                let whole = cap.get(0).unwrap();
                let name = cap[1].to_string();
                if out.iter().any(|f| f.name == name) {
                    continue;
                }
                let body = next_brace(source, whole.end())
                    .map(|open| balanced_block(source, open).to_string())
                    .unwrap_or_default();
                out.push(FunctionInfo {
                    name,
                    body,
                    line: line_of_offset(source, whole.start()),
                });
            }
        }
        out.sort_by_key(|f| f.line);
        out
    }

    fn extract_calls(&self, body: &str) -> Vec<String> {
        extract_call_idents(body, KEYWORDS)
    }

    fn resolve_import(&self, import: &str, current_file: &Path, root: &Path) -> Option<PathBuf> {
        // Bare specifiers are packages, not project files.
        if !import.starts_with('.') && !import.starts_with('/') {
            return None;
        }
        let base = if let Some(rest) = import.strip_prefix('/') {
            root.join(rest)
        } else {
            current_file.parent()?.join(import)
        };

        if base.is_file() {
            return Some(base);
        }
        for ext in self.extensions() {
            let candidate = base.with_extension(ext);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        for index in ["index.js", "index.ts", "index.jsx", "index.tsx"] {
            let candidate = base.join(index);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_cover_esm_and_cjs() {
        let src = r#"
import { a } from './util';
import './side-effect';
const fs = require('fs');
export { b } from './other';
"#;
        let imports = JsParser.extract_imports(src);
        assert!(imports.contains(&"./util".to_string()));
        assert!(imports.contains(&"./side-effect".to_string()));
        assert!(imports.contains(&"fs".to_string()));
        assert!(imports.contains(&"./other".to_string()));
    }

    #[test]
    fn functions_carry_line_and_body() {
        let src = "const x = 1;\nfunction greet(name) {\n  return hello(name);\n}\n";
        let funcs = JsParser.extract_functions(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "greet");
        assert_eq!(funcs[0].line, 2);
        assert!(funcs[0].body.contains("hello(name)"));
    }

    #[test]
    fn calls_skip_keywords() {
        let calls = JsParser.extract_calls("if (x) { doWork(); for (;;) other(); }");
        assert_eq!(calls, vec!["doWork", "other"]);
    }
}
