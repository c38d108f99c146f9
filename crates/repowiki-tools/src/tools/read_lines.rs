//! File tool — line-ranged reads for files too large to return whole

use crate::compress::{compress, is_code_extension};
use crate::context::AccessLog;
use crate::registry::{Tool, ToolResult};
use crate::tools::resolve_path;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Individual lines are truncated, not wrapped.
pub const MAX_LINE_CHARS: usize = 2000;

pub const NO_CONTENT: &str = "no content";

pub struct ReadLinesTool {
    working_root: PathBuf,
    compress_code: bool,
    access_log: AccessLog,
}

impl ReadLinesTool {
    pub fn new(working_root: impl AsRef<Path>, compress_code: bool, access_log: AccessLog) -> Self {
        Self {
            working_root: working_root.as_ref().to_path_buf(),
            compress_code,
            access_log,
        }
    }

    async fn read_item(&self, path: &str, offset: i64, limit: i64) -> String {
        let (resolved, rel) = match resolve_path(&self.working_root, path) {
            Ok(r) => r,
            Err(_) => return "File not found".to_string(),
        };
        let content = match fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(_) => return "File not found".to_string(),
        };
        self.access_log.record(rel);

        let ext = resolved
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let content = if self.compress_code && is_code_extension(ext) {
            compress(&content, ext)
        } else {
            content
        };

        let lines: Vec<&str> = content.lines().collect();

        // offset < 0 and limit < 0 reads the whole file; limit < 0 alone
        // reads to the end.
        let (start, end) = if offset < 0 && limit < 0 {
            (0, lines.len())
        } else {
            let start = offset.max(0) as usize;
            if start >= lines.len() {
                return NO_CONTENT.to_string();
            }
            let end = if limit < 0 {
                lines.len()
            } else {
                (start + limit as usize).min(lines.len())
            };
            (start, end)
        };

        let mut out = String::new();
        for (i, line) in lines[start..end].iter().enumerate() {
            let line: String = line.chars().take(MAX_LINE_CHARS).collect();
            out.push_str(&format!("{}: {}\n", start + i + 1, line));
        }
        out
    }
}

#[async_trait::async_trait]
impl Tool for ReadLinesTool {
    fn name(&self) -> &str {
        "File"
    }

    fn description(&self) -> &str {
        "Read specific line ranges from files. Each item reads lines \
         [offset, offset+limit) with 1-based line number prefixes. Use \
         negative offset and limit to read an entire file, negative limit \
         to read to the end."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "filePath": { "type": "string" },
                            "offset": { "type": "integer", "description": "0-based start line" },
                            "limit": { "type": "integer", "description": "Number of lines" }
                        },
                        "required": ["filePath", "offset", "limit"]
                    }
                }
            },
            "required": ["items"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let items = match args["items"].as_array() {
            Some(i) => i,
            None => return ToolResult::error("Missing required parameter: items"),
        };

        let mut out = Map::new();
        for item in items {
            let path = match item["filePath"].as_str() {
                Some(p) => p,
                None => continue,
            };
            let offset = item["offset"].as_i64().unwrap_or(0);
            let limit = item["limit"].as_i64().unwrap_or(-1);
            let rendered = self.read_item(path, offset, limit).await;
            out.insert(path.to_string(), Value::String(rendered));
        }
        ToolResult::Json(Value::Object(out))
    }
}
