//! ReadFile / ReadFiles tools — whole-file reads with a size ceiling

use crate::compress::{compress, is_code_extension};
use crate::context::AccessLog;
use crate::registry::{Tool, ToolResult};
use crate::tools::resolve_path;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Whole-file reads above this size are redirected to the line-ranged
/// reader. The cutoff is exclusive: a file of exactly this size is served.
pub const MAX_READ_BYTES: u64 = 100 * 1024;

pub const NOT_FOUND: &str = "File not found";

fn too_large(size: u64) -> String {
    format!(
        "File too large ({} bytes): use the File tool with offset/limit to read line ranges",
        size
    )
}

/// Shared single-file read used by both tools. Returns a content string or
/// an in-band message — never an error the kernel would surface.
async fn read_one(
    working_root: &Path,
    path: &str,
    compress_code: bool,
    access_log: &AccessLog,
) -> String {
    let (resolved, rel) = match resolve_path(working_root, path) {
        Ok(r) => r,
        Err(_) => return NOT_FOUND.to_string(),
    };
    let meta = match fs::metadata(&resolved).await {
        Ok(m) if m.is_file() => m,
        _ => return NOT_FOUND.to_string(),
    };
    if meta.len() > MAX_READ_BYTES {
        return too_large(meta.len());
    }
    let content = match fs::read_to_string(&resolved).await {
        Ok(c) => c,
        Err(_) => return NOT_FOUND.to_string(),
    };
    access_log.record(rel);

    let ext = resolved
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if compress_code && is_code_extension(ext) {
        compress(&content, ext)
    } else {
        content
    }
}

pub struct ReadFileTool {
    working_root: PathBuf,
    compress_code: bool,
    access_log: AccessLog,
}

impl ReadFileTool {
    pub fn new(working_root: impl AsRef<Path>, compress_code: bool, access_log: AccessLog) -> Self {
        Self {
            working_root: working_root.as_ref().to_path_buf(),
            compress_code,
            access_log,
        }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "ReadFile"
    }

    fn description(&self) -> &str {
        "Read the full contents of a single file. Large files are rejected \
         with a suggestion to use the line-ranged File tool instead."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Repository-relative file path"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let path = match args["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: path"),
        };
        let content = read_one(&self.working_root, path, self.compress_code, &self.access_log).await;
        debug!("ReadFile: {} ({} chars)", path, content.len());
        ToolResult::text(content)
    }
}

pub struct ReadFilesTool {
    working_root: PathBuf,
    compress_code: bool,
    access_log: AccessLog,
}

impl ReadFilesTool {
    pub fn new(working_root: impl AsRef<Path>, compress_code: bool, access_log: AccessLog) -> Self {
        Self {
            working_root: working_root.as_ref().to_path_buf(),
            compress_code,
            access_log,
        }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFilesTool {
    fn name(&self) -> &str {
        "ReadFiles"
    }

    fn description(&self) -> &str {
        "Read the contents of several files at once. Returns a map from path \
         to content. Large files are rejected individually."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Repository-relative file paths"
                }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let paths = match args["paths"].as_array() {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: paths"),
        };

        let mut deduped: Vec<&str> = Vec::new();
        for p in paths.iter().filter_map(|v| v.as_str()) {
            if !deduped.contains(&p) {
                deduped.push(p);
            }
        }

        let mut out = Map::new();
        for path in deduped {
            let content =
                read_one(&self.working_root, path, self.compress_code, &self.access_log).await;
            out.insert(path.to_string(), Value::String(content));
        }
        ToolResult::Json(Value::Object(out))
    }
}
