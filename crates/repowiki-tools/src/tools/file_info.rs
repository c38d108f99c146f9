//! FileInfo tool — batched file metadata

use crate::registry::{Tool, ToolResult};
use crate::tools::resolve_path;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FileInfoTool {
    working_root: PathBuf,
}

impl FileInfoTool {
    pub fn new(working_root: impl AsRef<Path>) -> Self {
        Self {
            working_root: working_root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FileInfoTool {
    fn name(&self) -> &str {
        "FileInfo"
    }

    fn description(&self) -> &str {
        "Get basic information (name, size in bytes, extension, line count) \
         for a batch of files. Check sizes before reading large files."
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

        // The model frequently repeats paths in a batch.
        let mut deduped: Vec<&str> = Vec::new();
        for p in paths.iter().filter_map(|v| v.as_str()) {
            if !deduped.contains(&p) {
                deduped.push(p);
            }
        }

        let mut out = Map::new();
        for path in deduped {
            out.insert(path.to_string(), self.info_for(path).await);
        }
        ToolResult::Json(Value::Object(out))
    }
}

impl FileInfoTool {
    async fn info_for(&self, path: &str) -> Value {
        let (resolved, _) = match resolve_path(&self.working_root, path) {
            Ok(r) => r,
            Err(_) => return Value::String("File not found".to_string()),
        };
        let meta = match fs::metadata(&resolved).await {
            Ok(m) if m.is_file() => m,
            _ => return Value::String("File not found".to_string()),
        };
        let bytes = fs::read(&resolved).await.unwrap_or_default();
        let lines = String::from_utf8_lossy(&bytes).lines().count();
        json!({
            "name": resolved.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
            "size": meta.len(),
            "extension": resolved.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default(),
            "lines": lines,
        })
    }
}
