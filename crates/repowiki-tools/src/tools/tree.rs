//! GetTree tool — compact rendering of the working tree

use crate::registry::{Tool, ToolResult};
use repowiki_core::config::CatalogueFormat;
use repowiki_scan::{scan, FileTree};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct GetTreeTool {
    working_root: PathBuf,
    format: CatalogueFormat,
}

impl GetTreeTool {
    pub fn new(working_root: impl AsRef<Path>, format: CatalogueFormat) -> Self {
        Self {
            working_root: working_root.as_ref().to_path_buf(),
            format,
        }
    }
}

#[async_trait::async_trait]
impl Tool for GetTreeTool {
    fn name(&self) -> &str {
        "GetTree"
    }

    fn description(&self) -> &str {
        "Get the directory structure of the repository as a compact listing. \
         Ignored files (per .gitignore) are excluded."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value) -> ToolResult {
        let root = self.working_root.clone();
        let format = self.format;
        let rendered = tokio::task::spawn_blocking(move || {
            let paths = scan(&root)?;
            let tree = FileTree::build(&paths);
            Ok::<_, repowiki_scan::ScanError>(match format {
                CatalogueFormat::Compact => tree.compact(),
                CatalogueFormat::Json => tree.to_json(),
                CatalogueFormat::Pathlist => tree.to_pathlist(),
            })
        })
        .await;

        match rendered {
            Ok(Ok(text)) => {
                debug!("GetTree: {} chars", text.len());
                ToolResult::text(text)
            }
            Ok(Err(e)) => ToolResult::error(format!("Failed to scan working tree: {}", e)),
            Err(e) => ToolResult::error(format!("Scan task failed: {}", e)),
        }
    }
}
