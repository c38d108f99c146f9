//! Dependency analysis tools — JSON-serialized dependency trees

use crate::registry::{Tool, ToolResult};
use repowiki_deps::DependencyAnalyzer;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct FileDependencyTool {
    analyzer: Arc<DependencyAnalyzer>,
}

impl FileDependencyTool {
    pub fn new(analyzer: Arc<DependencyAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait::async_trait]
impl Tool for FileDependencyTool {
    fn name(&self) -> &str {
        "AnalyzeFileDependencyTree"
    }

    fn description(&self) -> &str {
        "Analyze which files a given source file depends on (through its \
         imports), recursively. Returns a JSON tree with cycle markers."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "Repository-relative source file path"
                }
            },
            "required": ["filePath"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let path = match args["filePath"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: filePath"),
        };
        let key = self.analyzer.key_for(path);
        match self.analyzer.analyze_file_dependency_tree(&key).await {
            Ok(tree) => match serde_json::to_value(&tree) {
                Ok(v) => ToolResult::Json(v),
                Err(e) => ToolResult::error(format!("Serialization failed: {}", e)),
            },
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct FunctionDependencyTool {
    analyzer: Arc<DependencyAnalyzer>,
}

impl FunctionDependencyTool {
    pub fn new(analyzer: Arc<DependencyAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait::async_trait]
impl Tool for FunctionDependencyTool {
    fn name(&self) -> &str {
        "AnalyzeFunctionDependencyTree"
    }

    fn description(&self) -> &str {
        "Analyze the call graph reachable from one function. Returns a JSON \
         tree of callees with cycle markers."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "Repository-relative source file path"
                },
                "functionName": {
                    "type": "string",
                    "description": "Function defined in that file"
                }
            },
            "required": ["filePath", "functionName"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let path = match args["filePath"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: filePath"),
        };
        let function = match args["functionName"].as_str() {
            Some(f) => f,
            None => return ToolResult::error("Missing required parameter: functionName"),
        };
        let key = self.analyzer.key_for(path);
        match self
            .analyzer
            .analyze_function_dependency_tree(&key, function)
            .await
        {
            Ok(tree) => match serde_json::to_value(&tree) {
                Ok(v) => ToolResult::Json(v),
                Err(e) => ToolResult::error(format!("Serialization failed: {}", e)),
            },
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
