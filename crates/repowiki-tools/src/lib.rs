//! Repowiki Tools — filesystem and dependency-graph tools for the kernel
//!
//! Each tool is a self-contained file in src/tools/. To add a tool: create
//! the file, implement the Tool trait, register it below.

pub mod compress;
pub mod context;
pub mod registry;
pub mod tools;

pub use context::AccessLog;
pub use registry::{Tool, ToolRegistry, ToolResult};

use repowiki_core::config::CatalogueFormat;
use repowiki_deps::DependencyAnalyzer;
use std::path::Path;
use std::sync::Arc;

/// Options controlling which tools get registered and how they behave.
pub struct ToolOptions {
    pub catalogue_format: CatalogueFormat,
    pub compress_code: bool,
    /// Register the dependency-graph tools. Callers gate this on both the
    /// per-invocation plugin flag and the global analysis flag.
    pub dependency_analysis: bool,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            catalogue_format: CatalogueFormat::Compact,
            compress_code: false,
            dependency_analysis: false,
        }
    }
}

/// Create the tool registry for one kernel invocation scope.
pub fn create_registry(
    working_root: impl AsRef<Path>,
    options: &ToolOptions,
    access_log: AccessLog,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = working_root.as_ref();

    registry.register(tools::tree::GetTreeTool::new(root, options.catalogue_format));
    registry.register(tools::file_info::FileInfoTool::new(root));
    registry.register(tools::read::ReadFileTool::new(
        root,
        options.compress_code,
        access_log.clone(),
    ));
    registry.register(tools::read::ReadFilesTool::new(
        root,
        options.compress_code,
        access_log.clone(),
    ));
    registry.register(tools::read_lines::ReadLinesTool::new(
        root,
        options.compress_code,
        access_log.clone(),
    ));

    if options.dependency_analysis {
        let analyzer = Arc::new(DependencyAnalyzer::new(root));
        registry.register(tools::deps::FileDependencyTool::new(analyzer.clone()));
        registry.register(tools::deps::FunctionDependencyTool::new(analyzer));
    }

    registry
}
