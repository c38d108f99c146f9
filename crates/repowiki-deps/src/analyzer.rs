//! Dependency analyzer — per-file and per-function dependency trees
//!
//! First use runs an initialize pass: enumerate source files (gitignore
//! aware), hand semantic-analyzable files to their analyzers and the rest
//! to text parsers in parallel, then merge everything into three maps:
//! file → functions, file → dependency files, "file:func" → file.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use repowiki_scan::ignore::IgnoreRules;
use repowiki_scan::scanner::{scan_with_rules, ScanError};

use crate::languages::default_parsers;
use crate::parser::{extract_call_idents, FunctionInfo, LanguageParser, SemanticAnalyzer};

pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("unknown file: {0}")]
    UnknownFile(String),

    #[error("unknown function: {0} in {1}")]
    UnknownFunction(String, String),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// A function reference inside a dependency tree node.
#[derive(Clone, Debug, Serialize)]
pub struct FunctionRef {
    pub name: String,
    pub line: usize,
}

/// One node of a file dependency tree.
#[derive(Clone, Debug, Serialize)]
pub struct DependencyTreeNode {
    pub name: String,
    pub is_cyclic: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DependencyTreeNode>,
}

/// One node of a function call tree.
#[derive(Clone, Debug, Serialize)]
pub struct FunctionNode {
    pub name: String,
    pub file: String,
    pub is_cyclic: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FunctionNode>,
}

pub struct DependencyAnalyzer {
    root: PathBuf,
    parsers: Vec<Arc<dyn LanguageParser>>,
    semantic: Vec<Arc<dyn SemanticAnalyzer>>,
    max_depth: usize,
    init: tokio::sync::OnceCell<()>,
    file_functions: DashMap<String, Vec<FunctionInfo>>,
    file_dependencies: DashMap<String, BTreeSet<String>>,
    /// "file:func" → file, for global callee resolution.
    function_locations: DashMap<String, String>,
}

impl DependencyAnalyzer {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            parsers: default_parsers(),
            semantic: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            init: tokio::sync::OnceCell::new(),
            file_functions: DashMap::new(),
            file_dependencies: DashMap::new(),
            function_locations: DashMap::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Register a whole-project analyzer. Must be called before first use.
    pub fn register_semantic(mut self, analyzer: Arc<dyn SemanticAnalyzer>) -> Self {
        self.semantic.push(analyzer);
        self
    }

    fn parser_for(&self, ext: &str) -> Option<Arc<dyn LanguageParser>> {
        self.parsers
            .iter()
            .find(|p| p.extensions().contains(&ext))
            .cloned()
    }

    fn semantic_for(&self, ext: &str) -> Option<Arc<dyn SemanticAnalyzer>> {
        self.semantic
            .iter()
            .find(|a| a.claims_extension(ext))
            .cloned()
    }

    fn normalize(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        Some(
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }

    async fn ensure_initialized(&self) -> Result<(), AnalyzeError> {
        self.init
            .get_or_try_init(|| self.initialize())
            .await
            .map(|_| ())
    }

    async fn initialize(&self) -> Result<(), AnalyzeError> {
        let rules = IgnoreRules::load(&self.root);
        let paths = scan_with_rules(&self.root, &rules)?;

        // Partition source files: semantic analyzers win for extensions
        // they claim.
        let mut semantic_files: Vec<Vec<PathBuf>> = vec![Vec::new(); self.semantic.len()];
        let mut text_files: Vec<(String, PathBuf, Arc<dyn LanguageParser>)> = Vec::new();
        for info in paths.iter().filter(|p| p.is_file()) {
            let abs = self.root.join(&info.path);
            let ext = match abs.extension().and_then(|e| e.to_str()) {
                Some(e) => e.to_ascii_lowercase(),
                None => continue,
            };
            if let Some(idx) = self.semantic.iter().position(|a| a.claims_extension(&ext)) {
                semantic_files[idx].push(abs);
            } else if let Some(parser) = self.parser_for(&ext) {
                text_files.push((info.path.clone(), abs, parser));
            }
        }

        // Fan out: one task per text file, one per semantic analyzer.
        let mut tasks: JoinSet<Option<(String, Vec<FunctionInfo>, BTreeSet<String>)>> =
            JoinSet::new();
        for (rel, abs, parser) in text_files {
            let root = self.root.clone();
            tasks.spawn(async move {
                let source = match tokio::fs::read_to_string(&abs).await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("analyzer: skipping unreadable {}: {}", rel, e);
                        return None;
                    }
                };
                let functions = parser.extract_functions(&source);
                let mut deps = BTreeSet::new();
                for import in parser.extract_imports(&source) {
                    if let Some(resolved) = parser.resolve_import(&import, &abs, &root) {
                        if let Ok(stripped) = resolved.strip_prefix(&root) {
                            deps.insert(
                                stripped
                                    .components()
                                    .map(|c| c.as_os_str().to_string_lossy())
                                    .collect::<Vec<_>>()
                                    .join("/"),
                            );
                        }
                    }
                }
                // A file does not depend on itself.
                deps.remove(&rel);
                Some((rel, functions, deps))
            });
        }

        let mut semantic_tasks: JoinSet<Option<crate::parser::ProjectModel>> = JoinSet::new();
        for (idx, files) in semantic_files.into_iter().enumerate() {
            if files.is_empty() {
                continue;
            }
            let analyzer = self.semantic[idx].clone();
            let root = self.root.clone();
            semantic_tasks.spawn(async move {
                match analyzer.analyze_project(&files, &root).await {
                    Ok(model) => Some(model),
                    Err(e) => {
                        warn!("semantic analyzer failed: {}", e);
                        None
                    }
                }
            });
        }

        // Fan in: merge into the traditional maps.
        while let Some(joined) = tasks.join_next().await {
            let Ok(Some((rel, functions, deps))) = joined else {
                continue;
            };
            for f in &functions {
                self.function_locations
                    .insert(format!("{}:{}", rel, f.name), rel.clone());
            }
            self.file_functions.insert(rel.clone(), functions);
            self.file_dependencies.insert(rel, deps);
        }
        while let Some(joined) = semantic_tasks.join_next().await {
            let Ok(Some(model)) = joined else { continue };
            for (file, file_model) in model.files {
                let mut functions = file_model.functions;
                for type_model in file_model.types.into_values() {
                    functions.extend(type_model.methods);
                }
                for f in &functions {
                    self.function_locations
                        .insert(format!("{}:{}", file, f.name), file.clone());
                }
                self.file_functions.insert(file, functions);
            }
            for (file, deps) in model.dependencies {
                self.file_dependencies
                    .entry(file)
                    .or_default()
                    .extend(deps);
            }
        }

        debug!(
            files = self.file_functions.len(),
            "dependency analyzer initialized"
        );
        Ok(())
    }

    /// File-level dependency tree rooted at `file` (root-relative path).
    pub async fn analyze_file_dependency_tree(
        &self,
        file: &str,
    ) -> Result<DependencyTreeNode, AnalyzeError> {
        self.ensure_initialized().await?;
        if !self.file_functions.contains_key(file) && !self.file_dependencies.contains_key(file) {
            return Err(AnalyzeError::UnknownFile(file.to_string()));
        }
        Ok(self.file_dfs(file, &HashSet::new(), 0))
    }

    fn file_dfs(&self, file: &str, visited: &HashSet<String>, depth: usize) -> DependencyTreeNode {
        if visited.contains(file) {
            return DependencyTreeNode {
                name: file.to_string(),
                is_cyclic: true,
                functions: Vec::new(),
                children: Vec::new(),
            };
        }
        let functions = self.function_refs(file);
        if depth > self.max_depth {
            // Past the depth ceiling the node is kept but not expanded.
            return DependencyTreeNode {
                name: file.to_string(),
                is_cyclic: false,
                functions,
                children: Vec::new(),
            };
        }

        // Sibling branches get independent visited sets.
        let mut branch = visited.clone();
        branch.insert(file.to_string());

        let children = self
            .file_dependencies
            .get(file)
            .map(|deps| {
                deps.iter()
                    .map(|dep| self.file_dfs(dep, &branch, depth + 1))
                    .collect()
            })
            .unwrap_or_default();

        DependencyTreeNode {
            name: file.to_string(),
            is_cyclic: false,
            functions,
            children,
        }
    }

    fn function_refs(&self, file: &str) -> Vec<FunctionRef> {
        self.file_functions
            .get(file)
            .map(|funcs| {
                funcs
                    .iter()
                    .map(|f| FunctionRef {
                        name: f.name.clone(),
                        line: f.line,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Call-graph tree rooted at `file:function`.
    pub async fn analyze_function_dependency_tree(
        &self,
        file: &str,
        function: &str,
    ) -> Result<FunctionNode, AnalyzeError> {
        self.ensure_initialized().await?;
        if !self
            .file_functions
            .get(file)
            .is_some_and(|funcs| funcs.iter().any(|f| f.name == function))
        {
            return Err(AnalyzeError::UnknownFunction(
                function.to_string(),
                file.to_string(),
            ));
        }
        Ok(self.function_dfs(file, function, &HashSet::new(), 0))
    }

    fn function_dfs(
        &self,
        file: &str,
        function: &str,
        visited: &HashSet<String>,
        depth: usize,
    ) -> FunctionNode {
        let key = format!("{}:{}", file, function);
        if visited.contains(&key) {
            // Cycles are flagged, not expanded.
            return FunctionNode {
                name: function.to_string(),
                file: file.to_string(),
                is_cyclic: true,
                children: Vec::new(),
            };
        }
        if depth > self.max_depth {
            return FunctionNode {
                name: function.to_string(),
                file: file.to_string(),
                is_cyclic: false,
                children: Vec::new(),
            };
        }

        let body = self
            .file_functions
            .get(file)
            .and_then(|funcs| {
                funcs
                    .iter()
                    .find(|f| f.name == function)
                    .map(|f| f.body.clone())
            })
            .unwrap_or_default();

        let mut branch = visited.clone();
        branch.insert(key);

        let children = self
            .calls_in(file, &body)
            .into_iter()
            .filter_map(|callee| self.resolve_callee(file, &callee))
            .map(|(callee_file, callee)| {
                self.function_dfs(&callee_file, &callee, &branch, depth + 1)
            })
            .collect();

        FunctionNode {
            name: function.to_string(),
            file: file.to_string(),
            is_cyclic: false,
            children,
        }
    }

    fn calls_in(&self, file: &str, body: &str) -> Vec<String> {
        let ext = Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match self.parser_for(&ext) {
            Some(parser) => parser.extract_calls(body),
            // Semantic-only files fall back to generic call extraction.
            None => extract_call_idents(body, &[]),
        }
    }

    /// Callee resolution order: same file, then imported files, then any
    /// file defining that name (lexically first, for determinism).
    fn resolve_callee(&self, file: &str, callee: &str) -> Option<(String, String)> {
        let defines = |candidate: &str| {
            self.file_functions
                .get(candidate)
                .is_some_and(|funcs| funcs.iter().any(|f| f.name == callee))
        };

        if defines(file) {
            return Some((file.to_string(), callee.to_string()));
        }
        if let Some(deps) = self.file_dependencies.get(file) {
            for dep in deps.iter() {
                if defines(dep) {
                    return Some((dep.clone(), callee.to_string()));
                }
            }
        }
        let suffix = format!(":{}", callee);
        let mut global: Vec<String> = self
            .function_locations
            .iter()
            .filter(|entry| entry.key().ends_with(&suffix))
            .map(|entry| entry.value().clone())
            .collect();
        global.sort();
        global
            .into_iter()
            .next()
            .map(|f| (f, callee.to_string()))
    }

    /// Normalize an absolute or root-relative path into a map key.
    pub fn key_for(&self, path: &str) -> String {
        let p = Path::new(path);
        if p.is_absolute() {
            self.normalize(p).unwrap_or_else(|| path.to_string())
        } else {
            path.replace('\\', "/")
        }
    }
}
