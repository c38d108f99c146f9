//! Repowiki Deps - language-aware file and function dependency analysis

pub mod analyzer;
pub mod languages;
pub mod parser;
pub mod viz;

pub use analyzer::{DependencyAnalyzer, DependencyTreeNode, FunctionNode, FunctionRef};
pub use parser::{
    FileModel, FunctionInfo, LanguageParser, ProjectModel, SemanticAnalyzer, TypeModel,
};
