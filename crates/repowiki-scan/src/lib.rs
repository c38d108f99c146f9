//! Repowiki Scan - gitignore-aware path scanning and tree compaction

pub mod ignore;
pub mod scanner;
pub mod tree;

pub use ignore::IgnoreRules;
pub use scanner::{scan, PathInfo, PathKind, ScanError};
pub use tree::FileTree;
