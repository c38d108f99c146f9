//! Per-language text parsers.
//!
//! Each parser is a self-contained module implementing `LanguageParser`.
//! To add a language: create the file, implement the trait, register it in
//! `default_parsers()`.

pub mod cpp;
pub mod go;
pub mod java;
pub mod js;
pub mod python;

use crate::parser::LanguageParser;
use std::sync::Arc;

/// The built-in parser set.
pub fn default_parsers() -> Vec<Arc<dyn LanguageParser>> {
    vec![
        Arc::new(js::JsParser),
        Arc::new(python::PythonParser),
        Arc::new(java::JavaParser),
        Arc::new(cpp::CppParser),
        Arc::new(go::GoParser),
    ]
}
