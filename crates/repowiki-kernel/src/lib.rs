//! Repowiki Kernel — the tool-augmented prompting layer
//!
//! A kernel is a per-invocation handle bundling the LLM connection, a
//! filesystem-scoped tool set, the prompt library, and an access log used
//! to track which files a generation read.

pub mod extract;
pub mod kernel;
pub mod prompts;

pub use extract::{extract_classification, extract_tag, extract_wrapped, strip_tag};
pub use kernel::{Kernel, KernelError, KernelResult};
pub use prompts::PromptLibrary;
