//! Per-invocation access log
//!
//! Tools record every file path they hand to the model. The pipeline reads
//! the log after a generation call to populate the document's source file
//! list. One log per kernel invocation — never shared across concurrent
//! invocations.

use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct AccessLog {
    paths: Arc<Mutex<Vec<String>>>,
}

impl AccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accessed path, keeping first-seen order without duplicates.
    pub fn record(&self, path: impl Into<String>) {
        let path = path.into();
        let mut paths = self.paths.lock().unwrap();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.paths.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().unwrap().is_empty()
    }
}
