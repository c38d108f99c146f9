//! Process-wide configuration — loaded once at startup, never mutated.
//!
//! Pure types and defaults only. File/env loading lives in the binary.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub document: DocumentConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model endpoint base url. Empty means the provider default.
    pub endpoint: String,
    pub chat_api_key: String,
    /// Model used by generation stages.
    pub chat_model: String,
    /// Model used by analysis-heavy stages (directory filtering, catalogue).
    pub analysis_model: String,
    /// One of: OpenAI, AzureOpenAI, Anthropic.
    pub provider: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            chat_api_key: String::new(),
            chat_model: "claude-sonnet-4-20250514".to_string(),
            analysis_model: "claude-sonnet-4-20250514".to_string(),
            provider: "Anthropic".to_string(),
        }
    }
}

/// Output format for the directory manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogueFormat {
    #[default]
    Compact,
    Json,
    Pathlist,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Run the directory manifest through the LLM filter for large trees.
    pub enable_smart_filter: bool,
    /// Pass code files through comment/blank stripping before tool return.
    pub enable_code_compression: bool,
    /// Expose the dependency-graph tools to the model.
    pub enable_code_dependency_analysis: bool,
    pub catalogue_format: CatalogueFormat,
    /// Staleness threshold for the incremental updater.
    pub update_interval_days: i64,
    /// Generate the commit update log (stage 8).
    pub enable_warehouse_commit: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            enable_smart_filter: true,
            enable_code_compression: false,
            enable_code_dependency_analysis: true,
            catalogue_format: CatalogueFormat::Compact,
            update_interval_days: 7,
            enable_warehouse_commit: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds to sleep when the queue is empty or after a failure.
    pub poll_interval_secs: u64,
    /// Seconds between incremental-update sweeps.
    pub updater_interval_secs: u64,
    /// Lease duration. Must exceed the longest expected pipeline run.
    pub lease_duration_secs: i64,
    /// Prompt locale, e.g. "zh". None selects the base templates.
    pub locale: Option<String>,
    /// Where cloned working trees are materialized.
    pub clone_root: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            updater_interval_secs: 3600,
            lease_duration_secs: 6 * 60 * 60,
            locale: None,
            clone_root: "./repositories".to_string(),
        }
    }
}
