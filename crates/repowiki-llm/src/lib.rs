//! Repowiki LLM - provider adapters with SSE streaming and tool calling

pub mod anthropic;
pub mod http;
pub mod models;
pub mod openai;
pub mod provider;
pub mod testing;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use openai::{OpenAiFlavor, OpenAiProvider};
pub use provider::{LlmError, LlmProvider, LlmResult, LlmStream, ProviderKind};
pub use types::*;

use std::sync::Arc;

/// Build a provider from configuration. Unknown provider names fail.
pub fn create_provider(
    provider: &str,
    endpoint: &str,
    api_key: &str,
) -> LlmResult<Arc<dyn LlmProvider>> {
    let kind = ProviderKind::parse(provider)
        .ok_or_else(|| LlmError::UnsupportedProvider(provider.to_string()))?;
    Ok(match kind {
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key);
            if !endpoint.is_empty() {
                p = p.with_base_url(endpoint);
            }
            Arc::new(p)
        }
        ProviderKind::OpenAi => {
            Arc::new(OpenAiProvider::new(api_key, endpoint, OpenAiFlavor::Standard))
        }
        ProviderKind::AzureOpenAi => {
            Arc::new(OpenAiProvider::new(api_key, endpoint, OpenAiFlavor::Azure))
        }
    })
}
