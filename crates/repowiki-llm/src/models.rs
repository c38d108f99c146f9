//! Per-model output token ceilings
//!
//! Max tokens per call is derived from the model name. Unknown models get a
//! conservative default.

const DEFAULT_MAX_TOKENS: u32 = 8192;

pub fn max_tokens_for(model: &str) -> u32 {
    let model = model.to_ascii_lowercase();
    const TABLE: &[(&str, u32)] = &[
        ("claude-opus-4", 32_000),
        ("claude-sonnet-4", 64_000),
        ("claude-3-7", 64_000),
        ("claude-3-5", 8_192),
        ("gpt-4o-mini", 16_384),
        ("gpt-4o", 16_384),
        ("gpt-4.1", 32_768),
        ("gpt-4", 8_192),
        ("o3", 100_000),
        ("o1", 100_000),
        ("deepseek", 8_192),
    ];
    for (prefix, tokens) in TABLE {
        if model.starts_with(prefix) {
            return *tokens;
        }
    }
    DEFAULT_MAX_TOKENS
}
