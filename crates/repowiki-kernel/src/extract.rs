//! Wrapper extraction — pull structured output out of model responses
//!
//! Extractor order: the named wrapping tag first, then a fenced ```json
//! block, then the raw output as best effort. All extraction is a single
//! regex with dot-matches-newline.

use regex::Regex;
use std::sync::OnceLock;

/// Extract the content of `<tag>…</tag>`. Falls back to a fenced json
/// block, then to the raw output. Tag content is returned verbatim.
pub fn extract_wrapped(output: &str, tag: &str) -> String {
    if let Some(inner) = extract_tag(output, tag) {
        return inner;
    }
    if let Some(inner) = extract_json_fence(output) {
        return inner;
    }
    output.to_string()
}

/// Content of the first `<tag>…</tag>` occurrence, verbatim.
pub fn extract_tag(output: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?s)<{tag}>(.*?)</{tag}>", tag = regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    re.captures(output).map(|cap| cap[1].to_string())
}

/// Content of the first fenced ```json block, trimmed.
pub fn extract_json_fence(output: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)```").unwrap());
    re.captures(output).map(|cap| cap[1].trim().to_string())
}

/// Remove every `<tag>…</tag>` span.
pub fn strip_tag(output: &str, tag: &str) -> String {
    let pattern = format!(r"(?s)<{tag}>.*?</{tag}>", tag = regex::escape(tag));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(output, "").to_string(),
        Err(_) => output.to_string(),
    }
}

/// Pull the classification token out of
/// `<classify>classifyName:<value></classify>`.
pub fn extract_classification(output: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"(?s)<classify>\s*classifyName\s*:\s*(.*?)\s*</classify>").unwrap());
    re.captures(output).map(|cap| cap[1].trim().to_string())
}
