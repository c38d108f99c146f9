//! Prompt library — embedded markdown templates with pure substitution
//!
//! Templates live under prompts/ and are compiled into the binary. They are
//! addressed by bare name ("Overview") or plugin path
//! ("CodeAnalysis/GenerateReadme"). Rendering replaces `{{$var}}`
//! placeholders; missing variables render as empty. No code execution.

use regex::Regex;
use rust_embed::RustEmbed;
use std::collections::HashMap;
use std::sync::OnceLock;

use repowiki_core::types::Classification;

#[derive(RustEmbed)]
#[folder = "prompts/"]
struct Prompts;

#[derive(Clone, Default)]
pub struct PromptLibrary {
    /// Locale key for template variants, e.g. "zh" selects `Name.zh.md`.
    locale: Option<String>,
}

impl PromptLibrary {
    pub fn new(locale: Option<String>) -> Self {
        Self { locale }
    }

    /// Look up a template by name, preferring the locale variant.
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(locale) = &self.locale {
            let key = format!("{}.{}.md", name, locale);
            if let Some(file) = Prompts::get(&key) {
                return String::from_utf8(file.data.into_owned()).ok();
            }
        }
        let file = Prompts::get(&format!("{}.md", name))?;
        String::from_utf8(file.data.into_owned()).ok()
    }

    /// Classification-specific selection: `base name + classification`,
    /// falling back to the base when the variant is absent or the
    /// classification is unknown.
    pub fn get_variant(&self, base: &str, classification: Option<Classification>) -> Option<String> {
        if let Some(classification) = classification {
            let name = format!("{}{}", base, classification.as_str());
            if let Some(template) = self.get(&name) {
                return Some(template);
            }
        }
        self.get(base)
    }

    /// Render a template with `{{$var}}` substitution. Pure: unknown
    /// variables render as empty strings.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\{\{\$([A-Za-z0-9_]+)\}\}").unwrap());
        re.replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .to_string()
    }

    pub fn render_named(
        &self,
        name: &str,
        vars: &HashMap<String, String>,
    ) -> Option<String> {
        self.get(name).map(|t| Self::render(&t, vars))
    }

    /// All embedded template names, for diagnostics.
    pub fn list() -> Vec<String> {
        Prompts::iter()
            .map(|f| f.as_ref().trim_end_matches(".md").to_string())
            .collect()
    }
}

/// Convenience for building the vars map.
pub fn vars<const N: usize>(pairs: [(&str, &str); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_is_pure() {
        let rendered = PromptLibrary::render(
            "Repo: {{$git_repository}} on {{$branch}} ({{$missing}})",
            &vars([("git_repository", "https://example.test/r.git"), ("branch", "main")]),
        );
        assert_eq!(rendered, "Repo: https://example.test/r.git on main ()");
    }

    #[test]
    fn all_required_templates_are_embedded() {
        let library = PromptLibrary::new(None);
        for name in [
            "Overview",
            "RepositoryClassification",
            "GenerateMindMap",
            "AnalyzeCatalogue",
            "GenerateDocs",
            "AnalyzeNewCatalogue",
            "CodeAnalysis/CodeDirSimplifier",
            "CodeAnalysis/GenerateReadme",
        ] {
            assert!(library.get(name).is_some(), "missing template {}", name);
        }
    }

    #[test]
    fn classification_variant_falls_back_to_base() {
        let library = PromptLibrary::new(None);
        let libraries = library
            .get_variant("AnalyzeCatalogue", Some(Classification::Libraries))
            .unwrap();
        assert!(libraries.contains("library"));

        // No dedicated Documentation variant ships; the base is used.
        let base = library.get("AnalyzeCatalogue").unwrap();
        let fallback = library
            .get_variant("AnalyzeCatalogue", Some(Classification::Documentation))
            .unwrap();
        assert_eq!(base, fallback);
    }

    #[test]
    fn unknown_locale_falls_back() {
        let library = PromptLibrary::new(Some("xx".to_string()));
        assert!(library.get("Overview").is_some());
    }
}
