//! Gitignore rule parsing and matching
//!
//! Matching contract: a path is ignored when the last matching rule is
//! non-negated. Negated rules (`!`) re-include. Rules with a trailing `/`
//! are directory rules and match each ancestor directory of a file path in
//! addition to the path itself. A leading `/` anchors the rule to the root.

use regex::Regex;
use tracing::debug;

#[derive(Debug)]
struct IgnoreRule {
    regex: Regex,
    negated: bool,
    dir_only: bool,
}

/// An ordered gitignore ruleset.
#[derive(Debug, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Parse gitignore text. Lines that fail to translate are skipped, so a
    /// malformed file degrades toward "no ignore" rather than erroring.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (negated, line) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let (dir_only, line) = match line.strip_suffix('/') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let (anchored, line) = match line.strip_prefix('/') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            if line.is_empty() {
                continue;
            }

            let body = translate(line);
            let full = if anchored {
                format!("^{}$", body)
            } else {
                format!("^(?:.*/)?{}$", body)
            };
            match Regex::new(&full) {
                Ok(regex) => rules.push(IgnoreRule {
                    regex,
                    negated,
                    dir_only,
                }),
                Err(e) => debug!("skipping unparsable ignore rule {:?}: {}", line, e),
            }
        }
        Self { rules }
    }

    /// Load `.gitignore` from a working tree root. Missing or unreadable
    /// files yield the empty ruleset.
    pub fn load(root: &std::path::Path) -> Self {
        match std::fs::read_to_string(root.join(".gitignore")) {
            Ok(text) => Self::parse(&text),
            Err(_) => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether a relative, `/`-separated path is ignored. `is_dir` marks the
    /// path itself as a directory so directory rules can match it directly.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule_matches(rule, rel_path, is_dir) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

fn rule_matches(rule: &IgnoreRule, rel_path: &str, is_dir: bool) -> bool {
    if rule.regex.is_match(rel_path) {
        // A directory rule matching a file path directly only counts when
        // the path is a directory.
        if !rule.dir_only || is_dir {
            return true;
        }
    }
    if rule.dir_only {
        for ancestor in ancestors(rel_path) {
            if rule.regex.is_match(ancestor) {
                return true;
            }
        }
    }
    false
}

/// Proper ancestor directories of a path: "a/b/c.txt" → ["a", "a/b"].
fn ancestors(rel_path: &str) -> impl Iterator<Item = &str> {
    rel_path
        .char_indices()
        .filter(|&(_, c)| c == '/')
        .map(move |(i, _)| &rel_path[..i])
}

/// Translate one gitignore pattern into a regex body.
///
/// `**/` matches any (possibly empty) path prefix, `*` any run of
/// non-separator characters, `?` exactly one non-separator, bracket classes
/// pass through verbatim, everything else is escaped.
fn translate(pattern: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    if chars.get(i + 2) == Some(&'/') {
                        out.push_str("(?:.*/)?");
                        i += 3;
                    } else {
                        out.push_str(".*");
                        i += 2;
                    }
                } else {
                    out.push_str("[^/]*");
                    i += 1;
                }
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => {
                // Bracket classes pass through up to the closing bracket.
                let mut j = i + 1;
                if chars.get(j) == Some(&'!') || chars.get(j) == Some(&'^') {
                    j += 1;
                }
                // A `]` immediately after the opener is a literal member.
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j < chars.len() {
                    out.push('[');
                    let mut k = i + 1;
                    if chars.get(k) == Some(&'!') {
                        out.push('^');
                        k += 1;
                    }
                    for &c in &chars[k..=j] {
                        out.push(c);
                    }
                    i = j + 1;
                } else {
                    // Unterminated class — treat the bracket literally.
                    out.push_str(&regex::escape("["));
                    i += 1;
                }
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out
}
