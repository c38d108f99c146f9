//! Code compression — comment and blank-line stripping before tool return
//!
//! Keeps token budgets down when the model reads large code files. Only
//! extensions with a known comment syntax are touched; everything else
//! passes through unchanged.

const LINE_COMMENT_EXTS: &[(&str, &str)] = &[
    ("rs", "//"),
    ("js", "//"),
    ("jsx", "//"),
    ("ts", "//"),
    ("tsx", "//"),
    ("mjs", "//"),
    ("cjs", "//"),
    ("java", "//"),
    ("go", "//"),
    ("c", "//"),
    ("h", "//"),
    ("cpp", "//"),
    ("hpp", "//"),
    ("cc", "//"),
    ("cs", "//"),
    ("py", "#"),
    ("rb", "#"),
    ("sh", "#"),
    ("yaml", "#"),
    ("yml", "#"),
];

pub fn is_code_extension(ext: &str) -> bool {
    LINE_COMMENT_EXTS
        .iter()
        .any(|(e, _)| e.eq_ignore_ascii_case(ext))
}

/// Strip whole-line comments and blank lines. Inline comments are left
/// alone — stripping them safely needs a real lexer.
pub fn compress(content: &str, ext: &str) -> String {
    let marker = match LINE_COMMENT_EXTS
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
    {
        Some((_, marker)) => marker,
        None => return content.to_string(),
    };

    let mut in_block = false;
    let supports_block = *marker == "//";
    let mut out = String::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with(marker) {
            continue;
        }
        if supports_block && trimmed.starts_with("/*") {
            if !trimmed.contains("*/") {
                in_block = true;
            }
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments_and_blanks() {
        let src = "// header\n\nfn main() {\n    let x = 1; // inline stays\n}\n";
        let out = compress(src, "rs");
        assert!(!out.contains("header"));
        assert!(out.contains("inline stays"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn strips_block_comments() {
        let src = "/* a\n   b */\ncode();\n";
        assert_eq!(compress(src, "c"), "code();\n");
    }

    #[test]
    fn unknown_extension_passes_through() {
        let src = "# not a comment in markdown sense\ntext\n";
        assert_eq!(compress(src, "md"), src);
    }
}
