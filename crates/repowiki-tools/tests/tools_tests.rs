//! Tests for repowiki-tools: registry plumbing and every builtin tool
//! against a real filesystem

use repowiki_core::config::CatalogueFormat;
use repowiki_tools::*;
use serde_json::json;
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn registry_for(root: &Path) -> (ToolRegistry, AccessLog) {
    let log = AccessLog::new();
    let registry = create_registry(root, &ToolOptions::default(), log.clone());
    (registry, log)
}

// ===========================================================================
// Registry
// ===========================================================================

#[tokio::test]
async fn default_registry_has_core_tools() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _) = registry_for(dir.path());
    let names = registry.list();
    for name in ["GetTree", "FileInfo", "ReadFile", "ReadFiles", "File"] {
        assert!(names.contains(&name), "missing {}", name);
    }
    // Dependency tools are gated off by default.
    assert!(!names.contains(&"AnalyzeFileDependencyTree"));
    assert_eq!(registry.get_definitions().len(), 5);
}

#[tokio::test]
async fn dependency_tools_register_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let options = ToolOptions {
        dependency_analysis: true,
        ..Default::default()
    };
    let registry = create_registry(dir.path(), &options, AccessLog::new());
    assert!(registry.list().contains(&"AnalyzeFileDependencyTree"));
    assert!(registry.list().contains(&"AnalyzeFunctionDependencyTree"));
}

#[tokio::test]
async fn missing_tool_is_an_error_payload() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _) = registry_for(dir.path());
    let result = registry.execute("nonexistent", json!({})).await;
    assert!(result.is_error());
    assert!(result.to_content_string().contains("not found"));
}

#[tokio::test]
async fn definitions_carry_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _) = registry_for(dir.path());
    for def in registry.get_definitions() {
        assert!(!def.name.is_empty());
        assert!(!def.description.is_empty());
        assert!(def.input_schema.is_object());
    }
}

// ===========================================================================
// GetTree
// ===========================================================================

#[tokio::test]
async fn get_tree_renders_compact_listing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/main.rs", "fn main() {}");
    let (registry, _) = registry_for(dir.path());
    let result = registry.execute("GetTree", json!({})).await;
    assert!(!result.is_error());
    let text = result.to_content_string();
    assert!(text.contains("src/D"));
    assert!(text.contains("src/main.rs/F"));
}

#[tokio::test]
async fn get_tree_honors_gitignore() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), ".gitignore", "target/\n");
    write(dir.path(), "target/out.bin", "x");
    write(dir.path(), "src/lib.rs", "x");
    let (registry, _) = registry_for(dir.path());
    let text = registry.execute("GetTree", json!({})).await.to_content_string();
    assert!(!text.contains("target/out.bin"));
    assert!(text.contains("src/lib.rs"));
}

// ===========================================================================
// FileInfo
// ===========================================================================

#[tokio::test]
async fn file_info_reports_metadata_and_dedupes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.rs", "line one\nline two\n");
    let (registry, _) = registry_for(dir.path());
    let result = registry
        .execute("FileInfo", json!({"paths": ["a.rs", "a.rs", "missing.rs"]}))
        .await;
    let text = result.to_content_string();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["a.rs"]["lines"], 2);
    assert_eq!(value["a.rs"]["extension"], "rs");
    assert_eq!(value["missing.rs"], "File not found");
    assert_eq!(value.as_object().unwrap().len(), 2);
}

// ===========================================================================
// ReadFile / ReadFiles — size boundaries
// ===========================================================================

#[tokio::test]
async fn read_file_serves_exactly_100kib() {
    let dir = tempfile::tempdir().unwrap();
    let content = "x".repeat(100 * 1024);
    write(dir.path(), "exact.txt", &content);
    let (registry, log) = registry_for(dir.path());
    let result = registry
        .execute("ReadFile", json!({"path": "exact.txt"}))
        .await;
    assert_eq!(result.to_content_string().len(), 100 * 1024);
    assert_eq!(log.paths(), vec!["exact.txt"]);
}

#[tokio::test]
async fn read_file_rejects_one_byte_over() {
    let dir = tempfile::tempdir().unwrap();
    let content = "x".repeat(100 * 1024 + 1);
    write(dir.path(), "big.txt", &content);
    let (registry, log) = registry_for(dir.path());
    let result = registry.execute("ReadFile", json!({"path": "big.txt"})).await;
    let text = result.to_content_string();
    assert!(text.contains("File too large"));
    assert!(text.contains("File tool"));
    // Rejected reads are not recorded as accessed sources.
    assert!(log.paths().is_empty());
}

#[tokio::test]
async fn read_file_missing_is_in_band_message() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _) = registry_for(dir.path());
    let result = registry
        .execute("ReadFile", json!({"path": "missing.txt"}))
        .await;
    // A string payload, not a tool error.
    assert!(!result.is_error());
    assert_eq!(result.to_content_string(), "File not found");
}

#[tokio::test]
async fn read_files_returns_map_with_per_file_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ok.txt", "content here");
    let (registry, log) = registry_for(dir.path());
    let result = registry
        .execute("ReadFiles", json!({"paths": ["ok.txt", "gone.txt", "ok.txt"]}))
        .await;
    let value: serde_json::Value =
        serde_json::from_str(&result.to_content_string()).unwrap();
    assert_eq!(value["ok.txt"], "content here");
    assert_eq!(value["gone.txt"], "File not found");
    assert_eq!(log.paths(), vec!["ok.txt"]);
}

#[tokio::test]
async fn read_escape_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let outside = dir.path().parent().unwrap().join("outside-secret.txt");
    fs::write(&outside, "secret").unwrap();
    let (registry, _) = registry_for(dir.path());
    let result = registry
        .execute("ReadFile", json!({"path": "../outside-secret.txt"}))
        .await;
    assert_eq!(result.to_content_string(), "File not found");
    let _ = fs::remove_file(outside);
}

// ===========================================================================
// File (line-ranged reader)
// ===========================================================================

async fn read_ranged(registry: &ToolRegistry, path: &str, offset: i64, limit: i64) -> String {
    let result = registry
        .execute(
            "File",
            json!({"items": [{"filePath": path, "offset": offset, "limit": limit}]}),
        )
        .await;
    let value: serde_json::Value =
        serde_json::from_str(&result.to_content_string()).unwrap();
    value[path].as_str().unwrap().to_string()
}

#[tokio::test]
async fn ranged_read_prefixes_absolute_line_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (1..=50).map(|i| format!("line {}", i)).collect();
    write(dir.path(), "numbered.txt", &lines.join("\n"));
    let (registry, _) = registry_for(dir.path());

    let out = read_ranged(&registry, "numbered.txt", 10, 3).await;
    assert_eq!(out, "11: line 11\n12: line 12\n13: line 13\n");
}

#[tokio::test]
async fn ranged_read_negative_semantics() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "three.txt", "a\nb\nc");
    let (registry, _) = registry_for(dir.path());

    // offset < 0 and limit < 0: whole file.
    let out = read_ranged(&registry, "three.txt", -1, -1).await;
    assert_eq!(out, "1: a\n2: b\n3: c\n");

    // limit < 0: to end.
    let out = read_ranged(&registry, "three.txt", 1, -1).await;
    assert_eq!(out, "2: b\n3: c\n");
}

#[tokio::test]
async fn ranged_read_past_end_is_no_content() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "short.txt", "a\nb");
    let (registry, _) = registry_for(dir.path());

    let out = read_ranged(&registry, "short.txt", 2, 5).await;
    assert_eq!(out, "no content");
    let out = read_ranged(&registry, "short.txt", 100, 1).await;
    assert_eq!(out, "no content");
}

#[tokio::test]
async fn long_lines_truncate_not_wrap() {
    let dir = tempfile::tempdir().unwrap();
    let long = "y".repeat(5000);
    write(dir.path(), "wide.txt", &format!("{}\nshort", long));
    let (registry, _) = registry_for(dir.path());

    let out = read_ranged(&registry, "wide.txt", 0, 2).await;
    let first_line = out.lines().next().unwrap();
    // "1: " prefix plus exactly 2000 chars.
    assert_eq!(first_line.len(), 3 + 2000);
    assert_eq!(out.lines().count(), 2);
}

// ===========================================================================
// Code compression
// ===========================================================================

#[tokio::test]
async fn compression_applies_to_code_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "code.rs", "// comment\n\nfn live() {}\n");
    write(dir.path(), "notes.md", "// not stripped\n\ntext\n");
    let options = ToolOptions {
        compress_code: true,
        ..Default::default()
    };
    let registry = create_registry(dir.path(), &options, AccessLog::new());

    let code = registry
        .execute("ReadFile", json!({"path": "code.rs"}))
        .await
        .to_content_string();
    assert_eq!(code, "fn live() {}\n");

    let notes = registry
        .execute("ReadFile", json!({"path": "notes.md"}))
        .await
        .to_content_string();
    assert!(notes.contains("// not stripped"));
}

// ===========================================================================
// Dependency tools end-to-end
// ===========================================================================

#[tokio::test]
async fn dependency_tools_emit_json_trees() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.js", "import './b';\nfunction go() { helper(); }\n");
    write(dir.path(), "b.js", "export function helper() {}\n");
    let options = ToolOptions {
        dependency_analysis: true,
        ..Default::default()
    };
    let registry = create_registry(dir.path(), &options, AccessLog::new());

    let result = registry
        .execute("AnalyzeFileDependencyTree", json!({"filePath": "a.js"}))
        .await;
    assert!(!result.is_error());
    let tree: serde_json::Value = serde_json::from_str(&result.to_content_string()).unwrap();
    assert_eq!(tree["name"], "a.js");
    assert_eq!(tree["children"][0]["name"], "b.js");

    let result = registry
        .execute(
            "AnalyzeFunctionDependencyTree",
            json!({"filePath": "a.js", "functionName": "go"}),
        )
        .await;
    let tree: serde_json::Value = serde_json::from_str(&result.to_content_string()).unwrap();
    assert_eq!(tree["children"][0]["name"], "helper");

    // Unknown inputs come back as error payloads for the model, not
    // kernel failures.
    let result = registry
        .execute("AnalyzeFileDependencyTree", json!({"filePath": "nope.js"}))
        .await;
    assert!(result.is_error());
}
