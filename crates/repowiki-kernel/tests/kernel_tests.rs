//! Tests for the kernel: template rendering, the tool-call loop, and
//! streaming accumulation

use std::fs;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use repowiki_core::config::Config;
use repowiki_kernel::prompts::vars;
use repowiki_kernel::{Kernel, KernelError};
use repowiki_llm::testing::ScriptedProvider;
use repowiki_llm::StreamDelta;
use repowiki_tools::ToolOptions;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn kernel_with(provider: Arc<ScriptedProvider>, root: &Path) -> Kernel {
    Kernel::with_provider(provider, root, "test-model", &ToolOptions::default(), None)
}

fn tool_call_reply(id: &str, name: &str, args: &str) -> Vec<StreamDelta> {
    vec![
        StreamDelta::ToolCallStart {
            id: id.to_string(),
            name: name.to_string(),
        },
        StreamDelta::ToolCallDelta {
            id: id.to_string(),
            arguments: args.to_string(),
        },
        StreamDelta::ToolCallEnd { id: id.to_string() },
        StreamDelta::Done {
            stop_reason: Some("tool_use".to_string()),
            usage: None,
        },
    ]
}

// ===========================================================================
// Construction
// ===========================================================================

#[test]
fn unknown_provider_fails_kernel_construction() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.llm.provider = "mystery".to_string();
    let err = Kernel::new("", "key", dir.path(), "model", true, &config).unwrap_err();
    assert!(matches!(err, KernelError::UnsupportedProvider(name) if name == "mystery"));
}

#[test]
fn recognized_providers_construct() {
    let dir = tempfile::tempdir().unwrap();
    for provider in ["OpenAI", "AzureOpenAI", "Anthropic"] {
        let mut config = Config::default();
        config.llm.provider = provider.to_string();
        assert!(Kernel::new("", "key", dir.path(), "model", true, &config).is_ok());
    }
}

// ===========================================================================
// Rendering
// ===========================================================================

#[test]
fn render_substitutes_and_blanks_missing() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel_with(Arc::new(ScriptedProvider::new()), dir.path());
    let rendered = kernel
        .render(
            "Overview",
            &vars([("git_repository", "https://example.test/r.git")]),
        )
        .unwrap();
    assert!(rendered.contains("https://example.test/r.git"));
    assert!(!rendered.contains("{{$"));
}

#[test]
fn render_unknown_template_errors() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel_with(Arc::new(ScriptedProvider::new()), dir.path());
    let err = kernel.render("NoSuchTemplate", &vars([])).unwrap_err();
    assert!(matches!(err, KernelError::TemplateNotFound(_)));
}

// ===========================================================================
// Tool loop
// ===========================================================================

#[tokio::test]
async fn plain_reply_needs_no_tools() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text("final answer");
    let kernel = kernel_with(provider.clone(), dir.path());

    let out = kernel
        .invoke_prompt("say something", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out, "final answer");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn tool_calls_are_auto_invoked_and_fed_back() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/app.rs", "fn app() {}\n");
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_deltas(tool_call_reply(
        "t1",
        "ReadFile",
        "{\"path\": \"src/app.rs\"}",
    ));
    provider.push_text("done reading");
    let kernel = kernel_with(provider.clone(), dir.path());

    let out = kernel
        .invoke_prompt("inspect the app", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out, "done reading");
    assert_eq!(provider.call_count(), 2);

    // The interceptor recorded the call and the access log the path.
    let calls = kernel.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "ReadFile");
    assert!(calls[0].result.contains("fn app()"));
    assert_eq!(kernel.access_log().paths(), vec!["src/app.rs"]);

    // The second request carried the tool result back to the model.
    let second = &provider.requests()[1];
    let serialized = serde_json::to_string(&second.messages).unwrap();
    assert!(serialized.contains("tool_result"));
    assert!(serialized.contains("fn app()"));
}

#[tokio::test]
async fn tool_errors_are_payloads_not_failures() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_deltas(tool_call_reply("t1", "UnknownTool", "{}"));
    provider.push_text("recovered");
    let kernel = kernel_with(provider.clone(), dir.path());

    let out = kernel
        .invoke_prompt("try a bad tool", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out, "recovered");
    let calls = kernel.tool_calls();
    assert!(calls[0].is_error);
    assert!(calls[0].result.contains("not found"));
}

#[tokio::test]
async fn stream_error_surfaces_as_transient() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_deltas(vec![
        StreamDelta::Text("partial".to_string()),
        StreamDelta::Error("connection reset".to_string()),
    ]);
    let kernel = kernel_with(provider, dir.path());

    let err = kernel
        .invoke_prompt("x", CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_text("never used");
    let kernel = kernel_with(provider.clone(), dir.path());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = kernel.invoke_prompt("x", cancel).await.unwrap_err();
    assert!(matches!(err, KernelError::Cancelled));
    assert_eq!(provider.call_count(), 0);
}

// ===========================================================================
// Streaming
// ===========================================================================

#[tokio::test]
async fn streaming_yields_chunks_across_tool_rounds() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "f.txt", "data");
    let provider = Arc::new(ScriptedProvider::new());
    let mut first = vec![StreamDelta::Text("thinking… ".to_string())];
    first.extend(tool_call_reply("t1", "ReadFile", "{\"path\": \"f.txt\"}"));
    provider.push_deltas(first);
    provider.push_deltas(vec![
        StreamDelta::Text("part one ".to_string()),
        StreamDelta::Text("part two".to_string()),
        StreamDelta::Done {
            stop_reason: Some("end_turn".to_string()),
            usage: None,
        },
    ]);
    let kernel = kernel_with(provider.clone(), dir.path());

    let stream = kernel.invoke_streaming("go".to_string(), CancellationToken::new());
    tokio::pin!(stream);
    let mut buffer = String::new();
    let mut chunks = 0;
    while let Some(chunk) = stream.next().await {
        buffer.push_str(&chunk.unwrap());
        chunks += 1;
    }
    assert_eq!(buffer, "thinking… part one part two");
    assert!(chunks >= 3);
    assert_eq!(provider.call_count(), 2);
}
