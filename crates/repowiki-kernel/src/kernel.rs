//! The kernel — one tool-augmented LLM invocation scope
//!
//! Bundles the provider connection, a working-tree-scoped tool registry,
//! the prompt library, and the access log. `invoke_prompt` runs the full
//! agentic loop: stream the completion, auto-invoke any tool calls, feed
//! results back, repeat until the model answers with plain text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use repowiki_core::config::Config;
use repowiki_core::types::Classification;
use repowiki_llm::{
    create_provider, AccumulatedToolCall, ContentBlock, LlmError, LlmMessage, LlmProvider,
    LlmRequest, StreamDelta,
};
use repowiki_tools::{create_registry, AccessLog, ToolOptions, ToolRegistry};

use crate::prompts::PromptLibrary;

/// Tool results above this size are truncated before reaching the model.
const MAX_TOOL_RESULT_CHARS: usize = 50_000;
const MAX_TOOL_ITERATIONS: usize = 25;

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("max tool iterations exceeded ({0})")]
    MaxToolIterations(usize),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl KernelError {
    /// Whether a retry with back-off can plausibly recover.
    pub fn is_transient(&self) -> bool {
        match self {
            KernelError::Llm(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// One intercepted tool call, kept for diagnostics.
#[derive(Clone, Debug)]
pub struct ToolCallRecord {
    pub name: String,
    pub result: String,
    pub is_error: bool,
}

pub struct Kernel {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    access_log: AccessLog,
    prompts: PromptLibrary,
    model: String,
    working_path: PathBuf,
    intercepted: Mutex<Vec<ToolCallRecord>>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("model", &self.model)
            .field("working_path", &self.working_path)
            .finish_non_exhaustive()
    }
}

impl Kernel {
    /// Build a kernel for one pipeline invocation scope.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        working_path: impl AsRef<Path>,
        model: &str,
        code_analysis_plugin_enabled: bool,
        config: &Config,
    ) -> KernelResult<Self> {
        let provider = create_provider(&config.llm.provider, endpoint, api_key).map_err(|e| {
            match e {
                LlmError::UnsupportedProvider(name) => KernelError::UnsupportedProvider(name),
                other => KernelError::Llm(other),
            }
        })?;

        let options = ToolOptions {
            catalogue_format: config.document.catalogue_format,
            compress_code: config.document.enable_code_compression,
            dependency_analysis: code_analysis_plugin_enabled
                && config.document.enable_code_dependency_analysis,
        };
        Ok(Self::with_provider(
            provider,
            working_path,
            model,
            &options,
            config.worker.locale.clone(),
        ))
    }

    /// Build a kernel around an existing provider — the test seam.
    pub fn with_provider(
        provider: Arc<dyn LlmProvider>,
        working_path: impl AsRef<Path>,
        model: &str,
        options: &ToolOptions,
        locale: Option<String>,
    ) -> Self {
        let access_log = AccessLog::new();
        let tools = create_registry(working_path.as_ref(), options, access_log.clone());
        Self {
            provider,
            tools: Arc::new(tools),
            access_log,
            prompts: PromptLibrary::new(locale),
            model: model.to_string(),
            working_path: working_path.as_ref().to_path_buf(),
            intercepted: Mutex::new(Vec::new()),
        }
    }

    pub fn access_log(&self) -> &AccessLog {
        &self.access_log
    }

    pub fn working_path(&self) -> &Path {
        &self.working_path
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    /// Tool calls intercepted during the most recent invocations.
    pub fn tool_calls(&self) -> Vec<ToolCallRecord> {
        self.intercepted.lock().unwrap().clone()
    }

    /// Render a named template with `{{$var}}` substitution.
    pub fn render(&self, name: &str, vars: &HashMap<String, String>) -> KernelResult<String> {
        self.prompts
            .render_named(name, vars)
            .ok_or_else(|| KernelError::TemplateNotFound(name.to_string()))
    }

    /// Render `base + classification`, falling back to the base template.
    pub fn render_variant(
        &self,
        base: &str,
        classification: Option<Classification>,
        vars: &HashMap<String, String>,
    ) -> KernelResult<String> {
        self.prompts
            .get_variant(base, classification)
            .map(|t| PromptLibrary::render(&t, vars))
            .ok_or_else(|| KernelError::TemplateNotFound(base.to_string()))
    }

    /// Run a rendered prompt with the full tool loop. Returns the final
    /// assistant text.
    pub async fn invoke_prompt(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> KernelResult<String> {
        let mut messages = vec![LlmMessage::user(prompt)];

        for iteration in 0..MAX_TOOL_ITERATIONS {
            if cancel.is_cancelled() {
                return Err(KernelError::Cancelled);
            }

            let (text, tool_calls) = self
                .stream_one_segment(&messages, cancel.clone(), &mut |_| {})
                .await?;

            if tool_calls.is_empty() {
                debug!(iterations = iteration + 1, "invocation complete");
                return Ok(text);
            }

            self.push_tool_round(&mut messages, text, tool_calls, &cancel)
                .await;
        }
        Err(KernelError::MaxToolIterations(MAX_TOOL_ITERATIONS))
    }

    /// Like `invoke_prompt`, but yields assistant text chunks as they
    /// stream. Tool rounds run between segments without surfacing.
    pub fn invoke_streaming(
        &self,
        prompt: String,
        cancel: CancellationToken,
    ) -> impl futures::Stream<Item = KernelResult<String>> + Send + '_ {
        async_stream::stream! {
            let mut messages = vec![LlmMessage::user(prompt.as_str())];
            let mut finished = false;

            for _ in 0..MAX_TOOL_ITERATIONS {
                if cancel.is_cancelled() {
                    yield Err(KernelError::Cancelled);
                    return;
                }

                let mut chunks: Vec<String> = Vec::new();
                let segment = self
                    .stream_one_segment(&messages, cancel.clone(), &mut |chunk| {
                        chunks.push(chunk.to_string());
                    })
                    .await;

                for chunk in chunks {
                    yield Ok(chunk);
                }

                let (text, tool_calls) = match segment {
                    Ok(pair) => pair,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                if tool_calls.is_empty() {
                    finished = true;
                    break;
                }
                self.push_tool_round(&mut messages, text, tool_calls, &cancel).await;
            }

            if !finished {
                yield Err(KernelError::MaxToolIterations(MAX_TOOL_ITERATIONS));
            }
        }
    }

    /// Stream one completion segment, accumulating text and tool calls.
    async fn stream_one_segment(
        &self,
        messages: &[LlmMessage],
        cancel: CancellationToken,
        on_text: &mut (dyn FnMut(&str) + Send),
    ) -> KernelResult<(String, Vec<AccumulatedToolCall>)> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: Some(self.tools.get_definitions()),
            ..Default::default()
        };

        let stream = self
            .provider
            .complete_stream(request, Some(cancel.clone()))
            .await?;
        tokio::pin!(stream);

        let mut text = String::new();
        let mut tool_calls: Vec<AccumulatedToolCall> = Vec::new();
        let mut current_tool: Option<AccumulatedToolCall> = None;

        while let Some(delta) = stream.next().await {
            match delta {
                Ok(StreamDelta::Text(chunk)) => {
                    on_text(&chunk);
                    text.push_str(&chunk);
                }
                Ok(StreamDelta::Thinking(_)) => {}
                Ok(StreamDelta::ToolCallStart { id, name }) => {
                    current_tool = Some(AccumulatedToolCall {
                        id,
                        name,
                        arguments: String::new(),
                    });
                }
                Ok(StreamDelta::ToolCallDelta { arguments, .. }) => {
                    if let Some(ref mut tool) = current_tool {
                        tool.arguments.push_str(&arguments);
                    }
                }
                Ok(StreamDelta::ToolCallEnd { .. }) => {
                    if let Some(tool) = current_tool.take() {
                        tool_calls.push(tool);
                    }
                }
                Ok(StreamDelta::Done { .. }) => {}
                Ok(StreamDelta::Error(message)) => {
                    return Err(KernelError::Llm(LlmError::StreamError(message)));
                }
                Err(LlmError::Cancelled) => return Err(KernelError::Cancelled),
                Err(e) => return Err(KernelError::Llm(e)),
            }
        }

        Ok((text, tool_calls))
    }

    /// Record the assistant's tool round and execute every call, appending
    /// the results as one user message.
    async fn push_tool_round(
        &self,
        messages: &mut Vec<LlmMessage>,
        text: String,
        tool_calls: Vec<AccumulatedToolCall>,
        cancel: &CancellationToken,
    ) {
        let mut blocks: Vec<ContentBlock> = Vec::new();
        if !text.is_empty() {
            blocks.push(ContentBlock::Text { text });
        }
        for tc in &tool_calls {
            blocks.push(ContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.name.clone(),
                input: tc.parse_arguments().unwrap_or_default(),
            });
        }
        messages.push(LlmMessage {
            role: "assistant".to_string(),
            content: repowiki_llm::LlmContent::Blocks(blocks),
        });

        let mut results: Vec<ContentBlock> = Vec::new();
        for tc in tool_calls {
            let args = tc.parse_arguments().unwrap_or_default();
            let result = self
                .tools
                .execute_cancellable(&tc.name, args, cancel.clone())
                .await;
            let is_error = result.is_error();
            let mut result_str = result.to_content_string();
            if result_str.len() > MAX_TOOL_RESULT_CHARS {
                let total = result_str.len();
                result_str.truncate(
                    result_str
                        .char_indices()
                        .take_while(|(i, _)| *i < MAX_TOOL_RESULT_CHARS)
                        .map(|(i, c)| i + c.len_utf8())
                        .last()
                        .unwrap_or(0),
                );
                result_str.push_str(&format!("...\n[truncated, {} total chars]", total));
            }

            if is_error {
                warn!(tool = %tc.name, "tool returned error payload");
            }
            debug!(tool = %tc.name, chars = result_str.len(), "tool call intercepted");
            self.intercepted.lock().unwrap().push(ToolCallRecord {
                name: tc.name.clone(),
                result: result_str.clone(),
                is_error,
            });

            results.push(ContentBlock::ToolResult {
                tool_use_id: tc.id,
                content: result_str,
                is_error: if is_error { Some(true) } else { None },
            });
        }
        messages.push(LlmMessage {
            role: "user".to_string(),
            content: repowiki_llm::LlmContent::Blocks(results),
        });
    }
}
