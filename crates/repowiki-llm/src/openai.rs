//! OpenAI-compatible chat completions provider (standard and Azure flavors)

use std::collections::HashMap;

use crate::http::build_client;
use crate::models::max_tokens_for;
use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{ContentBlock, LlmContent, LlmRequest, StreamDelta};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const AZURE_API_VERSION: &str = "2024-02-01";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenAiFlavor {
    Standard,
    /// Same wire format, deployment-scoped URL and `api-key` header.
    Azure,
}

#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    flavor: OpenAiFlavor,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, endpoint: &str, flavor: OpenAiFlavor) -> Self {
        let endpoint = if endpoint.is_empty() {
            OPENAI_API_URL.to_string()
        } else {
            endpoint.trim_end_matches('/').to_string()
        };
        Self {
            client: build_client(),
            api_key: api_key.into(),
            endpoint,
            flavor,
        }
    }

    fn url_for(&self, model: &str) -> String {
        match self.flavor {
            OpenAiFlavor::Standard => format!("{}/chat/completions", self.endpoint),
            OpenAiFlavor::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint, model, AZURE_API_VERSION
            ),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        match self.flavor {
            OpenAiFlavor::Standard => "openai",
            OpenAiFlavor::Azure => "azure-openai",
        }
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let mut messages: Vec<OaMessage> = Vec::new();
        if let Some(system) = &request.system {
            messages.push(OaMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        for message in &request.messages {
            convert_message(message, &mut messages);
        }

        let body = OaRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            max_tokens: request
                .max_tokens
                .unwrap_or_else(|| max_tokens_for(&request.model)),
            temperature: request.temperature,
            tools: request.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| OaTool {
                        kind: "function".to_string(),
                        function: OaFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect()
            }),
        };

        debug!("openai request: model={} url={}", body.model, self.url_for(&body.model));

        let mut builder = self.client.post(self.url_for(&body.model));
        builder = match self.flavor {
            OpenAiFlavor::Standard => builder.bearer_auth(&self.api_key),
            OpenAiFlavor::Azure => builder.header("api-key", &self.api_key),
        };

        let response = builder
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("openai error {}: {}", status, error_text);

            return Err(match status.as_u16() {
                401 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited {
                    retry_after_ms: 60000,
                },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let stream = parse_sse_stream(response.bytes_stream(), cancel);
        Ok(Box::pin(stream))
    }
}

fn convert_message(message: &crate::types::LlmMessage, out: &mut Vec<OaMessage>) {
    match &message.content {
        LlmContent::Text(text) => out.push(OaMessage {
            role: message.role.clone(),
            content: Some(text.clone()),
            tool_calls: None,
            tool_call_id: None,
        }),
        LlmContent::Blocks(blocks) => {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::Text { text: t } => text.push_str(t),
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(OaToolCall {
                        id: id.clone(),
                        kind: "function".to_string(),
                        function: OaCall {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    }),
                    // Tool results are standalone messages on this wire.
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => out.push(OaMessage {
                        role: "tool".to_string(),
                        content: Some(content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(tool_use_id.clone()),
                    }),
                }
            }
            if !text.is_empty() || !tool_calls.is_empty() {
                out.push(OaMessage {
                    role: message.role.clone(),
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: None,
                });
            }
        }
    }
}

fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    cancel: Option<CancellationToken>,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send {
    async_stream::stream! {
        let cancel = cancel.unwrap_or_default();
        let mut buffer = String::new();
        // Tool calls stream by index; ids only arrive on the first chunk.
        let mut tool_ids: HashMap<u32, String> = HashMap::new();
        let mut done_sent = false;

        tokio::pin!(bytes_stream);

        loop {
            let chunk_result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    yield Err(LlmError::Cancelled);
                    return;
                }
                chunk = bytes_stream.next() => match chunk {
                    Some(c) => c,
                    None => break,
                },
            };

            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    continue;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer = buffer[line_end + 1..].to_string();

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    if !done_sent {
                        done_sent = true;
                        yield Ok(StreamDelta::Done { stop_reason: None, usage: None });
                    }
                    continue;
                }

                let parsed: OaChunk = match serde_json::from_str(data) {
                    Ok(p) => p,
                    Err(e) => {
                        yield Err(LlmError::StreamError(format!("bad chunk: {}", e)));
                        continue;
                    }
                };

                for choice in parsed.choices {
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            yield Ok(StreamDelta::Text(content));
                        }
                    }
                    for tc in choice.delta.tool_calls.unwrap_or_default() {
                        if let (Some(id), Some(function)) = (tc.id.clone(), tc.function.as_ref()) {
                            if let Some(name) = function.name.clone() {
                                tool_ids.insert(tc.index, id.clone());
                                yield Ok(StreamDelta::ToolCallStart { id, name });
                            }
                        }
                        if let Some(function) = tc.function {
                            if let Some(arguments) = function.arguments {
                                if !arguments.is_empty() {
                                    if let Some(id) = tool_ids.get(&tc.index) {
                                        yield Ok(StreamDelta::ToolCallDelta {
                                            id: id.clone(),
                                            arguments,
                                        });
                                    }
                                }
                            }
                        }
                    }
                    if let Some(reason) = choice.finish_reason {
                        for id in tool_ids.drain().map(|(_, id)| id) {
                            yield Ok(StreamDelta::ToolCallEnd { id });
                        }
                        done_sent = true;
                        yield Ok(StreamDelta::Done {
                            stop_reason: Some(reason),
                            usage: None,
                        });
                    }
                }
            }
        }
    }
}

#[derive(Serialize)]
struct OaRequest {
    model: String,
    messages: Vec<OaMessage>,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OaTool>>,
}

#[derive(Serialize)]
struct OaMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct OaToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: OaCall,
}

#[derive(Serialize)]
struct OaCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct OaTool {
    #[serde(rename = "type")]
    kind: String,
    function: OaFunction,
}

#[derive(Serialize)]
struct OaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct OaChunk {
    #[serde(default)]
    choices: Vec<OaChoice>,
}

#[derive(Deserialize)]
struct OaChoice {
    delta: OaDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OaDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OaToolCallDelta>>,
}

#[derive(Deserialize)]
struct OaToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<OaCallDelta>,
}

#[derive(Deserialize)]
struct OaCallDelta {
    name: Option<String>,
    arguments: Option<String>,
}
