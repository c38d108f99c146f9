//! Scripted provider for deterministic tests
//!
//! Replays canned replies in order. Each reply is either plain text, a raw
//! delta script (for tool-call flows), or an injected failure. Requests are
//! recorded so tests can assert on call counts and payloads.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta};

#[derive(Debug)]
pub enum ScriptedReply {
    Text(String),
    Deltas(Vec<StreamDelta>),
    Fail(String),
}

#[derive(Default, Debug)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Text(text.into()));
    }

    pub fn push_deltas(&self, deltas: Vec<StreamDelta>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Deltas(deltas));
    }

    pub fn push_fail(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Fail(message.into()));
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        _cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        self.requests.lock().unwrap().push(request);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::RequestFailed("script exhausted".to_string()))?;

        let deltas = match reply {
            ScriptedReply::Fail(message) => return Err(LlmError::RequestFailed(message)),
            ScriptedReply::Text(text) => vec![
                StreamDelta::Text(text),
                StreamDelta::Done {
                    stop_reason: Some("end_turn".to_string()),
                    usage: None,
                },
            ],
            ScriptedReply::Deltas(deltas) => deltas,
        };

        Ok(Box::pin(futures::stream::iter(
            deltas.into_iter().map(Ok).collect::<Vec<_>>(),
        )))
    }
}
