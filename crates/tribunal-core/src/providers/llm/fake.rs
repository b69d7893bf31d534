//! Scripted client for tests: outcomes are queued up front and popped in
//! call order, so a test can drive the whole pipeline without a network.

use super::{ChatOutcome, ChatRequest, ChunkSink, LlmClient, ToolCall};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

const STREAM_CHUNK_CHARS: usize = 16;

enum Scripted {
    Outcome(ChatOutcome),
    Error(String),
}

#[derive(Default)]
pub struct FakeClient {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text/JSON answer.
    pub fn push_text(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Outcome(ChatOutcome {
            text: text.into(),
            tool_calls: Vec::new(),
        }))
    }

    /// Queue a capability-invocation request.
    pub fn push_tool_call(self, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        let id = format!("call_{}", self.script.lock().unwrap().len());
        self.push(Scripted::Outcome(ChatOutcome {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id,
                name: name.into(),
                arguments: arguments.into(),
            }],
        }))
    }

    /// Queue a transport failure.
    pub fn push_error(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Error(message.into()))
    }

    fn push(self, entry: Scripted) -> Self {
        self.script.lock().unwrap().push_back(entry);
        self
    }

    /// Requests seen so far, in call order.
    pub fn take_requests(&self) -> Vec<ChatRequest> {
        std::mem::take(&mut self.requests.lock().unwrap())
    }

    fn pop(&self, req: &ChatRequest) -> anyhow::Result<ChatOutcome> {
        self.requests.lock().unwrap().push(req.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Outcome(outcome)) => Ok(outcome),
            Some(Scripted::Error(message)) => anyhow::bail!("{message}"),
            None => anyhow::bail!("fake client script exhausted"),
        }
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, req: &ChatRequest) -> anyhow::Result<ChatOutcome> {
        self.pop(req)
    }

    async fn complete_stream(&self, req: &ChatRequest, sink: ChunkSink) -> anyhow::Result<String> {
        let outcome = self.pop(req)?;
        // Replay the scripted text as ordered chunks of growing prefix.
        let chars: Vec<char> = outcome.text.chars().collect();
        let mut end = 0;
        while end < chars.len() {
            end = (end + STREAM_CHUNK_CHARS).min(chars.len());
            let acc: String = chars[..end].iter().collect();
            sink(&acc);
        }
        Ok(outcome.text)
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
