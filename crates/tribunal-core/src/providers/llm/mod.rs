//! Completion-service seam.
//!
//! Every remote judgment call in the pipeline goes through [`LlmClient`].
//! The service may answer directly, request invocation of a declared local
//! capability, or deliver its answer in ordered chunks; the trait surfaces
//! all three without committing callers to a transport.

pub mod fake;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

pub use fake::FakeClient;
pub use openai::OpenAiClient;

/// Called once per streamed chunk with the accumulated text so far.
/// Implementations must not block; they typically forward to a
/// [`crate::stream::StreamBus`].
pub type ChunkSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A local capability declared to the service.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON-schema object describing the parameters.
    pub parameters: serde_json::Value,
}

/// A capability-invocation request returned by the service.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text, not yet trusted to be valid JSON.
    pub arguments: String,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
    /// Set on `tool` messages to associate the result with its request.
    pub tool_call_id: Option<String>,
    /// Set on `assistant` messages that carried invocation requests.
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
            tool_call_id: None,
            tool_calls,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool",
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// One request to the completion service.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    /// Force a structured (JSON object) answer.
    pub json_mode: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            json_mode: false,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The service's answer for one round: assistant text plus any
/// capability-invocation requests.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One request/response round.
    async fn complete(&self, req: &ChatRequest) -> anyhow::Result<ChatOutcome>;

    /// Incremental-delivery round: `sink` sees the monotonically growing
    /// accumulated text once per chunk; the final accumulated text is
    /// returned. Tool requests are not supported in this mode.
    async fn complete_stream(&self, req: &ChatRequest, sink: ChunkSink) -> anyhow::Result<String>;

    fn provider_name(&self) -> &'static str;
}
