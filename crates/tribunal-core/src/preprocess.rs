//! Preprocessing stage: one two-round exchange with the completion service.
//!
//! Round one declares the local `split_by_dot` capability; the service may
//! answer directly or request its invocation. Requested invocations run the
//! deterministic splitter locally and their results are fed back as tool
//! messages. Round two forces a structured summary, decoded safely with an
//! empty default. `original_content` is attached verbatim no matter what.

use crate::config::{PipelineConfig, SPLITTER_TEMPERATURE};
use crate::decode::safe_decode;
use crate::errors::ServiceError;
use crate::model::PreprocessedRecord;
use crate::providers::llm::{
    ChatMessage, ChatOutcome, ChatRequest, ChunkSink, LlmClient, ToolSpec,
};
use crate::split::split_sentences;
use crate::stream::{StreamBus, CHANNEL_SPLITTER};
use serde_json::json;
use std::sync::Arc;
use tokio::time::timeout;

pub const SPLIT_TOOL_NAME: &str = "split_by_dot";

const SYSTEM_PROMPT: &str = r#"# Splitter (Initial Screening)
You perform a light, deterministic pre-screen on an input passage.
1. Split the text into sentences by the `.` character only (trim whitespace, drop empties; no fancy NLP). You may call the split_by_dot tool to do this exactly.
2. topic: a short neutral line (5-12 words) summarizing the main subject.
3. keywords: 5-10 salient lowercase keywords or key phrases, deduplicated; multiword domain terms allowed.
4. good_sentences: 1-5 sentences copied verbatim from the split list that state a claim, give evidence, or give a concrete instruction/definition. Exclude filler.
Output STRICT JSON: {"topic": "...", "keywords": ["..."], "good_sentences": ["..."]}"#;

fn split_tool() -> ToolSpec {
    ToolSpec {
        name: SPLIT_TOOL_NAME,
        description: "Split text into sentences by '.' (with simple protections for '...' and \
                      digits). Return trimmed sentences.",
        parameters: json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "The full input text to split."}
            },
            "required": ["text"]
        }),
    }
}

/// Where the capability exchange landed after round one.
enum CapabilityRound {
    /// The service requested the capability; results are ready to feed back.
    Executed(Vec<ChatMessage>),
    /// The service chose to answer without it.
    Skipped,
}

pub struct Preprocessor {
    client: Arc<dyn LlmClient>,
    cfg: PipelineConfig,
}

impl Preprocessor {
    pub fn new(client: Arc<dyn LlmClient>, cfg: PipelineConfig) -> Self {
        Self { client, cfg }
    }

    /// Run the exchange and produce the record. Never fails: transport
    /// errors and undecodable answers degrade to the empty record with
    /// `original_content` intact.
    pub async fn run(&self, content: &str) -> PreprocessedRecord {
        match self.exchange(content, None).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "preprocessor degraded to empty record");
                PreprocessedRecord::empty(content)
            }
        }
    }

    /// Streaming variant: publishes the growing round-two text on the
    /// `splitter` channel and the decoded record on `done_splitter`.
    pub async fn run_streaming(&self, content: &str, bus: &StreamBus) -> PreprocessedRecord {
        let record = match self.exchange(content, Some(bus)).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "preprocessor degraded to empty record");
                PreprocessedRecord::empty(content)
            }
        };
        bus.done(
            CHANNEL_SPLITTER,
            serde_json::to_value(&record).unwrap_or(serde_json::Value::Null),
        );
        record
    }

    async fn exchange(
        &self,
        content: &str,
        bus: Option<&StreamBus>,
    ) -> anyhow::Result<PreprocessedRecord> {
        // Round one: the service decides whether to invoke the capability.
        let first_req = ChatRequest::new(&self.cfg.fast_model, SYSTEM_PROMPT)
            .user(content)
            .tools(vec![split_tool()])
            .temperature(SPLITTER_TEMPERATURE);
        let first = self.call(&first_req).await?;

        let round = self.execute_capability(content, &first);

        let mut messages = vec![
            ChatMessage::user(content),
            ChatMessage::assistant(first.text.clone(), first.tool_calls.clone()),
        ];
        if let CapabilityRound::Executed(tool_results) = round {
            messages.extend(tool_results);
        }

        // Round two: force the structured summary.
        let mut second_req = ChatRequest::new(&self.cfg.fast_model, SYSTEM_PROMPT)
            .json_mode()
            .temperature(SPLITTER_TEMPERATURE)
            .max_tokens(512);
        second_req.messages = messages;

        let answer = match bus {
            Some(bus) => {
                let bus = bus.clone();
                let sink: ChunkSink = Arc::new(move |acc: &str| bus.partial(CHANNEL_SPLITTER, acc));
                match timeout(
                    self.cfg.call_timeout,
                    self.client.complete_stream(&second_req, sink),
                )
                .await
                {
                    Ok(res) => res?,
                    Err(_) => return Err(ServiceError::Timeout(self.cfg.call_timeout).into()),
                }
            }
            None => self.call(&second_req).await?.text,
        };

        let mut record = safe_decode(&answer, PreprocessedRecord::default());
        record.original_content = content.to_string();
        Ok(record)
    }

    /// Execute any requested invocations of the declared capability.
    /// Unparseable arguments fall back to splitting the original text; an
    /// unknown capability name gets an error result so the conversation
    /// stays well-formed.
    fn execute_capability(&self, content: &str, outcome: &ChatOutcome) -> CapabilityRound {
        if outcome.tool_calls.is_empty() {
            return CapabilityRound::Skipped;
        }
        let mut results = Vec::new();
        for call in &outcome.tool_calls {
            if call.name != SPLIT_TOOL_NAME {
                tracing::warn!(tool = %call.name, "service requested undeclared capability");
                results.push(ChatMessage::tool(
                    call.id.clone(),
                    json!({"error": "unknown capability"}).to_string(),
                ));
                continue;
            }
            let args = safe_decode(&call.arguments, json!({}));
            let text = args
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or(content);
            let sentences = split_sentences(text);
            results.push(ChatMessage::tool(
                call.id.clone(),
                json!({"sentences": sentences}).to_string(),
            ));
        }
        CapabilityRound::Executed(results)
    }

    async fn call(&self, req: &ChatRequest) -> anyhow::Result<ChatOutcome> {
        match timeout(self.cfg.call_timeout, self.client.complete(req)).await {
            Ok(res) => res,
            Err(_) => Err(ServiceError::Timeout(self.cfg.call_timeout).into()),
        }
    }
}
