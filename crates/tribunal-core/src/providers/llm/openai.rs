//! Client for any OpenAI-compatible chat-completions endpoint.

use super::{ChatOutcome, ChatRequest, ChunkSink, LlmClient, ToolCall};
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde_json::json;
use tokio_stream::StreamExt;

pub struct OpenAiClient {
    pub base_url: String,
    pub api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn body(&self, req: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut messages = vec![json!({"role": "system", "content": req.system})];
        for m in &req.messages {
            let mut msg = json!({"role": m.role, "content": m.content});
            if !m.tool_calls.is_empty() {
                msg["tool_calls"] = m
                    .tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.arguments},
                        })
                    })
                    .collect();
            }
            if let Some(id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(id);
            }
            messages.push(msg);
        }

        let mut body = json!({
            "model": req.model,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });
        if !req.tools.is_empty() {
            body["tools"] = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                })
                .collect();
            body["tool_choice"] = json!("auto");
        }
        if req.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn post(&self, body: &serde_json::Value) -> anyhow::Result<reqwest::Response> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            // Some compatible gateways authenticate on this header instead;
            // the upstream API ignores it.
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(ServiceError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(resp)
    }
}

fn parse_tool_calls(message: &serde_json::Value) -> Vec<ToolCall> {
    message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    Some(ToolCall {
                        id: c.get("id")?.as_str()?.to_string(),
                        name: c.pointer("/function/name")?.as_str()?.to_string(),
                        arguments: c
                            .pointer("/function/arguments")
                            .and_then(|a| a.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, req: &ChatRequest) -> anyhow::Result<ChatOutcome> {
        let resp = self.post(&self.body(req, false)).await?;
        let json: serde_json::Value = resp.json().await.map_err(ServiceError::Transport)?;

        let message = json
            .pointer("/choices/0/message")
            .ok_or(ServiceError::MissingContent)?;
        let text = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let tool_calls = parse_tool_calls(message);

        if text.is_empty() && tool_calls.is_empty() {
            return Err(ServiceError::MissingContent.into());
        }
        Ok(ChatOutcome { text, tool_calls })
    }

    async fn complete_stream(&self, req: &ChatRequest, sink: ChunkSink) -> anyhow::Result<String> {
        let resp = self.post(&self.body(req, true)).await?;

        let mut acc = String::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ServiceError::Transport)?;
            pending.extend_from_slice(&chunk);

            // SSE frames are newline-delimited; a frame may span chunks.
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    continue;
                }
                let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
                    continue;
                };
                if let Some(delta) = event
                    .pointer("/choices/0/delta/content")
                    .and_then(|v| v.as_str())
                {
                    if !delta.is_empty() {
                        acc.push_str(delta);
                        sink(&acc);
                    }
                }
            }
        }
        Ok(acc)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_declares_tools_and_json_mode() {
        let client = OpenAiClient::new("https://example.test/v1/", "k");
        let req = ChatRequest::new("fast-model", "sys")
            .user("content")
            .tools(vec![super::super::ToolSpec {
                name: "split_by_dot",
                description: "split",
                parameters: json!({"type": "object"}),
            }])
            .json_mode();
        let body = client.body(&req, false);

        assert_eq!(body["model"], "fast-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "content");
        assert_eq!(body["tools"][0]["function"]["name"], "split_by_dot");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn tool_round_trip_messages_serialize_with_ids() {
        let client = OpenAiClient::new("https://example.test/v1", "k");
        let call = ToolCall {
            id: "call_1".into(),
            name: "split_by_dot".into(),
            arguments: r#"{"text":"a. b"}"#.into(),
        };
        let mut req = ChatRequest::new("m", "sys");
        req.messages = vec![
            super::super::ChatMessage::user("a. b"),
            super::super::ChatMessage::assistant("", vec![call.clone()]),
            super::super::ChatMessage::tool("call_1", r#"{"sentences":["a","b"]}"#),
        ];
        let body = client.body(&req, false);

        assert_eq!(body["messages"][2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            body["messages"][2]["tool_calls"][0]["function"]["name"],
            "split_by_dot"
        );
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
    }

    #[test]
    fn parse_tool_calls_tolerates_malformed_entries() {
        let message = json!({
            "tool_calls": [
                {"id": "call_1", "function": {"name": "split_by_dot", "arguments": "{}"}},
                {"function": {"name": "no_id"}},
                {"id": "call_2"}
            ]
        });
        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
    }
}
