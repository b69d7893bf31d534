//! Rubric evaluation stage: one contract, four configurations.
//!
//! Each reviewer sends the preprocessed record (or the raw content when the
//! record is degenerate) to the completion service under its rubric
//! instructions, safe-decodes the verdict, and enforces the local
//! guarantees the service cannot be trusted with: identity tag, score
//! clamping, and the safety zero-tolerance override.

pub mod rubric;

use crate::config::{PipelineConfig, REVIEWER_TEMPERATURE};
use crate::decode::safe_decode;
use crate::errors::ServiceError;
use crate::model::{clamp_score, PreprocessedRecord, ReviewVerdict, ReviewerId, SafetyLabel};
use crate::providers::llm::{ChatRequest, ChunkSink, LlmClient};
use crate::stream::StreamBus;
use rubric::RubricConfig;
use std::sync::Arc;
use tokio::time::timeout;

pub struct Reviewer {
    config: &'static RubricConfig,
    client: Arc<dyn LlmClient>,
    cfg: PipelineConfig,
}

impl Reviewer {
    pub fn new(id: ReviewerId, client: Arc<dyn LlmClient>, cfg: PipelineConfig) -> Self {
        Self {
            config: rubric::config_for(id),
            client,
            cfg,
        }
    }

    pub fn id(&self) -> ReviewerId {
        self.config.id
    }

    /// Evaluate the record. Never fails: transport errors, timeouts and
    /// undecodable output all yield the finalized all-zero verdict.
    pub async fn evaluate(&self, record: &PreprocessedRecord) -> ReviewVerdict {
        let req = self.request(record);
        let answer = match timeout(self.cfg.call_timeout, self.client.complete(&req)).await {
            Ok(Ok(outcome)) => outcome.text,
            Ok(Err(err)) => {
                tracing::warn!(reviewer = %self.id(), error = %err, "review call failed");
                return self.finalize(ReviewVerdict::zero(self.id()));
            }
            Err(_) => {
                tracing::warn!(reviewer = %self.id(), "review call timed out");
                return self.finalize(ReviewVerdict::zero(self.id()));
            }
        };
        self.finalize(safe_decode(&answer, ReviewVerdict::zero(self.id())))
    }

    /// Streaming variant: partial answers on `reviewer:<id>`, terminal
    /// decoded verdict on `done_reviewer:<id>`.
    pub async fn evaluate_streaming(
        &self,
        record: &PreprocessedRecord,
        bus: &StreamBus,
    ) -> ReviewVerdict {
        let req = self.request(record);
        let channel = self.id().channel();
        let sink_bus = bus.clone();
        let sink_channel = channel.clone();
        let sink: ChunkSink = Arc::new(move |acc: &str| sink_bus.partial(&sink_channel, acc));

        let verdict = match timeout(
            self.cfg.call_timeout,
            self.client.complete_stream(&req, sink),
        )
        .await
        {
            Ok(Ok(answer)) => {
                self.finalize(safe_decode(&answer, ReviewVerdict::zero(self.id())))
            }
            Ok(Err(err)) => {
                tracing::warn!(reviewer = %self.id(), error = %err, "review stream failed");
                self.finalize(ReviewVerdict::zero(self.id()))
            }
            Err(_) => {
                let err = ServiceError::Timeout(self.cfg.call_timeout);
                tracing::warn!(reviewer = %self.id(), error = %err, "review stream timed out");
                self.finalize(ReviewVerdict::zero(self.id()))
            }
        };
        bus.done(
            &channel,
            serde_json::to_value(&verdict).unwrap_or(serde_json::Value::Null),
        );
        verdict
    }

    fn request(&self, record: &PreprocessedRecord) -> ChatRequest {
        // A degenerate record adds nothing over the raw submission.
        let content = if record.is_degenerate() {
            record.original_content.clone()
        } else {
            serde_json::to_string(record).unwrap_or_else(|_| record.original_content.clone())
        };
        ChatRequest::new(&self.cfg.fast_model, self.config.system_prompt)
            .user(content)
            .json_mode()
            .temperature(REVIEWER_TEMPERATURE)
    }

    /// Local guarantees applied to whatever the service sent back.
    fn finalize(&self, mut verdict: ReviewVerdict) -> ReviewVerdict {
        verdict.expert = self.id().as_str().to_string();

        if let Some(floor) = self.config.penalty_floor {
            let applied: f64 = verdict
                .penalties
                .iter()
                .chain(&verdict.red_flags)
                .map(|p| p.points.min(0.0))
                .sum();
            if applied < floor {
                tracing::debug!(reviewer = %self.id(), applied, floor, "penalties exceed schedule floor");
            }
        }

        if self.id() == ReviewerId::Safety {
            verdict.safety_label = Some(verdict.label());
            if verdict.categories.iter().any(|c| c.forces_zero()) {
                verdict.score_total = 0.0;
                verdict.safety_label = Some(SafetyLabel::S2);
            }
        }

        verdict.score_total = clamp_score(verdict.score_total);
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::FakeClient;
    use serde_json::json;

    fn record() -> PreprocessedRecord {
        PreprocessedRecord {
            topic: "t".into(),
            keywords: vec!["k".into()],
            good_sentences: vec!["s".into()],
            original_content: "content".into(),
        }
    }

    fn reviewer(id: ReviewerId, fake: FakeClient) -> Reviewer {
        Reviewer::new(id, Arc::new(fake), PipelineConfig::default())
    }

    #[tokio::test]
    async fn verdict_is_tagged_with_producing_reviewer() {
        // Service claims a different identity; the tag is overwritten.
        let fake = FakeClient::new()
            .push_text(json!({"score_total": 80, "Expert": "SafetyAgent"}).to_string());
        let v = reviewer(ReviewerId::Lexical, fake).evaluate(&record()).await;
        assert_eq!(v.reviewer(), Some(ReviewerId::Lexical));
        assert_eq!(v.score_total, 80.0);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_clamped() {
        let fake = FakeClient::new().push_text(json!({"score_total": 140}).to_string());
        let v = reviewer(ReviewerId::Depth, fake).evaluate(&record()).await;
        assert_eq!(v.score_total, 100.0);

        let fake = FakeClient::new().push_text(json!({"score_total": -12}).to_string());
        let v = reviewer(ReviewerId::Opinion, fake).evaluate(&record()).await;
        assert_eq!(v.score_total, 0.0);
    }

    #[tokio::test]
    async fn malformed_response_yields_zero_default_in_range() {
        let fake = FakeClient::new().push_text("no json here at all");
        let v = reviewer(ReviewerId::Depth, fake).evaluate(&record()).await;
        assert_eq!(v.score_total, 0.0);
        assert_eq!(v.reviewer(), Some(ReviewerId::Depth));
        assert!(v.reason.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_yields_zero_default() {
        let fake = FakeClient::new().push_error("boom");
        let v = reviewer(ReviewerId::Safety, fake).evaluate(&record()).await;
        assert_eq!(v.score_total, 0.0);
        assert_eq!(v.label(), SafetyLabel::S0);
    }

    #[tokio::test]
    async fn safety_zero_tolerance_category_forces_zero() {
        let fake = FakeClient::new().push_text(
            json!({
                "safety_label": "S1",
                "score_total": 70,
                "categories": [
                    {"name": "Self-harm/Suicide", "severity": "unsafe", "deduction": -30}
                ]
            })
            .to_string(),
        );
        let v = reviewer(ReviewerId::Safety, fake).evaluate(&record()).await;
        assert_eq!(v.score_total, 0.0);
        assert_eq!(v.label(), SafetyLabel::S2);
    }

    #[tokio::test]
    async fn degenerate_record_sends_raw_content() {
        let fake = FakeClient::new().push_text(json!({"score_total": 50}).to_string());
        let client = Arc::new(fake);
        let r = Reviewer::new(ReviewerId::Lexical, client.clone(), PipelineConfig::default());
        r.evaluate(&PreprocessedRecord::empty("raw text only")).await;

        let requests = client.take_requests();
        assert_eq!(requests[0].messages[0].content, "raw text only");
    }

    #[tokio::test]
    async fn streaming_emits_ordered_partials_then_terminal() {
        let fake = FakeClient::new()
            .push_text(json!({"score_total": 66, "reason": "solid enough overall"}).to_string());
        let r = reviewer(ReviewerId::Opinion, fake);
        let (bus, mut rx) = StreamBus::new();

        let v = r.evaluate_streaming(&record(), &bus).await;
        assert_eq!(v.score_total, 66.0);
        drop(bus);

        let mut last_partial = String::new();
        let mut saw_terminal = false;
        while let Some(event) = rx.recv().await {
            if event.terminal {
                assert_eq!(event.channel, "done_reviewer:opinion");
                saw_terminal = true;
            } else {
                assert_eq!(event.channel, "reviewer:opinion");
                assert!(!saw_terminal, "partial after terminal");
                if let crate::stream::StreamPayload::Text(text) = event.payload {
                    assert!(text.starts_with(&last_partial));
                    last_partial = text;
                }
            }
        }
        assert!(saw_terminal);
    }
}
