//! End-to-end pipeline scenarios over a scripted completion service.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex;
use tribunal_core::model::SafetyLabel;
use tribunal_core::providers::llm::{ChatOutcome, ChatRequest, ChunkSink, LlmClient};
use tribunal_core::split::split_sentences;
use tribunal_core::{Pipeline, PipelineConfig, StreamBus};

const HABIT_LOOP: &str =
    "We propose a simple daily habit loop. First, track one measurable action. Then review weekly.";

/// Routes each call by a marker in the system prompt, so concurrent
/// reviewers each get their own scripted answer regardless of scheduling.
struct RoutedClient {
    routes: Vec<(&'static str, String)>,
    calls: Mutex<Vec<String>>,
}

impl RoutedClient {
    fn new(routes: Vec<(&'static str, String)>) -> Self {
        Self {
            routes,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn route(&self, req: &ChatRequest) -> anyhow::Result<String> {
        for (marker, response) in &self.routes {
            if req.system.contains(marker) {
                self.calls.lock().unwrap().push((*marker).to_string());
                return Ok(response.clone());
            }
        }
        anyhow::bail!("no scripted route for this request")
    }
}

#[async_trait]
impl LlmClient for RoutedClient {
    async fn complete(&self, req: &ChatRequest) -> anyhow::Result<ChatOutcome> {
        Ok(ChatOutcome {
            text: self.route(req)?,
            tool_calls: Vec::new(),
        })
    }

    async fn complete_stream(&self, req: &ChatRequest, sink: ChunkSink) -> anyhow::Result<String> {
        let text = self.route(req)?;
        sink(&text);
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "routed"
    }
}

fn reviewer_json(score: f64) -> String {
    json!({"dimension_scores": {}, "score_total": score, "reason": "scripted", "confidence": 0.8})
        .to_string()
}

fn routes(safety: String) -> Vec<(&'static str, String)> {
    vec![
        (
            "Splitter",
            json!({
                "topic": "simple daily habit tracking and review",
                "keywords": ["habit loop", "measurable action", "weekly review"],
                "good_sentences": [
                    "We propose a simple daily habit loop",
                    "First, track one measurable action"
                ]
            })
            .to_string(),
        ),
        ("Lexical & Coherence", reviewer_json(95.0)),
        ("Content-Depth", reviewer_json(95.0)),
        ("Public-Opinion", reviewer_json(95.0)),
        ("Safety Reviewer", safety),
        (
            "Chairman",
            json!({
                "reason": "Coherent, concrete, and safe.",
                "reason_conflicts": "",
                "calibration_notes": "",
                "diversity_delta": 0
            })
            .to_string(),
        ),
    ]
}

#[test]
fn splitter_yields_exactly_three_units_for_habit_loop() {
    let units = split_sentences(HABIT_LOOP);
    assert_eq!(units.len(), 3);
}

#[tokio::test]
async fn habit_loop_flows_end_to_end() {
    let safety = json!({
        "safety_label": "S0", "categories": [], "score_total": 100,
        "reason": "safe", "confidence": 0.9
    })
    .to_string();
    let client = Arc::new(RoutedClient::new(routes(safety)));
    let pipeline = Pipeline::new(client.clone(), PipelineConfig::default());

    let verdict = pipeline.score(HABIT_LOOP).await;

    assert!((verdict.score_total - 95.0).abs() < 1e-9);
    assert!(!verdict.adjustments.safety_gate.applied);
    assert_eq!(verdict.reason, "Coherent, concrete, and safe.");
    assert_eq!(verdict.reason_conflicts, "");
    assert_eq!(verdict.per_reviewer.len(), 4);
    assert_eq!(verdict.per_reviewer["safety"].score, 100.0);

    // Strict stage ordering: both splitter rounds first, chairman last,
    // reviewers in between in some interleaving.
    let calls = client.calls.lock().unwrap();
    assert_eq!(&calls[..2], ["Splitter", "Splitter"]);
    assert_eq!(calls.last().map(String::as_str), Some("Chairman"));
    assert_eq!(calls.len(), 7);
}

#[tokio::test]
async fn preprocessor_good_sentences_are_subset_of_split_units() {
    let safety = json!({"safety_label": "S0", "categories": [], "score_total": 100}).to_string();
    let client = Arc::new(RoutedClient::new(routes(safety)));
    let pipeline = Pipeline::new(client, PipelineConfig::default());
    let (bus, mut rx) = StreamBus::new();

    pipeline.score_streaming(HABIT_LOOP, &bus).await;
    drop(bus);

    let units = split_sentences(HABIT_LOOP);
    let mut checked = false;
    while let Some(event) = rx.recv().await {
        if event.channel != "done_splitter" {
            continue;
        }
        let tribunal_core::stream::StreamPayload::Json(record) = event.payload else {
            panic!("terminal splitter payload must be structured");
        };
        assert_eq!(record["original_content"], HABIT_LOOP);
        for sentence in record["good_sentences"].as_array().unwrap() {
            assert!(units.contains(&sentence.as_str().unwrap().to_string()));
        }
        checked = true;
    }
    assert!(checked, "no done_splitter event observed");
}

#[tokio::test]
async fn s2_safety_verdict_zeroes_unanimous_95s() {
    let safety = json!({
        "safety_label": "S2",
        "categories": [
            {"name": "Violence/Incitement", "severity": "unsafe", "deduction": -100,
             "evidence": ["quote"], "note": "explicit call to harm"}
        ],
        "score_total": 0, "reason": "unsafe", "confidence": 0.95
    })
    .to_string();
    let client = Arc::new(RoutedClient::new(routes(safety)));
    let pipeline = Pipeline::new(client, PipelineConfig::default());

    let verdict = pipeline.score("some content").await;

    assert_eq!(verdict.score_total, 0.0);
    assert!(verdict.adjustments.safety_gate.applied);
    assert_eq!(verdict.adjustments.safety_gate.label, SafetyLabel::S2);
}

#[tokio::test]
async fn s1_safety_verdict_deducts_ten_once() {
    let safety = json!({
        "safety_label": "S1",
        "categories": [
            {"name": "Dangerous Advice", "severity": "borderline", "deduction": -10}
        ],
        "score_total": 90, "reason": "borderline", "confidence": 0.7
    })
    .to_string();
    let client = Arc::new(RoutedClient::new(routes(safety)));
    let pipeline = Pipeline::new(client, PipelineConfig::default());

    let verdict = pipeline.score("some content").await;

    assert!((verdict.score_total - 85.0).abs() < 1e-9);
    assert_eq!(verdict.adjustments.safety_s1_global_deduction, 10.0);
    assert!(!verdict.adjustments.safety_gate.applied);
}

#[tokio::test]
async fn streaming_run_emits_every_stage_terminal_marker() {
    let safety = json!({"safety_label": "S0", "categories": [], "score_total": 100}).to_string();
    let client = Arc::new(RoutedClient::new(routes(safety)));
    let pipeline = Pipeline::new(client, PipelineConfig::default());
    let (bus, mut rx) = StreamBus::new();

    pipeline.score_streaming(HABIT_LOOP, &bus).await;
    drop(bus);

    let mut terminals = Vec::new();
    while let Some(event) = rx.recv().await {
        if event.terminal {
            terminals.push(event.channel);
        }
    }
    for expected in [
        "done_splitter",
        "done_reviewer:lexical",
        "done_reviewer:depth",
        "done_reviewer:opinion",
        "done_reviewer:safety",
        "done_chairman",
    ] {
        assert!(
            terminals.contains(&expected.to_string()),
            "missing terminal {expected}"
        );
    }
    // Exactly one terminal per stage.
    assert_eq!(terminals.len(), 6);
}
