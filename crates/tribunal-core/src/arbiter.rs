//! Final arbitration: merge the rubric verdicts into one gated score.
//!
//! The numeric side (weighted aggregation, safety gate, global S1
//! deduction, conflict adjustment, diversity delta, clamping) is a pure
//! local function of the reviewer verdicts, so the gating guarantees hold no
//! matter what the completion service does. The service is consulted once,
//! chairman-style, for the narrative fields only; losing that call degrades
//! prose, never numbers.

use crate::config::{PipelineConfig, CHAIRMAN_TEMPERATURE};
use crate::decode::safe_decode;
use crate::model::{
    clamp_score, Adjustments, FinalVerdict, ReviewVerdict, ReviewerId, ReviewerScore, SafetyGate,
    SafetyLabel,
};
use crate::providers::llm::{ChatRequest, ChunkSink, LlmClient};
use crate::stream::{StreamBus, CHANNEL_CHAIRMAN};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::timeout;

/// Relative aggregation weights over the non-safety reviewers; renormalized
/// over whichever of them are present.
const AGGREGATION_WEIGHTS: [(ReviewerId, f64); 3] = [
    (ReviewerId::Lexical, 0.35),
    (ReviewerId::Depth, 0.40),
    (ReviewerId::Opinion, 0.25),
];

/// Applied exactly once when the safety label is S1 and no gate fires.
const S1_GLOBAL_DEDUCTION: f64 = 10.0;

/// A spread this wide between non-safety totals counts as material
/// disagreement.
const CONFLICT_SPREAD: f64 = 40.0;
const CONFLICT_ADJUSTMENT: f64 = -5.0;

/// Diversity calibration is bounded to this magnitude.
const DIVERSITY_DELTA_BOUND: f64 = 5.0;

const SYSTEM_PROMPT: &str = r#"# Chairman (Final Arbiter)
You receive structured outputs from up to four reviewers (lexical, depth, opinion, safety) plus an optional reference top-10 brief. The final score is computed mechanically elsewhere; you only write the narrative.
No chain-of-thought; do not re-score dimensions. Output STRICT JSON:
{"reason": "<=120 words, neutral, cites key strengths/weaknesses and any safety/diversity adjustments", "reason_conflicts": "short note if reviewer conflicts matter, else empty string", "calibration_notes": "one sentence relating the item to the top-10 patterns (diverse, duplicative, or neutral)", "diversity_delta": 0}"#;

/// Narrative fields the chairman call may contribute.
#[derive(Debug, Deserialize, Default)]
struct ChairmanNarrative {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    reason_conflicts: String,
    #[serde(default)]
    calibration_notes: String,
    #[serde(default)]
    diversity_delta: f64,
}

/// Result of the deterministic aggregation pass.
#[derive(Debug)]
struct Aggregate {
    score: f64,
    adjustments: Adjustments,
    conflict: bool,
}

/// Aggregation arithmetic. Pure; repeated runs on the same inputs
/// give the same result, and the S1 deduction is applied exactly once.
fn aggregate(verdicts: &BTreeMap<ReviewerId, ReviewVerdict>, diversity_delta: f64) -> Aggregate {
    let present: Vec<(f64, f64)> = AGGREGATION_WEIGHTS
        .iter()
        .filter_map(|(id, w)| verdicts.get(id).map(|v| (*w, v.score_total)))
        .collect();

    let weight_sum: f64 = present.iter().map(|(w, _)| w).sum();
    let base = if weight_sum > 0.0 {
        present.iter().map(|(w, s)| w * s).sum::<f64>() / weight_sum
    } else {
        // No non-safety reviewer made it; the safety score is the only
        // signal left.
        verdicts
            .get(&ReviewerId::Safety)
            .map(|v| v.score_total)
            .unwrap_or(0.0)
    };

    let scores: Vec<f64> = present.iter().map(|(_, s)| *s).collect();
    let spread = scores
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max)
        - scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let conflict = scores.len() >= 2 && spread > CONFLICT_SPREAD;
    let conflict_adjustment = if conflict { CONFLICT_ADJUSTMENT } else { 0.0 };

    let label = verdicts
        .get(&ReviewerId::Safety)
        .map(|v| v.label())
        .unwrap_or_default();
    let diversity_delta = diversity_delta.clamp(-DIVERSITY_DELTA_BOUND, DIVERSITY_DELTA_BOUND);

    let mut adjustments = Adjustments {
        safety_gate: SafetyGate {
            applied: false,
            label,
        },
        safety_s1_global_deduction: 0.0,
        conflict_adjustment,
        diversity_delta,
    };

    if label == SafetyLabel::S2 {
        adjustments.safety_gate.applied = true;
        return Aggregate {
            score: 0.0,
            adjustments,
            conflict,
        };
    }

    let mut score = base;
    if label == SafetyLabel::S1 {
        // One global caution on top of whatever safety's own score already
        // deducted internally.
        adjustments.safety_s1_global_deduction = S1_GLOBAL_DEDUCTION;
        score -= S1_GLOBAL_DEDUCTION;
    }
    score += conflict_adjustment + diversity_delta;

    Aggregate {
        score: clamp_score(score),
        adjustments,
        conflict,
    }
}

pub struct Arbiter {
    client: Arc<dyn LlmClient>,
    cfg: PipelineConfig,
}

impl Arbiter {
    pub fn new(client: Arc<dyn LlmClient>, cfg: PipelineConfig) -> Self {
        Self { client, cfg }
    }

    /// Merge the available verdicts into the final verdict. Missing
    /// reviewers renormalize the aggregation; they are never invented.
    pub async fn decide(
        &self,
        verdicts: &BTreeMap<ReviewerId, ReviewVerdict>,
        top10_context: Option<&str>,
    ) -> FinalVerdict {
        let narrative = self.narrative(verdicts, top10_context, None).await;
        self.assemble(verdicts, top10_context, narrative)
    }

    /// Streaming variant: chairman narrative partials on `chairman`,
    /// terminal verdict on `done_chairman`.
    pub async fn decide_streaming(
        &self,
        verdicts: &BTreeMap<ReviewerId, ReviewVerdict>,
        top10_context: Option<&str>,
        bus: &StreamBus,
    ) -> FinalVerdict {
        let narrative = self.narrative(verdicts, top10_context, Some(bus)).await;
        let verdict = self.assemble(verdicts, top10_context, narrative);
        bus.done(
            CHANNEL_CHAIRMAN,
            serde_json::to_value(&verdict).unwrap_or(serde_json::Value::Null),
        );
        verdict
    }

    async fn narrative(
        &self,
        verdicts: &BTreeMap<ReviewerId, ReviewVerdict>,
        top10_context: Option<&str>,
        bus: Option<&StreamBus>,
    ) -> ChairmanNarrative {
        let payload = json!({
            "reviews": verdicts.values().collect::<Vec<_>>(),
            "top10_context": top10_context,
        });
        let req = ChatRequest::new(&self.cfg.think_model, SYSTEM_PROMPT)
            .user(payload.to_string())
            .json_mode()
            .temperature(CHAIRMAN_TEMPERATURE);

        let answer = match bus {
            Some(bus) => {
                let sink_bus = bus.clone();
                let sink: ChunkSink =
                    Arc::new(move |acc: &str| sink_bus.partial(CHANNEL_CHAIRMAN, acc));
                timeout(self.cfg.call_timeout, self.client.complete_stream(&req, sink)).await
            }
            None => timeout(self.cfg.call_timeout, self.client.complete(&req))
                .await
                .map(|res| res.map(|outcome| outcome.text)),
        };

        match answer {
            Ok(Ok(text)) => safe_decode(&text, ChairmanNarrative::default()),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "chairman call failed; narrative degraded");
                ChairmanNarrative::default()
            }
            Err(_) => {
                tracing::warn!("chairman call timed out; narrative degraded");
                ChairmanNarrative::default()
            }
        }
    }

    fn assemble(
        &self,
        verdicts: &BTreeMap<ReviewerId, ReviewVerdict>,
        top10_context: Option<&str>,
        narrative: ChairmanNarrative,
    ) -> FinalVerdict {
        let diversity_delta = if top10_context.is_some() {
            narrative.diversity_delta
        } else {
            0.0
        };
        let agg = aggregate(verdicts, diversity_delta);

        let per_reviewer: BTreeMap<String, ReviewerScore> = verdicts
            .iter()
            .map(|(id, v)| {
                (
                    id.as_str().to_string(),
                    ReviewerScore {
                        score: v.score_total,
                        confidence: v.confidence,
                    },
                )
            })
            .collect();

        let reason = if narrative.reason.is_empty() {
            fallback_reason(&agg, verdicts.len())
        } else {
            narrative.reason
        };
        // Non-empty only when disagreement actually affected aggregation.
        let reason_conflicts = if agg.conflict {
            if narrative.reason_conflicts.is_empty() {
                "Reviewer totals disagreed widely; a conflict adjustment was applied.".to_string()
            } else {
                narrative.reason_conflicts
            }
        } else {
            String::new()
        };
        let calibration_notes = if top10_context.is_none() {
            "No reference set provided; diversity calibration skipped.".to_string()
        } else if narrative.calibration_notes.is_empty() {
            "Reference set supplied; no calibration narrative available.".to_string()
        } else {
            narrative.calibration_notes
        };

        FinalVerdict {
            score_total: agg.score,
            reason,
            per_reviewer,
            adjustments: agg.adjustments,
            reason_conflicts,
            calibration_notes,
        }
    }
}

fn fallback_reason(agg: &Aggregate, reviewer_count: usize) -> String {
    if agg.adjustments.safety_gate.applied {
        return "Safety gate applied: an S2 violation forces the final score to zero.".to_string();
    }
    let mut reason = format!(
        "Aggregated {reviewer_count} reviewer verdict(s) into a weighted score of {:.0}.",
        agg.score
    );
    if agg.adjustments.safety_s1_global_deduction > 0.0 {
        reason.push_str(" A global S1 safety deduction of 10 points was applied.");
    }
    if agg.conflict {
        reason.push_str(" Reviewer disagreement triggered a conflict adjustment.");
    }
    reason
}
