//! Data model shared across pipeline stages. Every type here is produced by
//! exactly one stage and handed off immutably to the next.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical reviewer identities. The original service used several ad-hoc
/// labels for the same reviewer across layers; [`ReviewerId::parse`] accepts
/// all of them so the join barrier never drops a mismatched tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReviewerId {
    Lexical,
    Depth,
    Opinion,
    Safety,
}

impl ReviewerId {
    pub const ALL: [ReviewerId; 4] = [
        ReviewerId::Lexical,
        ReviewerId::Depth,
        ReviewerId::Opinion,
        ReviewerId::Safety,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewerId::Lexical => "lexical",
            ReviewerId::Depth => "depth",
            ReviewerId::Opinion => "opinion",
            ReviewerId::Safety => "safety",
        }
    }

    /// Channel tag on the streaming multiplexer for this reviewer.
    pub fn channel(&self) -> String {
        format!("reviewer:{}", self.as_str())
    }

    pub fn parse(tag: &str) -> Option<ReviewerId> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "lexical" | "lexicalagent" | "lexical_coherence" | "lexical/coherence" => {
                Some(ReviewerId::Lexical)
            }
            "depth" | "thinkdepthagent" | "content_depth" | "content-depth" => {
                Some(ReviewerId::Depth)
            }
            "opinion" | "publicinfagent" | "publicinfluenceagent" | "public_opinion"
            | "public-opinion" => Some(ReviewerId::Opinion),
            "safety" | "safetyagent" => Some(ReviewerId::Safety),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the preprocessing stage. `original_content` always carries the
/// submission verbatim, even when the derived fields are empty because the
/// service answer could not be decoded.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PreprocessedRecord {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub good_sentences: Vec<String>,
    #[serde(default)]
    pub original_content: String,
}

impl PreprocessedRecord {
    /// The degenerate record: empty derived fields, content preserved.
    pub fn empty(original_content: &str) -> Self {
        Self {
            original_content: original_content.to_string(),
            ..Self::default()
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.topic.is_empty() && self.keywords.is_empty() && self.good_sentences.is_empty()
    }
}

/// Safety severity labels, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum SafetyLabel {
    #[default]
    S0,
    S1,
    S2,
}

/// Severity of a single safety category finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Borderline,
    Unsafe,
}

/// One per-category finding from the safety reviewer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetyCategory {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub deduction: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl SafetyCategory {
    /// Zero-tolerance violations: an unsafe finding touching minors,
    /// incitement to violence, or self-harm encouragement forces the safety
    /// score to zero.
    pub fn forces_zero(&self) -> bool {
        if self.severity != Severity::Unsafe {
            return false;
        }
        let name = self.name.to_ascii_lowercase();
        ["minor", "violence", "incitement", "self-harm", "self_harm", "suicide"]
            .iter()
            .any(|needle| name.contains(needle))
    }
}

/// A penalty or red-flag entry attached to a rubric verdict.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Penalty {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub points: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub quote: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// One reviewer's verdict. The safety reviewer additionally populates
/// `safety_label` and `categories`; the depth and opinion reviewers populate
/// `red_flags`/`penalties`. Fields the service omits decode to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReviewVerdict {
    #[serde(default)]
    pub dimension_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub score_total: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(rename = "Expert", default)]
    pub expert: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub penalties: Vec<Penalty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red_flags: Vec<Penalty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_label: Option<SafetyLabel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<SafetyCategory>,
}

impl ReviewVerdict {
    /// The all-zero fallback verdict for a reviewer whose service call
    /// failed, timed out, or returned undecodable output.
    pub fn zero(id: ReviewerId) -> Self {
        Self {
            expert: id.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn reviewer(&self) -> Option<ReviewerId> {
        ReviewerId::parse(&self.expert)
    }

    pub fn label(&self) -> SafetyLabel {
        self.safety_label.unwrap_or_default()
    }
}

/// Score gate/adjustment record on the final verdict.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetyGate {
    pub applied: bool,
    pub label: SafetyLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Adjustments {
    pub safety_gate: SafetyGate,
    #[serde(rename = "safety_S1_global_deduction")]
    pub safety_s1_global_deduction: f64,
    pub conflict_adjustment: f64,
    pub diversity_delta: f64,
}

/// Per-reviewer entry on the final verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ReviewerScore {
    pub score: f64,
    pub confidence: f64,
}

/// Terminal artifact of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FinalVerdict {
    #[serde(default)]
    pub score_total: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub per_reviewer: BTreeMap<String, ReviewerScore>,
    #[serde(default)]
    pub adjustments: Adjustments,
    #[serde(default)]
    pub reason_conflicts: String,
    #[serde(default)]
    pub calibration_notes: String,
}

/// Clamp a score to the canonical `[0, 100]` range.
pub fn clamp_score(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}
