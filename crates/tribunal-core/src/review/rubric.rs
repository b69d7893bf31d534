//! The four fixed rubric configurations. One evaluation contract, four sets
//! of dimensions, weights, penalty schedules and instructions; the exact
//! instruction wording is opaque configuration carried over from the
//! production prompts.

use crate::model::ReviewerId;

pub struct RubricConfig {
    pub id: ReviewerId,
    /// Scoring dimensions and their weights. Weights sum to 100; empty for
    /// the safety rubric, which starts at 100 and subtracts per category.
    pub dimensions: &'static [(&'static str, u32)],
    /// Most negative total the penalty schedule may reach, where the rubric
    /// has one.
    pub penalty_floor: Option<f64>,
    pub system_prompt: &'static str,
}

pub fn config_for(id: ReviewerId) -> &'static RubricConfig {
    match id {
        ReviewerId::Lexical => &LEXICAL,
        ReviewerId::Depth => &DEPTH,
        ReviewerId::Opinion => &OPINION,
        ReviewerId::Safety => &SAFETY,
    }
}

pub static LEXICAL: RubricConfig = RubricConfig {
    id: ReviewerId::Lexical,
    dimensions: &[
        ("coherence_structure", 40),
        ("clarity_precision", 25),
        ("flow_transitions", 15),
        ("lexical_appropriateness", 10),
        ("concision_nonredundancy", 10),
    ],
    penalty_floor: None,
    system_prompt: r#"# Lexical & Coherence Reviewer
You assess how well a passage communicates its ideas regardless of style. Judge coherence, structure, flow, clarity, lexical appropriateness and concision. Do not fact-check or judge ideological stance; you may flag internal contradictions.
Grading is style-agnostic: reward clarity, logical order, smooth transitions, purposeful word choice; penalize rambling, incoherent jumps, redundancy, vague wording. Length must not inflate scores.
Dimensions & weights (total 100): coherence_structure 0-40, clarity_precision 0-25, flow_transitions 0-15, lexical_appropriateness 0-10, concision_nonredundancy 0-10.
Output STRICT JSON:
{"dimension_scores": {"coherence_structure": 0, "clarity_precision": 0, "flow_transitions": 0, "lexical_appropriateness": 0, "concision_nonredundancy": 0}, "score_total": 0, "reason": "one short style-agnostic paragraph", "confidence": 0.0}"#,
};

pub static DEPTH: RubricConfig = RubricConfig {
    id: ReviewerId::Depth,
    dimensions: &[
        ("specificity_evidence", 25),
        ("causal_mechanism", 25),
        ("analytical_rigor", 20),
        ("novel_perspective", 20),
        ("implications_actionability", 10),
    ],
    penalty_floor: Some(-30.0),
    system_prompt: r#"# Content-Depth Reviewer
You evaluate how substantive and insightful a passage is. Depth = specifics + mechanisms + consequences, never fancy words. Reward concrete reasoning, mechanism-level analysis, evidence, stated assumptions, counterpoints and testable implications; penalize vagueness, buzzword salad, unfalsifiable platitudes and evidence-free grandstanding. Short but sharp content can score high.
Dimensions & weights (total 100): specificity_evidence 0-25, causal_mechanism 0-25, analytical_rigor 0-20, novel_perspective 0-20, implications_actionability 0-10.
Red-flag penalties apply after the weighted sum, total floor -30: vagueness/platitude -5 to -15, buzzword salad -5 to -15, unfalsifiable/non-committal -5 to -10, evidence-free grandstanding -5 to -10.
Output STRICT JSON:
{"dimension_scores": {"specificity_evidence": 0, "causal_mechanism": 0, "analytical_rigor": 0, "novel_perspective": 0, "implications_actionability": 0}, "red_flags": [{"type": "string", "points": 0, "quote": "...", "note": "string"}], "score_total": 0, "reason": "one concise paragraph with brief evidence quotes", "confidence": 0.0}"#,
};

pub static OPINION: RubricConfig = RubricConfig {
    id: ReviewerId::Opinion,
    dimensions: &[
        ("respect_civility", 30),
        ("non_discrimination", 25),
        ("balance_pluralism", 20),
        ("constructive_framing", 15),
        ("responsible_influence", 10),
    ],
    penalty_floor: Some(-20.0),
    system_prompt: r#"# Public-Opinion Reviewer
You assess how a passage guides public opinion on a free-expression platform: constructiveness, respect, non-discrimination, civic responsibility. Free discussion and criticism of institutions are allowed; strongly one-sided but civil and reasoned text can still score well. Penalize slurs, dehumanization, stereotyping, harassment, glorification of violence, coercion, or manipulative rhetoric. Do not judge factual correctness beyond obvious harm signals.
Dimensions & weights (total 100): respect_civility 0-30, non_discrimination 0-25, balance_pluralism 0-20, constructive_framing 0-15, responsible_influence 0-10.
Penalties apply after the weighted sum, total floor -20: hate/stereotype cue -5 to -20, harassment/insult -5 to -15, violence/incitement cue -10 to -20, manipulative propaganda tactics -5 to -10.
Output STRICT JSON:
{"dimension_scores": {"respect_civility": 0, "non_discrimination": 0, "balance_pluralism": 0, "constructive_framing": 0, "responsible_influence": 0}, "penalties": [{"type": "string", "points": 0, "note": "string"}], "score_total": 0, "reason": "one concise paragraph with short quotes", "confidence": 0.0}"#,
};

pub static SAFETY: RubricConfig = RubricConfig {
    id: ReviewerId::Safety,
    dimensions: &[],
    penalty_floor: None,
    system_prompt: r#"# Safety Reviewer
You analyze a passage for safety risks and policy-relevant harms. Classify and score risk with short cited evidence; do not rewrite content or enforce actions.
Scope: hate/harassment, violence/incitement, extremism, self-harm/suicide, sexual content (zero tolerance for minors), criminal activity/weapons, illicit drugs, privacy/PII abuse, fraud/scams/malware, dangerous advice.
Severity labels: S0 safe, S1 borderline (heated or suggestive risk without direct calls/instructions), S2 unsafe (clear violations).
Scoring (0-100, higher = safer): start at 100; deduct per category (borderline -5 to -20, unsafe -30 to -100). If any S2 involves minors, explicit violence incitement, or self-harm encouragement, set score_total = 0. Clip to [0, 100].
Historical or clearly non-endorsing discussion of unsafe topics is allowed; news reporting of violence is allowed absent praise or recruitment cues.
Output STRICT JSON:
{"safety_label": "S0", "categories": [{"name": "string", "severity": "none|borderline|unsafe", "deduction": 0, "evidence": ["short quote"], "note": "brief rationale"}], "score_total": 100, "reason": "neutral summary of findings", "confidence": 0.0}"#,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_rubric_dimensions_sum_to_100() {
        for id in [ReviewerId::Lexical, ReviewerId::Depth, ReviewerId::Opinion] {
            let cfg = config_for(id);
            let total: u32 = cfg.dimensions.iter().map(|(_, w)| w).sum();
            assert_eq!(total, 100, "{id} weights");
        }
        assert!(config_for(ReviewerId::Safety).dimensions.is_empty());
    }

    #[test]
    fn penalty_floors_match_schedule() {
        assert_eq!(config_for(ReviewerId::Lexical).penalty_floor, None);
        assert_eq!(config_for(ReviewerId::Depth).penalty_floor, Some(-30.0));
        assert_eq!(config_for(ReviewerId::Opinion).penalty_floor, Some(-20.0));
    }
}
