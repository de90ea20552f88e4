//! Explainability Recorder (C9): for every primary assignment the
//! generator selects, builds a `DecisionExplanation` capturing why that
//! person won over the other eligible candidates, plus a SHA-256 audit
//! hash so the record can't be silently altered after the fact.

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constraints::{ConstraintKind, Severity};

/// Confidence tier derived from `confidence_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

fn level_for_score(score: f64) -> ConfidenceLevel {
    if score >= 0.7 {
        ConfidenceLevel::High
    } else if score >= 0.4 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// One constraint's outcome against the selected candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintEvaluation {
    pub name: String,
    pub kind: ConstraintKind,
    pub satisfied: bool,
    pub weight: f64,
    pub penalty: f64,
    pub details: serde_json::Value,
}

/// A candidate who was eligible but not selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeCandidate {
    pub person_id: Uuid,
    pub score: f64,
    pub rejection_reasons: Vec<String>,
    pub violation_severities: Vec<Severity>,
}

/// Confidence assessment for one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    pub score: f64,
    pub factors: Vec<String>,
}

/// Full per-assignment decision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionExplanation {
    pub assignment_id: Uuid,
    pub selected_person_id: Uuid,
    pub block_id: Uuid,
    pub template_id: Uuid,
    pub eligible_count: usize,
    pub active_constraint_names: Vec<String>,
    pub score: f64,
    pub constraint_evaluations: Vec<ConstraintEvaluation>,
    pub alternatives: Vec<AlternativeCandidate>,
    pub confidence: Confidence,
    pub margin_vs_next_best: Option<f64>,
    pub trade_off_summary: String,
    pub algorithm: crate::domain::Algorithm,
    pub solver_version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub random_seed: Option<u64>,
    pub audit_hash: String,
}

/// Inputs the generator already has on hand at the moment it commits to
/// a selection, so the recorder never has to re-derive them.
pub struct DecisionInputs<'a> {
    pub assignment_id: Uuid,
    pub selected_person_id: Uuid,
    pub block_id: Uuid,
    pub template_id: Uuid,
    pub all_candidate_ids: &'a [Uuid],
    pub candidate_scores: &'a std::collections::HashMap<Uuid, f64>,
    pub constraint_evaluations: Vec<ConstraintEvaluation>,
    pub algorithm: crate::domain::Algorithm,
    pub solver_version: &'a str,
    pub random_seed: Option<u64>,
}

/// Current crate version, stamped into every explanation's
/// `solver_version` field when callers don't override it.
pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a `DecisionExplanation` from the generator's selection inputs.
/// Confidence scoring (spec §4.9):
/// - start at 0.5
/// - +0.2 if margin over next-best > 100; +0.1 if > 10; -0.1 if < 5
/// - +0.1 if candidate pool == 1; +0.1 if >= 5
/// - -0.3 for any hard-constraint violation
/// - -0.1 if total soft penalties > 50
/// - clamp to [0, 1]
pub fn explain(inputs: DecisionInputs, timestamp: chrono::DateTime<chrono::Utc>) -> DecisionExplanation {
    let selected_score = inputs
        .candidate_scores
        .get(&inputs.selected_person_id)
        .copied()
        .unwrap_or(0.0);
    let next_best = inputs
        .all_candidate_ids
        .iter()
        .filter(|&&id| id != inputs.selected_person_id)
        .filter_map(|id| inputs.candidate_scores.get(id).copied())
        .fold(f64::NEG_INFINITY, f64::max);
    let margin = if next_best.is_finite() {
        Some(selected_score - next_best)
    } else {
        None
    };

    let hard_violation = inputs.constraint_evaluations.iter().any(|c| c.kind == ConstraintKind::Hard && !c.satisfied);
    let soft_penalty_total: f64 = inputs
        .constraint_evaluations
        .iter()
        .filter(|c| c.kind == ConstraintKind::Soft)
        .map(|c| c.penalty)
        .sum();

    let mut score = 0.5;
    let mut factors = Vec::new();
    if let Some(m) = margin {
        if m > 100.0 {
            score += 0.2;
            factors.push("margin over next-best exceeds 100".to_string());
        } else if m > 10.0 {
            score += 0.1;
            factors.push("margin over next-best exceeds 10".to_string());
        } else if m < 5.0 {
            score -= 0.1;
            factors.push("margin over next-best under 5".to_string());
        }
    }
    if inputs.all_candidate_ids.len() == 1 {
        score += 0.1;
        factors.push("only one eligible candidate".to_string());
    } else if inputs.all_candidate_ids.len() >= 5 {
        score += 0.1;
        factors.push("five or more eligible candidates".to_string());
    }
    if hard_violation {
        score -= 0.3;
        factors.push("hard constraint violated".to_string());
    }
    if soft_penalty_total > 50.0 {
        score -= 0.1;
        factors.push("total soft penalties exceed 50".to_string());
    }
    let score = score.clamp(0.0, 1.0);

    let alternatives: Vec<AlternativeCandidate> = inputs
        .all_candidate_ids
        .iter()
        .filter(|&&id| id != inputs.selected_person_id)
        .map(|&id| AlternativeCandidate {
            person_id: id,
            score: inputs.candidate_scores.get(&id).copied().unwrap_or(0.0),
            rejection_reasons: vec!["lower fairness/coverage score than the selected candidate".to_string()],
            violation_severities: Vec::new(),
        })
        .take(3)
        .collect();

    let active_constraint_names: Vec<String> =
        inputs.constraint_evaluations.iter().map(|c| c.name.clone()).collect();

    let trade_off_summary = if hard_violation {
        "selected despite an active hard-constraint violation".to_string()
    } else if margin.map(|m| m < 5.0).unwrap_or(false) {
        "near-tie with the next-best candidate".to_string()
    } else {
        "clear winner on fairness and coverage score".to_string()
    };

    let audit_hash = compute_audit_hash(
        inputs.selected_person_id,
        inputs.block_id,
        inputs.template_id,
        selected_score,
        inputs.algorithm,
        timestamp,
    );

    DecisionExplanation {
        assignment_id: inputs.assignment_id,
        selected_person_id: inputs.selected_person_id,
        block_id: inputs.block_id,
        template_id: inputs.template_id,
        eligible_count: inputs.all_candidate_ids.len(),
        active_constraint_names,
        score: selected_score,
        constraint_evaluations: inputs.constraint_evaluations,
        alternatives,
        confidence: Confidence {
            level: level_for_score(score),
            score,
            factors,
        },
        margin_vs_next_best: margin,
        trade_off_summary,
        algorithm: inputs.algorithm,
        solver_version: inputs.solver_version.to_string(),
        timestamp,
        random_seed: inputs.random_seed,
        audit_hash,
    }
}

/// `SHA-256(canonical(person, block, template, score, algorithm, timestamp))`.
fn compute_audit_hash(
    person_id: Uuid,
    block_id: Uuid,
    template_id: Uuid,
    score: f64,
    algorithm: crate::domain::Algorithm,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> String {
    let canonical = serde_json::json!({
        "person_id": person_id,
        "block_id": block_id,
        "template_id": template_id,
        "score": score,
        "algorithm": algorithm,
        "timestamp": timestamp.to_rfc3339(),
    });
    let serialized = serde_json::to_string(&canonical).expect("canonical explanation payload serializes");
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}
