//! Constraint Evaluator (C5): runs the registry against one candidate
//! and folds the results into a single scalar score plus a fitness
//! vector consumed by multi-objective generators.

use serde::{Deserialize, Serialize};

use crate::constraints::{ConstraintRegistry, Violation};
use crate::context::SchedulingContext;
use crate::domain::Assignment;

/// Large penalty applied per hard-constraint violation so no soft-score
/// improvement can ever offset a hard failure.
const HARD_VIOLATION_PENALTY: f64 = 1_000.0;

/// Per-constraint contribution to the overall score, keyed by
/// constraint name.
pub type PenaltiesByConstraint = std::collections::HashMap<String, f64>;

/// Six-axis normalized fitness, consumed by the Bio generator's
/// population ranking and reported to callers for multi-objective
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessVector {
    pub coverage: f64,
    pub fairness: f64,
    pub preferences: f64,
    pub acgme_compliance: f64,
    pub continuity: f64,
    pub learning: f64,
}

/// Output of evaluating one candidate against the active registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub valid: bool,
    pub score: f64,
    pub fitness_vector: FitnessVector,
    pub violations: Vec<Violation>,
    pub penalties_by_constraint: PenaltiesByConstraint,
}

/// Run every active constraint in registry order and fold the results
/// into an `EvaluationResult`.
pub fn evaluate(
    assignments: &[Assignment],
    context: &SchedulingContext,
    registry: &ConstraintRegistry,
) -> EvaluationResult {
    let mut violations = Vec::new();
    let mut penalties_by_constraint = PenaltiesByConstraint::new();
    let mut hard_violation_count = 0usize;
    let mut soft_score = 0.0;

    for name in registry.active_names() {
        let Some(constraint) = registry.get(name) else {
            continue;
        };
        let result = constraint.validate(assignments, context);
        let weight = registry.weight_of(name);
        let cost = result.cost();
        penalties_by_constraint.insert(name.to_string(), weight * cost);

        if registry.is_hard(name) {
            hard_violation_count += result.violations.len();
        } else {
            soft_score += weight * -cost;
        }
        violations.extend(result.violations);
    }

    let score = soft_score - HARD_VIOLATION_PENALTY * hard_violation_count as f64;
    let valid = hard_violation_count == 0;

    EvaluationResult {
        valid,
        score,
        fitness_vector: fitness_vector(assignments, context, &violations),
        violations,
        penalties_by_constraint,
    }
}

fn fitness_vector(assignments: &[Assignment], context: &SchedulingContext, violations: &[Violation]) -> FitnessVector {
    let coverage = {
        let primary_blocks: std::collections::HashSet<_> =
            assignments.iter().filter(|a| a.is_primary()).map(|a| a.block_id).collect();
        let total = context.blocks().len().max(1);
        (primary_blocks.len() as f64 / total as f64).min(1.0)
    };

    let fairness = {
        let mut counts: std::collections::HashMap<_, u32> = std::collections::HashMap::new();
        for a in assignments.iter().filter(|a| a.is_primary()) {
            *counts.entry(a.person_id).or_insert(0) += 1;
        }
        let values: Vec<f64> = counts.values().map(|&c| c as f64).collect();
        if values.len() < 2 {
            1.0
        } else {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            if mean == 0.0 {
                1.0
            } else {
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
                (1.0 / (1.0 + variance.sqrt() / mean)).clamp(0.0, 1.0)
            }
        }
    };

    let acgme_violation_count = violations
        .iter()
        .filter(|v| v.message.contains("80h") || v.message.contains("day off") || v.message.contains("junior resident"))
        .count();
    let acgme_compliance = (1.0 / (1.0 + acgme_violation_count as f64)).clamp(0.0, 1.0);

    FitnessVector {
        coverage,
        fairness,
        preferences: 0.5,
        acgme_compliance,
        continuity: 0.5,
        learning: 0.5,
    }
}
