//! Anti-Churn Scorer (C7): time-crystal-inspired stability objective.
//! Schedules should be rigid — a small perturbation (one new absence)
//! should not cause a large-scale reshuffle — so this module measures
//! how much a candidate differs from the last committed snapshot and
//! folds that into the constraint score.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ScheduleSnapshot;

/// Default weight on rigidity in the combined objective.
pub const DEFAULT_ALPHA: f64 = 0.3;
/// Default weight on fairness in the combined objective.
pub const DEFAULT_BETA: f64 = 0.1;

/// Severity bucket for a churn event, keyed off rigidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnSeverity {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

pub fn severity_for_rigidity(rigidity: f64) -> ChurnSeverity {
    if rigidity >= 0.95 {
        ChurnSeverity::Minimal
    } else if rigidity >= 0.85 {
        ChurnSeverity::Low
    } else if rigidity >= 0.70 {
        ChurnSeverity::Moderate
    } else if rigidity >= 0.50 {
        ChurnSeverity::High
    } else {
        ChurnSeverity::Critical
    }
}

/// Count of (person_id, block_id, template_id) triples differing between
/// two snapshots.
pub fn hamming_distance(a: &ScheduleSnapshot, b: &ScheduleSnapshot) -> usize {
    a.triples.symmetric_difference(&b.triples).count()
}

/// Per-person count of changed `(block_id, template_id)` pairs.
pub fn hamming_distance_by_person(a: &ScheduleSnapshot, b: &ScheduleSnapshot) -> HashMap<Uuid, usize> {
    let mut by_person_a: HashMap<Uuid, HashSet<(Uuid, Uuid)>> = HashMap::new();
    let mut by_person_b: HashMap<Uuid, HashSet<(Uuid, Uuid)>> = HashMap::new();
    for &(person_id, block_id, template_id) in &a.triples {
        by_person_a.entry(person_id).or_default().insert((block_id, template_id));
    }
    for &(person_id, block_id, template_id) in &b.triples {
        by_person_b.entry(person_id).or_default().insert((block_id, template_id));
    }

    let all_people: HashSet<Uuid> = by_person_a.keys().chain(by_person_b.keys()).copied().collect();
    let empty = HashSet::new();
    all_people
        .into_iter()
        .map(|person_id| {
            let set_a = by_person_a.get(&person_id).unwrap_or(&empty);
            let set_b = by_person_b.get(&person_id).unwrap_or(&empty);
            (person_id, set_a.symmetric_difference(set_b).count())
        })
        .collect()
}

/// `1 − hamming / (|new| + |current|)`, in `[0, 1]`. Both-empty is
/// perfect rigidity.
pub fn rigidity(new: &ScheduleSnapshot, current: &ScheduleSnapshot) -> f64 {
    let max_distance = new.len() + current.len();
    if max_distance == 0 {
        return 1.0;
    }
    1.0 - hamming_distance(new, current) as f64 / max_distance as f64
}

/// `1 − CV(per_person_hamming)`, clamped to `[0, 1]`; 1.0 when there is
/// no churn at all.
pub fn fairness(new: &ScheduleSnapshot, current: &ScheduleSnapshot) -> f64 {
    let churn = hamming_distance_by_person(new, current);
    if churn.is_empty() {
        return 1.0;
    }
    let values: Vec<f64> = churn.values().map(|&c| c as f64).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 1.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let cv = variance.sqrt() / mean;
    (1.0 - cv.min(1.0)).max(0.0)
}

/// Combined stability objective: `(1-α-β)·constraint_score + α·rigidity + β·fairness`.
pub fn time_crystal_objective(
    new: &ScheduleSnapshot,
    current: &ScheduleSnapshot,
    constraint_score: f64,
    alpha: f64,
    beta: f64,
) -> f64 {
    debug_assert!((0.0..=1.0).contains(&alpha));
    debug_assert!((0.0..=1.0).contains(&beta));
    debug_assert!(alpha + beta <= 1.0);
    (1.0 - alpha - beta) * constraint_score + alpha * rigidity(new, current) + beta * fairness(new, current)
}

/// Operational summary of what a schedule change means in practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnImpact {
    pub total_changes: usize,
    pub affected_people: usize,
    pub max_person_churn: usize,
    pub mean_person_churn: f64,
    pub rigidity: f64,
    pub severity: ChurnSeverity,
}

pub fn estimate_churn_impact(current: &ScheduleSnapshot, proposed: &ScheduleSnapshot) -> ChurnImpact {
    let by_person = hamming_distance_by_person(proposed, current);
    let affected: Vec<usize> = by_person.values().copied().filter(|&c| c > 0).collect();
    let mean_person_churn = if affected.is_empty() {
        0.0
    } else {
        affected.iter().sum::<usize>() as f64 / affected.len() as f64
    };
    let rigidity_score = rigidity(proposed, current);
    ChurnImpact {
        total_changes: hamming_distance(proposed, current),
        affected_people: affected.len(),
        max_person_churn: affected.iter().copied().max().unwrap_or(0),
        mean_person_churn,
        rigidity: rigidity_score,
        severity: severity_for_rigidity(rigidity_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_snapshots_are_perfectly_rigid() {
        let p = Uuid::new_v4();
        let b = Uuid::new_v4();
        let t = Uuid::new_v4();
        let snap = ScheduleSnapshot::from_triples([(p, b, t)]);
        assert_eq!(rigidity(&snap, &snap), 1.0);
        assert_eq!(fairness(&snap, &snap), 1.0);
    }

    #[test]
    fn empty_snapshots_are_perfectly_rigid() {
        let empty = ScheduleSnapshot::empty();
        assert_eq!(rigidity(&empty, &empty), 1.0);
    }

    #[test]
    fn one_changed_triple_halves_rigidity_on_equal_size_schedules() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let b = Uuid::new_v4();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let current = ScheduleSnapshot::from_triples([(p1, b, t1), (p2, b, t2)]);
        let new = ScheduleSnapshot::from_triples([(p1, b, t1), (p2, b, t1)]);
        // One triple removed, one added: hamming = 2, max = 4 -> rigidity = 0.5
        assert!((rigidity(&new, &current) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn severity_buckets_match_thresholds() {
        assert_eq!(severity_for_rigidity(1.0), ChurnSeverity::Minimal);
        assert_eq!(severity_for_rigidity(0.9), ChurnSeverity::Low);
        assert_eq!(severity_for_rigidity(0.75), ChurnSeverity::Moderate);
        assert_eq!(severity_for_rigidity(0.6), ChurnSeverity::High);
        assert_eq!(severity_for_rigidity(0.2), ChurnSeverity::Critical);
    }
}
