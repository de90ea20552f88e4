//! Soft constraints: workload balance, rotation coherence, preference
//! alignment, weekend fairness, call spacing, FMIT continuity, and
//! sports-medicine pairing. Each contributes a penalty rather than
//! failing the candidate outright.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::{Constraint, ConstraintKind, Priority, Severity, ValidationResult, Violation};
use crate::context::SchedulingContext;
use crate::domain::{ActivityCode, ActivityType, Assignment, FacultyRole};

fn coefficient_of_variation(counts: &[f64]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64;
    variance.sqrt() / mean
}

/// Workload balance across residents, measured as the coefficient of
/// variation of primary assignment counts.
pub struct Equity;

impl Constraint for Equity {
    fn name(&self) -> &'static str {
        "Equity"
    }
    fn category(&self) -> &'static str {
        "soft"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft
    }
    fn priority(&self) -> Priority {
        Priority::Medium
    }
    fn default_weight(&self) -> f64 {
        0.5
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut counts: HashMap<Uuid, f64> = context.residents().iter().map(|r| (r.id, 0.0)).collect();
        for assignment in assignments.iter().filter(|a| a.is_primary()) {
            if let Some(count) = counts.get_mut(&assignment.person_id) {
                *count += 1.0;
            }
        }
        let cv = coefficient_of_variation(&counts.values().copied().collect::<Vec<_>>());
        ValidationResult::ok().with_custom_cost(cv)
    }
}

/// Rotation coherence: penalize residents whose consecutive scheduled
/// days keep switching rotation template.
pub struct Continuity;

impl Constraint for Continuity {
    fn name(&self) -> &'static str {
        "Continuity"
    }
    fn category(&self) -> &'static str {
        "soft"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft
    }
    fn priority(&self) -> Priority {
        Priority::Low
    }
    fn default_weight(&self) -> f64 {
        0.3
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut by_person: HashMap<Uuid, Vec<(chrono::NaiveDate, Uuid)>> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary()) {
            let Some(block) = context.block_by_id(assignment.block_id) else {
                continue;
            };
            by_person
                .entry(assignment.person_id)
                .or_default()
                .push((block.date, assignment.template_id));
        }

        let mut switches = 0u32;
        let mut total_pairs = 0u32;
        for entries in by_person.values_mut() {
            entries.sort_by_key(|(date, _)| *date);
            for window in entries.windows(2) {
                total_pairs += 1;
                if window[0].1 != window[1].1 {
                    switches += 1;
                }
            }
        }

        let cost = if total_pairs == 0 {
            0.0
        } else {
            switches as f64 / total_pairs as f64
        };
        ValidationResult::ok().with_custom_cost(cost)
    }
}

/// Faculty assigned to templates outside their declared role (e.g. a
/// sports-medicine faculty member covering a plain inpatient block)
/// accrue a soft penalty.
pub struct FacultyPreference;

impl Constraint for FacultyPreference {
    fn name(&self) -> &'static str {
        "FacultyPreference"
    }
    fn category(&self) -> &'static str {
        "soft"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft
    }
    fn priority(&self) -> Priority {
        Priority::Low
    }
    fn default_weight(&self) -> f64 {
        0.2
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut violations = Vec::new();
        for assignment in assignments {
            let Some(person) = context.person_by_id(assignment.person_id) else {
                continue;
            };
            if !person.is_faculty() {
                continue;
            }
            let is_sports_med_role = matches!(person.faculty_role, Some(FacultyRole::SportsMed));
            let is_sports_med_activity = assignment.activity_code == ActivityCode::SmClinic;
            if is_sports_med_role != is_sports_med_activity {
                violations.push(Violation::new(
                    Severity::Info,
                    format!("{} assigned off-preference activity", person.name),
                    vec![person.id],
                ));
            }
        }
        ValidationResult::failed(violations)
    }
}

/// Balance weekend primary-assignment counts across residents.
pub struct WeekendFairness;

impl Constraint for WeekendFairness {
    fn name(&self) -> &'static str {
        "WeekendFairness"
    }
    fn category(&self) -> &'static str {
        "soft"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft
    }
    fn priority(&self) -> Priority {
        Priority::Medium
    }
    fn default_weight(&self) -> f64 {
        0.5
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut counts: HashMap<Uuid, f64> = context.residents().iter().map(|r| (r.id, 0.0)).collect();
        for assignment in assignments.iter().filter(|a| a.is_primary()) {
            let Some(block) = context.block_by_id(assignment.block_id) else {
                continue;
            };
            if block.is_weekend() {
                if let Some(count) = counts.get_mut(&assignment.person_id) {
                    *count += 1.0;
                }
            }
        }
        let cv = coefficient_of_variation(&counts.values().copied().collect::<Vec<_>>());
        ValidationResult::ok().with_custom_cost(cv)
    }
}

/// No back-to-back call weeks for the same person.
pub struct CallSpacing;

impl Constraint for CallSpacing {
    fn name(&self) -> &'static str {
        "CallSpacing"
    }
    fn category(&self) -> &'static str {
        "soft"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft
    }
    fn priority(&self) -> Priority {
        Priority::Medium
    }
    fn default_weight(&self) -> f64 {
        0.6
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        use chrono::Datelike;

        let mut weeks_by_person: HashMap<Uuid, HashSet<(i32, u32)>> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary()) {
            let Some(template) = context.template_by_id(assignment.template_id) else {
                continue;
            };
            if template.activity_type != ActivityType::Call {
                continue;
            }
            let Some(block) = context.block_by_id(assignment.block_id) else {
                continue;
            };
            let iso = block.date.iso_week();
            weeks_by_person
                .entry(assignment.person_id)
                .or_default()
                .insert((iso.year(), iso.week()));
        }

        let mut violations = Vec::new();
        for (person_id, weeks) in &weeks_by_person {
            let mut sorted: Vec<(i32, u32)> = weeks.iter().copied().collect();
            sorted.sort();
            for pair in sorted.windows(2) {
                let (y0, w0) = pair[0];
                let (y1, w1) = pair[1];
                let adjacent = (y0 == y1 && w1 == w0 + 1) || (y1 == y0 + 1 && w0 == 52 && w1 == 1);
                if adjacent {
                    violations.push(Violation::new(
                        Severity::Warning,
                        format!("person {} has back-to-back call weeks {}-{} / {}-{}", person_id, y0, w0, y1, w1),
                        vec![*person_id],
                    ));
                }
            }
        }
        ValidationResult::failed(violations)
    }
}

/// Load-shedding advisory: flags FMIT hand-offs between adjacent weeks
/// that are not justified by the outgoing resident being in a
/// high-workload state (continuity should otherwise be preferred).
pub struct FmitContinuityTurf;

impl Constraint for FmitContinuityTurf {
    fn name(&self) -> &'static str {
        "FmitContinuityTurf"
    }
    fn category(&self) -> &'static str {
        "soft"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft
    }
    fn priority(&self) -> Priority {
        Priority::Low
    }
    fn default_weight(&self) -> f64 {
        0.3
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        use chrono::Datelike;

        let mut resident_by_week: HashMap<(i32, u32), HashSet<Uuid>> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary() && a.activity_code == ActivityCode::Fmit) {
            let Some(block) = context.block_by_id(assignment.block_id) else {
                continue;
            };
            let iso = block.date.iso_week();
            resident_by_week
                .entry((iso.year(), iso.week()))
                .or_default()
                .insert(assignment.person_id);
        }

        let mut weeks: Vec<(i32, u32)> = resident_by_week.keys().copied().collect();
        weeks.sort();

        let mut violations = Vec::new();
        for pair in weeks.windows(2) {
            let (y0, w0) = pair[0];
            let (y1, w1) = pair[1];
            let adjacent = (y0 == y1 && w1 == w0 + 1) || (y1 == y0 + 1 && w0 == 52 && w1 == 1);
            if !adjacent {
                continue;
            }
            let prev = &resident_by_week[&pair[0]];
            let next = &resident_by_week[&pair[1]];
            if prev != next {
                violations.push(Violation::new(
                    Severity::Info,
                    format!("FMIT hand-off between ISO weeks {}-{} and {}-{}", y0, w0, y1, w1),
                    prev.union(next).copied().collect(),
                ));
            }
        }
        ValidationResult::failed(violations)
    }
}

/// Sports-medicine clinic residents should be supervised by a
/// sports-medicine faculty member present on the same block.
pub struct SmResidentFacultyAlignment;

impl Constraint for SmResidentFacultyAlignment {
    fn name(&self) -> &'static str {
        "SMResidentFacultyAlignment"
    }
    fn category(&self) -> &'static str {
        "soft"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft
    }
    fn priority(&self) -> Priority {
        Priority::Medium
    }
    fn default_weight(&self) -> f64 {
        0.4
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut faculty_present: HashMap<Uuid, bool> = HashMap::new();
        for assignment in assignments {
            let Some(person) = context.person_by_id(assignment.person_id) else {
                continue;
            };
            if person.is_faculty() && person.capabilities.is_sports_medicine {
                faculty_present.insert(assignment.block_id, true);
            }
        }

        let mut violations = Vec::new();
        for assignment in assignments
            .iter()
            .filter(|a| a.is_primary() && a.activity_code == ActivityCode::SmClinic)
        {
            let Some(person) = context.person_by_id(assignment.person_id) else {
                continue;
            };
            if !person.is_resident() {
                continue;
            }
            if !faculty_present.get(&assignment.block_id).copied().unwrap_or(false) {
                violations.push(Violation::new(
                    Severity::Warning,
                    format!("block {} has SM clinic resident without SM faculty present", assignment.block_id),
                    vec![assignment.block_id, assignment.person_id],
                ));
            }
        }
        ValidationResult::failed(violations)
    }
}
