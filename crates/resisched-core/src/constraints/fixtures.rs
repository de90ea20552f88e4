//! FMIT (family-medicine inpatient team) and Night Float fixture
//! constraints: staffing floor, post-rotation Sunday blocking, and
//! fixed headcounts.

use std::collections::{HashMap, HashSet};

use chrono::Datelike;
use uuid::Uuid;

use super::{Constraint, ConstraintKind, Priority, Severity, ValidationResult, Violation};
use crate::context::SchedulingContext;
use crate::domain::{ActivityCode, Assignment, PgyLevel};

/// Below 5 faculty, FMIT cannot run at all; above that, at most
/// `⌊0.2 × faculty_count⌋` FMIT teams may run concurrently in any one
/// week. Faculty on non-blocking absences still count toward
/// `faculty_count` (the source does not subtract them).
pub struct FmitStaffingFloor;

const MIN_FACULTY_FOR_FMIT: usize = 5;

impl Constraint for FmitStaffingFloor {
    fn name(&self) -> &'static str {
        "FmitStaffingFloor"
    }
    fn category(&self) -> &'static str {
        "fixtures"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }
    fn priority(&self) -> Priority {
        Priority::Critical
    }
    fn default_weight(&self) -> f64 {
        1.0
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let faculty_count = context.faculty().len();
        let fmit_assignments: Vec<&Assignment> = assignments
            .iter()
            .filter(|a| a.is_primary() && a.activity_code == ActivityCode::Fmit)
            .collect();

        if fmit_assignments.is_empty() {
            return ValidationResult::ok();
        }

        if faculty_count < MIN_FACULTY_FOR_FMIT {
            return ValidationResult::failed(vec![Violation::new(
                Severity::Critical,
                format!(
                    "FMIT requires at least {} faculty, have {}",
                    MIN_FACULTY_FOR_FMIT, faculty_count
                ),
                vec![],
            )]);
        }

        let max_concurrent = (faculty_count as f64 * 0.2).floor() as usize;
        let mut by_week: HashMap<(i32, u32), HashSet<Uuid>> = HashMap::new();
        for assignment in &fmit_assignments {
            let Some(block) = context.block_by_id(assignment.block_id) else {
                continue;
            };
            let iso = block.date.iso_week();
            by_week
                .entry((iso.year(), iso.week()))
                .or_default()
                .insert(assignment.person_id);
        }

        let mut violations = Vec::new();
        for ((year, week), residents) in by_week {
            if residents.len() > max_concurrent.max(1) {
                violations.push(
                    Violation::new(
                        Severity::Critical,
                        format!(
                            "ISO week {}-{}: {} concurrent FMIT teams exceeds floor of {}",
                            year,
                            week,
                            residents.len(),
                            max_concurrent
                        ),
                        residents.into_iter().collect(),
                    )
                    .with_details(serde_json::json!({ "iso_year": year, "iso_week": week })),
                );
            }
        }
        ValidationResult::failed(violations)
    }
}

/// No one who worked an FMIT week may be assigned call on the Sunday
/// immediately following that week.
pub struct PostFmitSundayBlocking;

impl Constraint for PostFmitSundayBlocking {
    fn name(&self) -> &'static str {
        "PostFmitSundayBlocking"
    }
    fn category(&self) -> &'static str {
        "fixtures"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }
    fn priority(&self) -> Priority {
        Priority::High
    }
    fn default_weight(&self) -> f64 {
        1.0
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut last_fmit_date_by_week: HashMap<(Uuid, i32, u32), chrono::NaiveDate> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary() && a.activity_code == ActivityCode::Fmit) {
            let Some(block) = context.block_by_id(assignment.block_id) else {
                continue;
            };
            let iso = block.date.iso_week();
            let key = (assignment.person_id, iso.year(), iso.week());
            let entry = last_fmit_date_by_week.entry(key).or_insert(block.date);
            if block.date > *entry {
                *entry = block.date;
            }
        }

        let mut assignment_dates: HashMap<Uuid, HashSet<chrono::NaiveDate>> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary()) {
            if let Some(block) = context.block_by_id(assignment.block_id) {
                assignment_dates
                    .entry(assignment.person_id)
                    .or_default()
                    .insert(block.date);
            }
        }

        let mut violations = Vec::new();
        for ((person_id, _year, _week), last_date) in last_fmit_date_by_week {
            let mut sunday_after = last_date.succ_opt().expect("date within bounds");
            while sunday_after.weekday() != chrono::Weekday::Sun {
                sunday_after = sunday_after.succ_opt().expect("date within bounds");
            }
            if assignment_dates
                .get(&person_id)
                .map(|dates| dates.contains(&sunday_after))
                .unwrap_or(false)
            {
                violations.push(
                    Violation::new(
                        Severity::Error,
                        format!(
                            "person {} assigned call on {}, the Sunday after an FMIT week",
                            person_id, sunday_after
                        ),
                        vec![person_id],
                    )
                    .with_details(serde_json::json!({ "sunday": sunday_after.to_string() })),
                );
            }
        }
        ValidationResult::failed(violations)
    }
}

/// Exactly one resident on Night Float per block.
pub struct NightFloatHeadcount;

impl Constraint for NightFloatHeadcount {
    fn name(&self) -> &'static str {
        "NightFloatHeadcount"
    }
    fn category(&self) -> &'static str {
        "fixtures"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }
    fn priority(&self) -> Priority {
        Priority::Critical
    }
    fn default_weight(&self) -> f64 {
        1.0
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut by_block: HashMap<Uuid, u32> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary() && a.activity_code == ActivityCode::Nf) {
            let Some(person) = context.person_by_id(assignment.person_id) else {
                continue;
            };
            if person.is_resident() {
                *by_block.entry(assignment.block_id).or_insert(0) += 1;
            }
        }

        let violations = by_block
            .into_iter()
            .filter(|&(_, count)| count != 1)
            .map(|(block_id, count)| {
                Violation::new(
                    Severity::Critical,
                    format!("block {} has {} residents on night float, expected 1", block_id, count),
                    vec![block_id],
                )
            })
            .collect();
        ValidationResult::failed(violations)
    }
}

/// Exactly one resident per PGY level on FMIT across the run.
pub struct FmitResidentHeadcount;

impl Constraint for FmitResidentHeadcount {
    fn name(&self) -> &'static str {
        "FmitResidentHeadcount"
    }
    fn category(&self) -> &'static str {
        "fixtures"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }
    fn priority(&self) -> Priority {
        Priority::High
    }
    fn default_weight(&self) -> f64 {
        1.0
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut by_pgy: HashMap<PgyLevel, HashSet<Uuid>> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary() && a.activity_code == ActivityCode::Fmit) {
            let Some(person) = context.person_by_id(assignment.person_id) else {
                continue;
            };
            if let Some(pgy) = person.pgy_level {
                by_pgy.entry(pgy).or_default().insert(person.id);
            }
        }

        let mut violations = Vec::new();
        for pgy in [PgyLevel::Pgy1, PgyLevel::Pgy2, PgyLevel::Pgy3] {
            let count = by_pgy.get(&pgy).map(|s| s.len()).unwrap_or(0);
            if count != 1 {
                violations.push(Violation::new(
                    Severity::Error,
                    format!("PGY-{}: {} residents on FMIT, expected 1", pgy.as_u8(), count),
                    by_pgy.get(&pgy).map(|s| s.iter().copied().collect()).unwrap_or_default(),
                ));
            }
        }
        ValidationResult::failed(violations)
    }
}
