//! Hard ACGME constraints: Availability, EightyHourRule, OneInSevenRule,
//! SupervisionRatio.

use std::collections::HashMap;

use uuid::Uuid;

use super::{Constraint, ConstraintKind, Priority, Severity, ValidationResult, Violation};
use crate::context::SchedulingContext;
use crate::domain::Assignment;
use crate::duty_hours::{hours_by_person_and_date, rolling_seven_day_totals, window_has_day_off};

/// Default faculty:junior-resident supervision ratio when a template
/// does not specify its own.
pub const DEFAULT_SUPERVISION_RATIO: u32 = 2;

/// No assignment may land a person on a block where they are not
/// available (blocking absence).
pub struct Availability;

impl Constraint for Availability {
    fn name(&self) -> &'static str {
        "Availability"
    }
    fn category(&self) -> &'static str {
        "acgme"
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
        let mut violations = Vec::new();
        for assignment in assignments {
            if !context.availability(assignment.person_id, assignment.block_id) {
                violations.push(Violation::new(
                    Severity::Critical,
                    format!(
                        "person {} assigned to block {} while unavailable",
                        assignment.person_id, assignment.block_id
                    ),
                    vec![assignment.person_id, assignment.block_id],
                ));
            }
        }
        ValidationResult::failed(violations)
    }
}

/// No resident may exceed 80 primary-assignment hours in any rolling
/// 7-day window.
pub struct EightyHourRule;

pub use crate::duty_hours::HOURS_CAP_PER_WEEK as EIGHTY_HOUR_LIMIT;

impl Constraint for EightyHourRule {
    fn name(&self) -> &'static str {
        "EightyHourRule"
    }
    fn category(&self) -> &'static str {
        "acgme"
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
        let Some((range_start, range_end)) = block_date_range(context) else {
            return ValidationResult::ok();
        };
        let by_person_date = hours_by_person_and_date(assignments, context);

        let mut violations = Vec::new();
        for resident in context.residents() {
            let Some(by_date) = by_person_date.get(&resident.id) else {
                continue;
            };
            for (window_start, total) in rolling_seven_day_totals(by_date, range_start, range_end) {
                if total > EIGHTY_HOUR_LIMIT {
                    violations.push(
                        Violation::new(
                            severity_for_excess(total - EIGHTY_HOUR_LIMIT),
                            format!(
                                "{} exceeds 80h in window starting {}: {:.1}h",
                                resident.name, window_start, total
                            ),
                            vec![resident.id],
                        )
                        .with_details(serde_json::json!({
                            "window_start": window_start.to_string(),
                            "total_hours": total,
                        })),
                    );
                }
            }
        }
        ValidationResult::failed(violations)
    }
}

fn severity_for_excess(excess: f64) -> Severity {
    if excess > 20.0 {
        Severity::Critical
    } else if excess > 8.0 {
        Severity::Error
    } else {
        Severity::Warning
    }
}

/// Every resident must have at least one fully unassigned calendar day
/// in any rolling 7-day window.
pub struct OneInSevenRule;

impl Constraint for OneInSevenRule {
    fn name(&self) -> &'static str {
        "OneInSevenRule"
    }
    fn category(&self) -> &'static str {
        "acgme"
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
        let Some((range_start, range_end)) = block_date_range(context) else {
            return ValidationResult::ok();
        };
        let by_person_date = hours_by_person_and_date(assignments, context);

        let mut violations = Vec::new();
        for resident in context.residents() {
            let empty = HashMap::new();
            let by_date = by_person_date.get(&resident.id).unwrap_or(&empty);

            let mut start = range_start;
            while start + chrono::Duration::days(6) <= range_end {
                if !window_has_day_off(by_date, start) {
                    violations.push(
                        Violation::new(
                            Severity::Critical,
                            format!(
                                "{} has no day off in the 7-day window starting {}",
                                resident.name, start
                            ),
                            vec![resident.id],
                        )
                        .with_details(serde_json::json!({ "window_start": start.to_string() })),
                    );
                }
                start = start.succ_opt().expect("date within representable bounds");
            }
        }
        ValidationResult::failed(violations)
    }
}

fn block_date_range(context: &SchedulingContext) -> Option<(chrono::NaiveDate, chrono::NaiveDate)> {
    let blocks = context.blocks();
    Some((blocks.first()?.date, blocks.last()?.date))
}

/// Per block: if there is at least one PGY-1/PGY-2 resident assigned,
/// enough supervising faculty must be present.
#[derive(Default)]
pub struct SupervisionRatio {
    pub default_ratio: u32,
}

impl SupervisionRatio {
    pub fn new(default_ratio: u32) -> Self {
        Self { default_ratio }
    }

    fn ratio(&self) -> u32 {
        if self.default_ratio == 0 {
            DEFAULT_SUPERVISION_RATIO
        } else {
            self.default_ratio
        }
    }
}

impl Constraint for SupervisionRatio {
    fn name(&self) -> &'static str {
        "SupervisionRatio"
    }
    fn category(&self) -> &'static str {
        "acgme"
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
        let mut by_block: HashMap<Uuid, (u32, u32, u32)> = HashMap::new(); // (junior, faculty, most_restrictive_ratio)
        for assignment in assignments {
            let Some(person) = context.person_by_id(assignment.person_id) else {
                continue;
            };
            let entry = by_block.entry(assignment.block_id).or_insert((0, 0, self.ratio()));
            if person.is_faculty() {
                entry.1 += 1;
            } else if person.is_junior_resident() {
                entry.0 += 1;
                if let Some(template) = context.template_by_id(assignment.template_id) {
                    if let Some(template_ratio) = template.supervision_ratio {
                        if template_ratio < entry.2 {
                            entry.2 = template_ratio;
                        }
                    }
                }
            }
        }

        let mut violations = Vec::new();
        for (block_id, (junior, faculty, ratio)) in by_block {
            if junior == 0 {
                continue;
            }
            let required = junior.div_ceil(ratio.max(1));
            if faculty < required {
                violations.push(
                    Violation::new(
                        Severity::Critical,
                        format!(
                            "block {} has {} junior resident(s) but only {} faculty (needs {})",
                            block_id, junior, faculty, required
                        ),
                        vec![block_id],
                    )
                    .with_details(serde_json::json!({
                        "junior_count": junior,
                        "faculty_count": faculty,
                        "required": required,
                    })),
                );
            }
        }
        ValidationResult::failed(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActivityCode, AssignmentRole, Capabilities, ClinicCaps, PersonKind, PgyLevel, TimeOfDay,
    };
    use chrono::{NaiveDate, Utc};

    fn make_resident(pgy: PgyLevel) -> crate::domain::Person {
        crate::domain::Person {
            id: Uuid::new_v4(),
            name: "R".into(),
            kind: PersonKind::Resident,
            pgy_level: Some(pgy),
            faculty_role: None,
            capabilities: Capabilities::default(),
            clinic_caps: ClinicCaps { min: 3, max: 10 },
        }
    }

    fn assignment(person_id: Uuid, block_id: Uuid, template_id: Uuid) -> Assignment {
        assignment_with_code(person_id, block_id, template_id, ActivityCode::FmClinic)
    }

    fn assignment_with_code(
        person_id: Uuid,
        block_id: Uuid,
        template_id: Uuid,
        activity_code: ActivityCode,
    ) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            block_id,
            person_id,
            template_id,
            role: AssignmentRole::Primary,
            activity_code,
            notes: None,
            updated_at: Utc::now(),
        }
    }

    /// Six AM call (FMIT) shifts at 12h + one weekday's AM+PM clinic at
    /// 4h each sums to exactly 80h across the 7-day window.
    #[test]
    fn eighty_hours_satisfied_at_exactly_80() {
        let resident = make_resident(PgyLevel::Pgy2);
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let blocks = block_range(start, 7);
        let ctx = crate::context::SchedulingContext::build(
            vec![resident.clone()],
            blocks.clone(),
            vec![],
            vec![],
            &[],
        );
        let template = Uuid::new_v4();
        let mut assignments: Vec<Assignment> = (0..6)
            .map(|day| assignment_with_code(resident.id, blocks[day * 2].id, template, ActivityCode::Fmit))
            .collect();
        assignments.push(assignment(resident.id, blocks[12].id, template));
        assignments.push(assignment(resident.id, blocks[13].id, template));
        let result = EightyHourRule.validate(&assignments, &ctx);
        assert!(result.satisfied, "expected satisfied at exactly 80h: {:?}", result.violations);
    }

    #[test]
    fn eighty_hours_violated_above_80() {
        let resident = make_resident(PgyLevel::Pgy2);
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let blocks = block_range(start, 7);
        let ctx = crate::context::SchedulingContext::build(
            vec![resident.clone()],
            blocks.clone(),
            vec![],
            vec![],
            &[],
        );
        let template = Uuid::new_v4();
        let mut assignments: Vec<Assignment> = (0..7)
            .map(|day| assignment_with_code(resident.id, blocks[day * 2].id, template, ActivityCode::Fmit))
            .collect();
        assignments.push(assignment(resident.id, blocks[13].id, template));
        let result = EightyHourRule.validate(&assignments, &ctx);
        assert!(!result.satisfied);
    }

    #[test]
    fn one_in_seven_satisfied_with_a_day_off() {
        let resident = make_resident(PgyLevel::Pgy2);
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let blocks = block_range(start, 7);
        let ctx = crate::context::SchedulingContext::build(
            vec![resident.clone()],
            blocks.clone(),
            vec![],
            vec![],
            &[],
        );
        let template = Uuid::new_v4();
        // Skip the last day entirely (day 7, blocks 12/13).
        let assignments: Vec<Assignment> = blocks[..12]
            .iter()
            .map(|b| assignment(resident.id, b.id, template))
            .collect();
        let result = OneInSevenRule.validate(&assignments, &ctx);
        assert!(result.satisfied);
    }

    #[test]
    fn one_in_seven_violated_with_no_day_off() {
        let resident = make_resident(PgyLevel::Pgy2);
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let blocks = block_range(start, 7);
        let ctx = crate::context::SchedulingContext::build(
            vec![resident.clone()],
            blocks.clone(),
            vec![],
            vec![],
            &[],
        );
        let template = Uuid::new_v4();
        let assignments: Vec<Assignment> = blocks
            .iter()
            .map(|b| assignment(resident.id, b.id, template))
            .collect();
        let result = OneInSevenRule.validate(&assignments, &ctx);
        assert!(!result.satisfied);
    }

    fn block_range(start: NaiveDate, days: i64) -> Vec<crate::domain::Block> {
        let end = start + chrono::Duration::days(days - 1);
        crate::domain::Block::generate_range(start, end, &[])
    }

    #[test]
    fn supervision_ratio_requires_ceil_division() {
        let faculty = crate::domain::Person {
            id: Uuid::new_v4(),
            name: "F".into(),
            kind: PersonKind::Faculty,
            pgy_level: None,
            faculty_role: Some(crate::domain::FacultyRole::Core),
            capabilities: Capabilities::default(),
            clinic_caps: ClinicCaps { min: 0, max: 10 },
        };
        let r1 = make_resident(PgyLevel::Pgy1);
        let r2 = make_resident(PgyLevel::Pgy1);
        let r3 = make_resident(PgyLevel::Pgy1);
        let block = crate::domain::Block::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            TimeOfDay::Am,
            false,
        );
        let template = Uuid::new_v4();
        let ctx = crate::context::SchedulingContext::build(
            vec![faculty.clone(), r1.clone(), r2.clone(), r3.clone()],
            vec![block.clone()],
            vec![],
            vec![],
            &[],
        );
        let assignments = vec![
            assignment(faculty.id, block.id, template),
            assignment(r1.id, block.id, template),
            assignment(r2.id, block.id, template),
            assignment(r3.id, block.id, template),
        ];
        // 3 juniors / ratio 2 => requires ceil(3/2) = 2 faculty, only 1 present.
        let result = SupervisionRatio::default().validate(&assignments, &ctx);
        assert!(!result.satisfied);
    }
}
