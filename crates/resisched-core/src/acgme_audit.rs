//! ACGME Validator (C6): a post-hoc audit over a persisted
//! `ScheduleRun`'s assignments. Purely a verifier — it never mutates
//! assignments, and shares its rolling-window arithmetic with the
//! in-pipeline hard constraints via `duty_hours` so the two can never
//! drift apart on what "a rolling 7-day window" means.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constraints::{acgme::DEFAULT_SUPERVISION_RATIO, Severity};
use crate::context::SchedulingContext;
use crate::domain::Assignment;
use crate::duty_hours::{hours_by_person_and_date, rolling_seven_day_totals, window_has_day_off, HOURS_CAP_PER_WEEK};

/// Typed rule identifiers, matched against the canonical audit rule
/// names so downstream consumers can filter/aggregate by rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditRule {
    EightyHourViolation,
    OneInSevenViolation,
    SupervisionRatioViolation,
}

impl AuditRule {
    fn as_str(self) -> &'static str {
        match self {
            AuditRule::EightyHourViolation => "EIGHTY_HOUR_VIOLATION",
            AuditRule::OneInSevenViolation => "ONE_IN_SEVEN_VIOLATION",
            AuditRule::SupervisionRatioViolation => "SUPERVISION_RATIO_VIOLATION",
        }
    }
}

/// A single audit finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditViolation {
    pub rule: AuditRule,
    pub severity: Severity,
    pub resident_id: Option<Uuid>,
    pub block_id: Option<Uuid>,
    pub message: String,
    pub details: serde_json::Value,
}

/// Summary counts over an `AuditResult`'s violations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: usize,
    pub by_rule: HashMap<String, usize>,
    pub by_resident: HashMap<Uuid, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub valid: bool,
    pub violations: Vec<AuditViolation>,
    pub summary: AuditSummary,
}

/// Run every C6 rule over `[start, end]` and summarize the findings.
pub fn validate_all(
    assignments: &[Assignment],
    context: &SchedulingContext,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> AuditResult {
    let mut violations = Vec::new();
    violations.extend(eighty_hour_violations(assignments, context, start, end));
    violations.extend(one_in_seven_violations(assignments, context, start, end));
    violations.extend(supervision_ratio_violations(assignments, context));

    let mut by_rule: HashMap<String, usize> = HashMap::new();
    let mut by_resident: HashMap<Uuid, usize> = HashMap::new();
    for v in &violations {
        *by_rule.entry(v.rule.as_str().to_string()).or_insert(0) += 1;
        if let Some(resident_id) = v.resident_id {
            *by_resident.entry(resident_id).or_insert(0) += 1;
        }
    }

    AuditResult {
        valid: violations.is_empty(),
        summary: AuditSummary {
            total: violations.len(),
            by_rule,
            by_resident,
        },
        violations,
    }
}

fn eighty_hour_violations(
    assignments: &[Assignment],
    context: &SchedulingContext,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> Vec<AuditViolation> {
    let by_person_date = hours_by_person_and_date(assignments, context);
    let mut out = Vec::new();
    for resident in context.residents() {
        let Some(by_date) = by_person_date.get(&resident.id) else {
            continue;
        };
        for (window_start, total) in rolling_seven_day_totals(by_date, start, end) {
            if total > HOURS_CAP_PER_WEEK {
                let excess = total - HOURS_CAP_PER_WEEK;
                out.push(AuditViolation {
                    rule: AuditRule::EightyHourViolation,
                    severity: severity_for_excess(excess),
                    resident_id: Some(resident.id),
                    block_id: None,
                    message: format!(
                        "{} exceeds 80h in window starting {}: {:.1}h",
                        resident.name, window_start, total
                    ),
                    details: serde_json::json!({
                        "window_start": window_start.to_string(),
                        "total_hours": total,
                    }),
                });
            }
        }
    }
    out
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

fn one_in_seven_violations(
    assignments: &[Assignment],
    context: &SchedulingContext,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> Vec<AuditViolation> {
    let by_person_date = hours_by_person_and_date(assignments, context);
    let mut out = Vec::new();
    for resident in context.residents() {
        let empty = HashMap::new();
        let by_date = by_person_date.get(&resident.id).unwrap_or(&empty);
        let mut window_start = start;
        while window_start + chrono::Duration::days(6) <= end {
            if !window_has_day_off(by_date, window_start) {
                out.push(AuditViolation {
                    rule: AuditRule::OneInSevenViolation,
                    severity: Severity::Critical,
                    resident_id: Some(resident.id),
                    block_id: None,
                    message: format!(
                        "{} has no day off in the 7-day window starting {}",
                        resident.name, window_start
                    ),
                    details: serde_json::json!({ "window_start": window_start.to_string() }),
                });
            }
            window_start = window_start.succ_opt().expect("date within representable bounds");
        }
    }
    out
}

fn supervision_ratio_violations(assignments: &[Assignment], context: &SchedulingContext) -> Vec<AuditViolation> {
    let mut by_block: HashMap<Uuid, (u32, u32, u32)> = HashMap::new();
    for assignment in assignments {
        let Some(person) = context.person_by_id(assignment.person_id) else {
            continue;
        };
        let entry = by_block
            .entry(assignment.block_id)
            .or_insert((0, 0, DEFAULT_SUPERVISION_RATIO));
        if person.is_faculty() {
            entry.1 += 1;
        } else if person.is_junior_resident() {
            entry.0 += 1;
            if let Some(template) = context.template_by_id(assignment.template_id) {
                if let Some(ratio) = template.supervision_ratio {
                    if ratio < entry.2 {
                        entry.2 = ratio;
                    }
                }
            }
        }
    }

    let mut out = Vec::new();
    for (block_id, (junior, faculty, ratio)) in by_block {
        if junior == 0 {
            continue;
        }
        let required = junior.div_ceil(ratio.max(1));
        if faculty < required {
            out.push(AuditViolation {
                rule: AuditRule::SupervisionRatioViolation,
                severity: Severity::Critical,
                resident_id: None,
                block_id: Some(block_id),
                message: format!(
                    "block {} has {} junior resident(s) but only {} faculty (needs {})",
                    block_id, junior, faculty, required
                ),
                details: serde_json::json!({
                    "junior_count": junior,
                    "faculty_count": faculty,
                    "required": required,
                }),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActivityCode, AssignmentRole, Block, Capabilities, ClinicCaps, FacultyRole, Person, PersonKind, PgyLevel,
        TimeOfDay,
    };
    use chrono::Utc;

    fn resident(pgy: PgyLevel) -> Person {
        Person {
            id: Uuid::new_v4(),
            name: "R".into(),
            kind: PersonKind::Resident,
            pgy_level: Some(pgy),
            faculty_role: None,
            capabilities: Capabilities::default(),
            clinic_caps: ClinicCaps { min: 0, max: 20 },
        }
    }

    fn assignment(person_id: Uuid, block_id: Uuid, template_id: Uuid, code: ActivityCode, role: AssignmentRole) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            block_id,
            person_id,
            template_id,
            role,
            activity_code: code,
            notes: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn clean_schedule_has_no_violations() {
        let r = resident(PgyLevel::Pgy2);
        let start = chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let end = start;
        let blocks = Block::generate_range(start, end, &[]);
        let ctx = crate::context::SchedulingContext::build(vec![r], blocks, vec![], vec![], &[]);
        let result = validate_all(&[], &ctx, start, end);
        assert!(result.valid);
        assert_eq!(result.summary.total, 0);
    }

    #[test]
    fn lone_faculty_over_five_pgy1s_trips_supervision_violation() {
        let faculty = Person {
            id: Uuid::new_v4(),
            name: "Lone Faculty".into(),
            kind: PersonKind::Faculty,
            pgy_level: None,
            faculty_role: Some(FacultyRole::Core),
            capabilities: Capabilities::default(),
            clinic_caps: ClinicCaps { min: 0, max: 20 },
        };
        let residents: Vec<Person> = (0..5).map(|_| resident(PgyLevel::Pgy1)).collect();
        let block = Block::new(chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(), TimeOfDay::Am, false);
        let template = Uuid::new_v4();
        let mut people = residents.clone();
        people.push(faculty.clone());
        let ctx = crate::context::SchedulingContext::build(people, vec![block.clone()], vec![], vec![], &[]);

        let mut assignments: Vec<Assignment> = residents
            .iter()
            .map(|r| assignment(r.id, block.id, template, ActivityCode::FmClinic, AssignmentRole::Primary))
            .collect();
        assignments.push(assignment(
            faculty.id,
            block.id,
            template,
            ActivityCode::FmClinic,
            AssignmentRole::Supervising,
        ));

        let result = validate_all(&assignments, &ctx, block.date, block.date);
        assert!(result
            .violations
            .iter()
            .any(|v| matches!(v.rule, AuditRule::SupervisionRatioViolation)));
    }
}
