//! Pre-Solver Validator (C3): fast feasibility checks that run before
//! the candidate generator, so obviously infeasible problems fail fast
//! instead of burning solver time.

use serde::{Deserialize, Serialize};

use crate::context::SchedulingContext;
use crate::domain::Block;

/// Complexity buckets the solver planner uses to pick a search budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
    Extreme,
}

pub const COMPLEXITY_LOW: u64 = 10_000;
pub const COMPLEXITY_MEDIUM: u64 = 100_000;
pub const COMPLEXITY_HIGH: u64 = 1_000_000;
pub const COMPLEXITY_EXTREME: u64 = 10_000_000;

/// Need at least 20% more availability than required coverage slots.
pub const MIN_PERSONNEL_RATIO: f64 = 1.2;
/// A resident shouldn't be on the hook for more than 90% of workday blocks.
pub const WORKLOAD_MAX_RATIO: f64 = 0.9;

/// Saturation warning threshold for per-person pre-assignment share.
pub const PER_PERSON_SATURATION_WARN: f64 = 0.8;
/// Saturation warning threshold for overall pre-assignment share.
pub const OVERALL_SATURATION_WARN: f64 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreSolverResult {
    pub feasible: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub complexity_estimate: u64,
    pub statistics: serde_json::Value,
}

impl PreSolverResult {
    fn empty() -> Self {
        Self {
            feasible: true,
            issues: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            complexity_estimate: 0,
            statistics: serde_json::Value::Null,
        }
    }
}

fn workday_blocks(context: &SchedulingContext) -> Vec<&Block> {
    context.blocks().iter().filter(|b| !b.is_weekend()).collect()
}

/// Run all pre-solver checks over a context. `min_coverage_per_block`
/// is typically 1.
pub fn validate_saturation(context: &SchedulingContext, min_coverage_per_block: u32) -> PreSolverResult {
    if context.residents().is_empty() {
        return PreSolverResult {
            issues: vec!["no residents available for scheduling".into()],
            recommendations: vec!["add resident data to the system".into()],
            ..PreSolverResult::empty()
        }
        .finalize();
    }
    if context.blocks().is_empty() {
        return PreSolverResult {
            issues: vec!["no blocks available for scheduling".into()],
            recommendations: vec!["ensure blocks are created for the date range".into()],
            ..PreSolverResult::empty()
        }
        .finalize();
    }
    if context.templates().is_empty() {
        return PreSolverResult {
            issues: vec!["no rotation templates available".into()],
            recommendations: vec!["create rotation templates for residents to use".into()],
            ..PreSolverResult::empty()
        }
        .finalize();
    }

    let mut result = PreSolverResult::empty();
    check_hour_balance(context, &mut result);
    check_coverage_ratio(context, min_coverage_per_block, &mut result);
    check_availability_conflicts(context, &mut result);
    estimate_complexity(context, &mut result);
    check_existing_assignment_conflicts(context, &mut result);
    merge_population_statistics(context, &mut result);
    result.finalize()
}

impl PreSolverResult {
    fn finalize(mut self) -> Self {
        self.feasible = self.issues.is_empty();
        self
    }
}

fn check_hour_balance(context: &SchedulingContext, result: &mut PreSolverResult) {
    let workdays = workday_blocks(context);
    let total_available_slots = workdays.len() * context.residents().len();
    // At minimum, every slot must be filled.
    let min_required_slots = total_available_slots;

    if min_required_slots > total_available_slots {
        result.issues.push(format!(
            "insufficient slot capacity: need {} slots, only have {} available",
            min_required_slots, total_available_slots
        ));
        result
            .recommendations
            .push("reduce minimum rotation requirements or add more residents".into());
    }

    let min_needed = workdays.len() / 2;
    for resident in context.residents() {
        let available = workdays
            .iter()
            .filter(|b| context.availability(resident.id, b.id))
            .count();
        if available < min_needed {
            result.warnings.push(format!(
                "resident {} only available for {}/{} blocks (absences may cause under-assignment)",
                resident.name,
                available,
                workdays.len()
            ));
        }
    }
}

fn check_coverage_ratio(context: &SchedulingContext, min_coverage_per_block: u32, result: &mut PreSolverResult) {
    let workdays = workday_blocks(context);
    let total_coverage_needed = workdays.len() as u64 * min_coverage_per_block as u64;

    let mut total_available: u64 = 0;
    for resident in context.residents() {
        for block in &workdays {
            if context.availability(resident.id, block.id) {
                total_available += 1;
            }
        }
    }

    let coverage_ratio = if total_coverage_needed > 0 {
        total_available as f64 / total_coverage_needed as f64
    } else {
        0.0
    };

    if coverage_ratio < 1.0 {
        result.issues.push(format!(
            "insufficient personnel coverage: need {} resident-blocks, only have {} available (ratio: {:.2})",
            total_coverage_needed, total_available, coverage_ratio
        ));
        result
            .recommendations
            .push("reduce date range, add more residents, or reduce minimum coverage requirements".into());
    } else if coverage_ratio < MIN_PERSONNEL_RATIO {
        result.warnings.push(format!(
            "tight personnel coverage: ratio {:.2} (recommended: >{}). solver may struggle to find balanced solution",
            coverage_ratio, MIN_PERSONNEL_RATIO
        ));
        result
            .recommendations
            .push("consider adding buffer residents for more scheduling flexibility".into());
    }

    let avg_blocks_per_resident = total_coverage_needed as f64 / context.residents().len() as f64;
    let max_blocks_per_resident = workdays.len() as f64 * WORKLOAD_MAX_RATIO;
    if avg_blocks_per_resident > max_blocks_per_resident {
        result.issues.push(format!(
            "over-assignment detected: each resident would need {:.1} blocks on average, but maximum recommended is {:.1} ({:.0}% of total blocks)",
            avg_blocks_per_resident, max_blocks_per_resident, WORKLOAD_MAX_RATIO * 100.0
        ));
        result
            .recommendations
            .push("add more residents or reduce scheduling period length".into());
    }
}

fn check_availability_conflicts(context: &SchedulingContext, result: &mut PreSolverResult) {
    let workdays = workday_blocks(context);

    for resident in context.residents() {
        let available_count = workdays
            .iter()
            .filter(|b| context.availability(resident.id, b.id))
            .count();
        if available_count == 0 {
            result.issues.push(format!(
                "resident {} has zero availability (absent for entire scheduling period)",
                resident.name
            ));
            result
                .recommendations
                .push(format!("remove {} from scheduling or adjust absence dates", resident.name));
        }
    }

    for block in &workdays {
        let available_residents = context
            .residents()
            .iter()
            .filter(|r| context.availability(r.id, block.id))
            .count();
        if available_residents == 0 {
            result.issues.push(format!(
                "block {} {:?} has no available residents (all residents absent)",
                block.date, block.time_of_day
            ));
            result
                .recommendations
                .push(format!("adjust absences to ensure coverage on {}", block.date));
        } else if available_residents < 2 {
            result.warnings.push(format!(
                "block {} {:?} only has {} available resident(s) (limited scheduling flexibility)",
                block.date, block.time_of_day, available_residents
            ));
        }
    }
}

fn check_existing_assignment_conflicts(context: &SchedulingContext, result: &mut PreSolverResult) {
    if context.existing_assignments().is_empty() {
        return;
    }

    use std::collections::HashSet;
    use uuid::Uuid;

    let occupied: HashSet<(Uuid, Uuid)> = context
        .existing_assignments()
        .iter()
        .map(|a| (a.person_id, a.block_id))
        .collect();

    let workdays = workday_blocks(context);
    for resident in context.residents() {
        let pre_assigned = workdays
            .iter()
            .filter(|b| occupied.contains(&(resident.id, b.id)))
            .count();
        if pre_assigned as f64 > workdays.len() as f64 * PER_PERSON_SATURATION_WARN {
            result.warnings.push(format!(
                "resident {} has {}/{} blocks pre-assigned (little room for solver optimization)",
                resident.name,
                pre_assigned,
                workdays.len()
            ));
        }
    }

    let total_slots = workdays.len() * context.residents().len();
    let pre_assignment_ratio = if total_slots > 0 {
        occupied.len() as f64 / total_slots as f64
    } else {
        0.0
    };
    if pre_assignment_ratio > OVERALL_SATURATION_WARN {
        result.warnings.push(format!(
            "{:.0}% of slots are pre-assigned (solver has limited flexibility)",
            pre_assignment_ratio * 100.0
        ));
        result
            .recommendations
            .push("consider reducing pre-assignments to give solver more options".into());
    }
}

fn estimate_complexity(context: &SchedulingContext, result: &mut PreSolverResult) {
    let workdays = workday_blocks(context);
    let num_residents = context.residents().len() as u64;
    let num_blocks = workdays.len() as u64;
    let num_templates = context.templates().len() as u64;
    let num_vars = num_residents * num_blocks * num_templates;
    let num_constraints = num_residents * num_blocks + num_blocks * num_templates + num_residents + num_blocks;
    let complexity = num_vars.saturating_mul(num_constraints);

    result.complexity_estimate = complexity;

    let level = if complexity < COMPLEXITY_LOW {
        ComplexityLevel::Low
    } else if complexity < COMPLEXITY_MEDIUM {
        ComplexityLevel::Medium
    } else if complexity < COMPLEXITY_HIGH {
        ComplexityLevel::High
    } else if complexity < COMPLEXITY_EXTREME {
        ComplexityLevel::VeryHigh
    } else {
        result.warnings.push(format!(
            "extreme problem complexity: {} (solver may timeout or produce suboptimal results)",
            complexity
        ));
        result
            .recommendations
            .push("consider breaking problem into smaller date ranges or using incremental scheduling".into());
        ComplexityLevel::Extreme
    };

    result.statistics = serde_json::json!({
        "complexity_level": level,
        "complexity_estimate": complexity,
        "num_variables": num_vars,
        "num_constraints_estimate": num_constraints,
    });
}

/// Merge population/availability counts into the statistics object
/// `estimate_complexity` already populated, rather than overwriting it.
fn merge_population_statistics(context: &SchedulingContext, result: &mut PreSolverResult) {
    let workdays = workday_blocks(context);
    let mut total_availability: u64 = 0;
    for resident in context.residents() {
        for block in &workdays {
            if context.availability(resident.id, block.id) {
                total_availability += 1;
            }
        }
    }
    let total_possible = context.residents().len() * workdays.len();
    let availability_rate = if total_possible > 0 {
        total_availability as f64 / total_possible as f64
    } else {
        0.0
    };

    if !result.statistics.is_object() {
        result.statistics = serde_json::json!({});
    }
    if let serde_json::Value::Object(map) = &mut result.statistics {
        map.insert("num_residents".into(), serde_json::json!(context.residents().len()));
        map.insert("num_faculty".into(), serde_json::json!(context.faculty().len()));
        map.insert("num_blocks".into(), serde_json::json!(context.blocks().len()));
        map.insert("num_workday_blocks".into(), serde_json::json!(workdays.len()));
        map.insert("num_templates".into(), serde_json::json!(context.templates().len()));
        map.insert(
            "num_existing_assignments".into(),
            serde_json::json!(context.existing_assignments().len()),
        );
        map.insert("availability_rate".into(), serde_json::json!(availability_rate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivityCode, ActivityType, Capabilities, ClinicCaps, Person, PersonKind, PgyLevel, RotationTemplate};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn resident(name: &str) -> Person {
        Person {
            id: Uuid::new_v4(),
            name: name.into(),
            kind: PersonKind::Resident,
            pgy_level: Some(PgyLevel::Pgy2),
            faculty_role: None,
            capabilities: Capabilities::default(),
            clinic_caps: ClinicCaps { min: 0, max: 10 },
        }
    }

    fn template() -> RotationTemplate {
        RotationTemplate {
            id: Uuid::new_v4(),
            name: "FM Clinic".into(),
            abbreviation: "FMC".into(),
            activity_type: ActivityType::Clinic,
            activity_code: ActivityCode::FmClinic,
            requires_specialty: None,
            requires_procedure_credential: false,
            max_residents: None,
            min_pgy_level: None,
            supervision_ratio: None,
        }
    }

    #[test]
    fn empty_residents_is_infeasible() {
        let ctx = crate::context::SchedulingContext::build(vec![], vec![], vec![template()], vec![], &[]);
        let result = validate_saturation(&ctx, 1);
        assert!(!result.feasible);
    }

    #[test]
    fn reasonable_problem_is_feasible() {
        let r1 = resident("R1");
        let r2 = resident("R2");
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let blocks = crate::domain::Block::generate_range(start, end, &[]);
        let ctx = crate::context::SchedulingContext::build(
            vec![r1, r2],
            blocks,
            vec![template()],
            vec![],
            &[],
        );
        let result = validate_saturation(&ctx, 1);
        assert!(result.feasible, "issues: {:?}", result.issues);
    }

    #[test]
    fn zero_availability_resident_is_flagged() {
        let r1 = resident("R1");
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let blocks = crate::domain::Block::generate_range(start, end, &[]);
        let absence = crate::domain::Absence {
            person_id: r1.id,
            start_date: start,
            end_date: end,
            absence_type: crate::domain::AbsenceType::Vacation,
            is_blocking: true,
        };
        let ctx = crate::context::SchedulingContext::build(
            vec![r1],
            blocks,
            vec![template()],
            vec![],
            std::slice::from_ref(&absence),
        );
        let result = validate_saturation(&ctx, 1);
        assert!(!result.feasible);
        assert!(result.issues.iter().any(|i| i.contains("zero availability")));
    }
}
