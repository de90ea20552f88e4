//! Greedy generator: chronological block sweep, deterministic scoring,
//! top-`n` coverage selection.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use super::{GenerateParams, Generator, ScheduleCandidate};
use crate::context::SchedulingContext;
use crate::domain::{
    AssignmentRole, Block, Person, RotationTemplate,
};
use crate::domain::{Algorithm, Assignment, RunStatus};
use crate::duty_hours::{hours_for_activity, HOURS_CAP_PER_WEEK};

/// Iterates blocks chronologically; for each eligible block, scores
/// every available, credentialed resident and assigns the top `n` by
/// fairness (inverse running assignment count), taking the highest
/// scorer as `Primary` and the rest as `Backup`.
#[derive(Debug, Default)]
pub struct GreedyGenerator;

impl GreedyGenerator {
    pub fn new() -> Self {
        Self
    }

    fn pick_template<'a>(&self, block: &Block, templates: &'a [RotationTemplate]) -> Option<&'a RotationTemplate> {
        templates.iter().find(|t| {
            if t.is_weekday_only_clinic() {
                !block.is_weekend() && !block.is_holiday
            } else {
                true
            }
        })
    }

    fn eligible_residents<'a>(
        &self,
        context: &'a SchedulingContext,
        block: &Block,
        template: &RotationTemplate,
        running_hours: &HashMap<Uuid, HashMap<NaiveDate, f64>>,
    ) -> Vec<&'a Person> {
        context
            .residents()
            .iter()
            .filter(|r| context.availability(r.id, block.id))
            .filter(|r| {
                template
                    .min_pgy_level
                    .map(|min| r.pgy_level.map(|p| p.as_u8() >= min).unwrap_or(false))
                    .unwrap_or(true)
            })
            .filter(|r| !template.requires_procedure_credential || r.capabilities.performs_procedures)
            .filter(|r| !would_exceed_weekly_cap(running_hours, r.id, block.date, &template.activity_code))
            .collect()
    }

    fn score(&self, person: &Person, counts: &HashMap<Uuid, u32>) -> f64 {
        let count = counts.get(&person.id).copied().unwrap_or(0) as f64;
        1.0 / (count + 1.0)
    }
}

fn would_exceed_weekly_cap(
    running_hours: &HashMap<Uuid, HashMap<NaiveDate, f64>>,
    person_id: Uuid,
    date: NaiveDate,
    activity_code: &crate::domain::ActivityCode,
) -> bool {
    let Some(by_date) = running_hours.get(&person_id) else {
        return false;
    };
    let window_start = date - chrono::Duration::days(6);
    let total: f64 = (0..7)
        .map(|offset| by_date.get(&(window_start + chrono::Duration::days(offset))).copied().unwrap_or(0.0))
        .sum();
    total + hours_for_activity(activity_code) > HOURS_CAP_PER_WEEK
}

impl Generator for GreedyGenerator {
    fn generate(&mut self, context: &SchedulingContext, params: &GenerateParams) -> Option<ScheduleCandidate> {
        let start = std::time::Instant::now();
        let n_residents = context.residents().len();
        if n_residents == 0 {
            return None;
        }
        let n = (params.coverage_density * n_residents as f64).floor().max(1.0) as usize;

        let mut assignments: Vec<Assignment> = context.existing_assignments().to_vec();
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        let mut running_hours: HashMap<Uuid, HashMap<NaiveDate, f64>> = HashMap::new();
        for a in &assignments {
            if let Some(block) = context.block_by_id(a.block_id) {
                *counts.entry(a.person_id).or_insert(0) += 1;
                *running_hours
                    .entry(a.person_id)
                    .or_default()
                    .entry(block.date)
                    .or_insert(0.0) += hours_for_activity(&a.activity_code);
            }
        }

        let assigned_blocks: std::collections::HashSet<Uuid> =
            assignments.iter().filter(|a| a.is_primary()).map(|a| a.block_id).collect();

        let mut status = RunStatus::Succeeded;
        for block in context.blocks() {
            if start.elapsed() > params.timeout {
                status = RunStatus::Partial;
                break;
            }
            if assigned_blocks.contains(&block.id) {
                continue;
            }
            let Some(template) = self.pick_template(block, context.templates()) else {
                continue;
            };

            let mut eligible = self.eligible_residents(context, block, template, &running_hours);
            if eligible.is_empty() {
                continue;
            }
            eligible.sort_by(|a, b| {
                self.score(b, &counts)
                    .partial_cmp(&self.score(a, &counts))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| super::lexicographic_key(a.id, template.id).cmp(&super::lexicographic_key(b.id, template.id)))
            });

            let take = n.min(eligible.len());
            for (i, person) in eligible.into_iter().take(take).enumerate() {
                let role = if i == 0 { AssignmentRole::Primary } else { AssignmentRole::Backup };
                let assignment = Assignment {
                    id: Uuid::new_v4(),
                    block_id: block.id,
                    person_id: person.id,
                    template_id: template.id,
                    role,
                    activity_code: template.activity_code.clone(),
                    notes: None,
                    updated_at: chrono::Utc::now(),
                };
                *counts.entry(person.id).or_insert(0) += 1;
                *running_hours
                    .entry(person.id)
                    .or_default()
                    .entry(block.date)
                    .or_insert(0.0) += hours_for_activity(&template.activity_code);
                assignments.push(assignment);
            }
        }

        Some(ScheduleCandidate {
            assignments,
            algorithm: Algorithm::Greedy,
            seed: params.seed,
            runtime_ms: start.elapsed().as_millis() as u64,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActivityCode, ActivityType, Capabilities, ClinicCaps, PersonKind, PgyLevel,
    };

    fn resident(name: &str) -> Person {
        Person {
            id: Uuid::new_v4(),
            name: name.into(),
            kind: PersonKind::Resident,
            pgy_level: Some(PgyLevel::Pgy2),
            faculty_role: None,
            capabilities: Capabilities::default(),
            clinic_caps: ClinicCaps { min: 0, max: 20 },
        }
    }

    fn clinic_template() -> RotationTemplate {
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
    fn greedy_fills_every_weekday_block_with_a_primary() {
        let r1 = resident("R1");
        let r2 = resident("R2");
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(); // Monday
        let end = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let blocks = Block::generate_range(start, end, &[]);
        let ctx = crate::context::SchedulingContext::build(
            vec![r1, r2],
            blocks,
            vec![clinic_template()],
            vec![],
            &[],
        );
        let mut gen = GreedyGenerator::new();
        let candidate = gen.generate(&ctx, &GenerateParams::default()).unwrap();
        let primaries = candidate.assignments.iter().filter(|a| a.is_primary()).count();
        assert_eq!(primaries, ctx.blocks().len());
    }

    #[test]
    fn greedy_balances_across_residents() {
        let r1 = resident("R1");
        let r2 = resident("R2");
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let blocks = Block::generate_range(start, end, &[]);
        let ctx = crate::context::SchedulingContext::build(
            vec![r1.clone(), r2.clone()],
            blocks,
            vec![clinic_template()],
            vec![],
            &[],
        );
        let mut gen = GreedyGenerator::new();
        let candidate = gen.generate(&ctx, &GenerateParams::default()).unwrap();
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        for a in candidate.assignments.iter().filter(|a| a.is_primary()) {
            *counts.entry(a.person_id).or_insert(0) += 1;
        }
        let values: Vec<u32> = counts.values().copied().collect();
        assert!(values.iter().max().unwrap() - values.iter().min().unwrap() <= 1);
    }
}
