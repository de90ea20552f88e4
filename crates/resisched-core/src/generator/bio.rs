//! Bio-inspired generator: a small population of candidate weight
//! vectors is evaluated, blended toward the fittest member, and used to
//! drive a weighted greedy construction. Generalizes the teacher's
//! `UserProfile::blend()` linear-interpolation pattern from a single
//! scalar-per-field profile to a 6-dimensional objective vector.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use super::{GenerateParams, Generator, ScheduleCandidate};
use crate::constraints::{ConstraintRegistry, Preset};
use crate::context::SchedulingContext;
use crate::domain::{Algorithm, Assignment, AssignmentRole, Block, Person, RotationTemplate, RunStatus};
use crate::duty_hours::{hours_for_activity, HOURS_CAP_PER_WEEK};

/// Population size per generation.
const POPULATION_SIZE: usize = 8;
/// Generations to run before returning the fittest candidate.
const GENERATIONS: usize = 4;

/// Relative importance of each scheduling objective. Always renormalized
/// to sum to 1 so weights are comparable across individuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveWeights {
    pub coverage: f64,
    pub fairness: f64,
    pub preferences: f64,
    pub learning: f64,
    pub acgme: f64,
    pub continuity: f64,
}

impl ObjectiveWeights {
    pub fn uniform() -> Self {
        Self {
            coverage: 1.0,
            fairness: 1.0,
            preferences: 1.0,
            learning: 1.0,
            acgme: 1.0,
            continuity: 1.0,
        }
        .normalized()
    }

    fn random(rng: &mut StdRng) -> Self {
        Self {
            coverage: rng.gen_range(0.1..1.0),
            fairness: rng.gen_range(0.1..1.0),
            preferences: rng.gen_range(0.1..1.0),
            learning: rng.gen_range(0.1..1.0),
            acgme: rng.gen_range(0.1..1.0),
            continuity: rng.gen_range(0.1..1.0),
        }
        .normalized()
    }

    fn normalized(self) -> Self {
        let sum = self.coverage + self.fairness + self.preferences + self.learning + self.acgme + self.continuity;
        if sum <= 0.0 {
            return Self::uniform();
        }
        Self {
            coverage: self.coverage / sum,
            fairness: self.fairness / sum,
            preferences: self.preferences / sum,
            learning: self.learning / sum,
            acgme: self.acgme / sum,
            continuity: self.continuity / sum,
        }
    }

    /// Linearly interpolate each field toward `other` by `ratio` (0 keeps
    /// `self`, 1 takes `other` fully), then renormalize.
    pub fn blend(&self, other: &Self, ratio: f64) -> Self {
        let lerp = |a: f64, b: f64| a + (b - a) * ratio;
        Self {
            coverage: lerp(self.coverage, other.coverage),
            fairness: lerp(self.fairness, other.fairness),
            preferences: lerp(self.preferences, other.preferences),
            learning: lerp(self.learning, other.learning),
            acgme: lerp(self.acgme, other.acgme),
            continuity: lerp(self.continuity, other.continuity),
        }
        .normalized()
    }
}

/// Weighted-greedy constructor and fitness evaluator for one
/// `ObjectiveWeights` individual.
#[derive(Debug)]
pub struct BioGenerator {
    registry: ConstraintRegistry,
}

impl Default for BioGenerator {
    fn default() -> Self {
        let mut registry = ConstraintRegistry::with_builtins();
        registry.apply_preset(Preset::Standard);
        Self { registry }
    }
}

impl BioGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn construct(
        &self,
        context: &SchedulingContext,
        params: &GenerateParams,
        weights: &ObjectiveWeights,
    ) -> Vec<Assignment> {
        let mut assignments: Vec<Assignment> = context.existing_assignments().to_vec();
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        let mut running_hours: HashMap<Uuid, HashMap<chrono::NaiveDate, f64>> = HashMap::new();
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

        let n_residents = context.residents().len().max(1);
        let n = (params.coverage_density * n_residents as f64).floor().max(1.0) as usize;

        for block in context.blocks() {
            if assigned_blocks.contains(&block.id) {
                continue;
            }
            let Some(template) = pick_template(block, context.templates()) else {
                continue;
            };
            let mut eligible: Vec<&Person> = context
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
                .filter(|r| {
                    !would_exceed_weekly_cap(&running_hours, r.id, block.date, &template.activity_code)
                })
                .collect();
            if eligible.is_empty() {
                continue;
            }
            eligible.sort_by(|a, b| {
                weighted_score(b, &counts, weights)
                    .partial_cmp(&weighted_score(a, &counts, weights))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        super::lexicographic_key(a.id, template.id).cmp(&super::lexicographic_key(b.id, template.id))
                    })
            });

            let take = n.min(eligible.len());
            for (i, person) in eligible.into_iter().take(take).enumerate() {
                let role = if i == 0 { AssignmentRole::Primary } else { AssignmentRole::Backup };
                *counts.entry(person.id).or_insert(0) += 1;
                *running_hours
                    .entry(person.id)
                    .or_default()
                    .entry(block.date)
                    .or_insert(0.0) += hours_for_activity(&template.activity_code);
                assignments.push(Assignment {
                    id: Uuid::new_v4(),
                    block_id: block.id,
                    person_id: person.id,
                    template_id: template.id,
                    role,
                    activity_code: template.activity_code.clone(),
                    notes: None,
                    updated_at: chrono::Utc::now(),
                });
            }
        }
        assignments
    }

    /// Fitness: weighted sum of normalized objective signals, minus a
    /// large penalty per active hard-constraint violation.
    fn fitness(&self, assignments: &[Assignment], context: &SchedulingContext, weights: &ObjectiveWeights) -> f64 {
        let coverage_score = {
            let primary_blocks: std::collections::HashSet<Uuid> =
                assignments.iter().filter(|a| a.is_primary()).map(|a| a.block_id).collect();
            let total = context.blocks().len().max(1);
            primary_blocks.len() as f64 / total as f64
        };

        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        for a in assignments.iter().filter(|a| a.is_primary()) {
            *counts.entry(a.person_id).or_insert(0) += 1;
        }
        let fairness_score = {
            let values: Vec<f64> = counts.values().map(|&c| c as f64).collect();
            if values.len() < 2 {
                1.0
            } else {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                if mean == 0.0 {
                    1.0
                } else {
                    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
                    1.0 / (1.0 + variance.sqrt() / mean)
                }
            }
        };

        let hard_violations: usize = self
            .registry
            .active_names()
            .iter()
            .filter(|name| self.registry.is_hard(name))
            .filter_map(|name| self.registry.get(name))
            .map(|c| c.validate(assignments, context).violations.len())
            .sum();
        let acgme_score = 1.0 / (1.0 + hard_violations as f64);

        let weighted = weights.coverage * coverage_score
            + weights.fairness * fairness_score
            + weights.preferences * 0.5
            + weights.learning * 0.5
            + weights.acgme * acgme_score
            + weights.continuity * 0.5;

        weighted - (hard_violations as f64 * 10.0)
    }
}

fn pick_template<'a>(block: &Block, templates: &'a [RotationTemplate]) -> Option<&'a RotationTemplate> {
    templates.iter().find(|t| {
        if t.is_weekday_only_clinic() {
            !block.is_weekend() && !block.is_holiday
        } else {
            true
        }
    })
}

fn weighted_score(person: &Person, counts: &HashMap<Uuid, u32>, weights: &ObjectiveWeights) -> f64 {
    let count = counts.get(&person.id).copied().unwrap_or(0) as f64;
    let fairness_term = 1.0 / (count + 1.0);
    weights.fairness * fairness_term + weights.coverage * 1.0
}

fn would_exceed_weekly_cap(
    running_hours: &HashMap<Uuid, HashMap<chrono::NaiveDate, f64>>,
    person_id: Uuid,
    date: chrono::NaiveDate,
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

impl Generator for BioGenerator {
    fn generate(&mut self, context: &SchedulingContext, params: &GenerateParams) -> Option<ScheduleCandidate> {
        let start = std::time::Instant::now();
        if context.residents().is_empty() {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut population: Vec<ObjectiveWeights> = (0..POPULATION_SIZE).map(|_| ObjectiveWeights::random(&mut rng)).collect();

        let mut best_assignments: Vec<Assignment> = Vec::new();
        let mut best_fitness = f64::NEG_INFINITY;
        let mut best_weights = population[0];

        for _ in 0..GENERATIONS {
            if start.elapsed() > params.timeout {
                break;
            }
            let mut scored: Vec<(ObjectiveWeights, f64, Vec<Assignment>)> = population
                .iter()
                .map(|w| {
                    let assignments = self.construct(context, params, w);
                    let fitness = self.fitness(&assignments, context, w);
                    (*w, fitness, assignments)
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            if scored[0].1 > best_fitness {
                best_fitness = scored[0].1;
                best_weights = scored[0].0;
                best_assignments = scored[0].2.clone();
            }

            let elite = scored[0].0;
            population = (0..POPULATION_SIZE)
                .map(|i| {
                    if i == 0 {
                        elite
                    } else {
                        let ratio = rng.gen_range(0.2..0.8);
                        ObjectiveWeights::random(&mut rng).blend(&elite, ratio)
                    }
                })
                .collect();
        }

        let _ = best_weights;
        let status = if start.elapsed() > params.timeout {
            RunStatus::Partial
        } else {
            RunStatus::Succeeded
        };
        Some(ScheduleCandidate {
            assignments: best_assignments,
            algorithm: Algorithm::Bio,
            seed: params.seed,
            runtime_ms: start.elapsed().as_millis() as u64,
            status,
        })
    }

    fn clear_cache(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActivityCode, ActivityType, Capabilities, ClinicCaps, PersonKind, PgyLevel,
    };
    use chrono::NaiveDate;

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
    fn objective_weights_blend_stays_normalized() {
        let a = ObjectiveWeights::uniform();
        let b = ObjectiveWeights {
            coverage: 5.0,
            fairness: 0.0,
            preferences: 0.0,
            learning: 0.0,
            acgme: 0.0,
            continuity: 0.0,
        }
        .normalized();
        let blended = a.blend(&b, 0.5);
        let sum = blended.coverage
            + blended.fairness
            + blended.preferences
            + blended.learning
            + blended.acgme
            + blended.continuity;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bio_generator_covers_every_block() {
        let r1 = resident("R1");
        let r2 = resident("R2");
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let blocks = Block::generate_range(start, end, &[]);
        let ctx = crate::context::SchedulingContext::build(
            vec![r1, r2],
            blocks,
            vec![clinic_template()],
            vec![],
            &[],
        );
        let mut gen = BioGenerator::new();
        let candidate = gen.generate(&ctx, &GenerateParams::default()).unwrap();
        let primaries = candidate.assignments.iter().filter(|a| a.is_primary()).count();
        assert_eq!(primaries, ctx.blocks().len());
    }
}
