//! Bounded-iteration scenario runner (C8 step 3): regenerate a
//! schedule against a perturbed context until it is feasible and
//! within `SCORE_RATIO_THRESHOLD` of the baseline score, or give up
//! after `DEFAULT_MAX_ITERATIONS` attempts and report the best one seen.

use chrono::NaiveDate;
use rayon::prelude::*;
use resisched_core::domain::{Absence, Algorithm, Assignment, Block, Person, RotationTemplate};
use resisched_core::evaluator::{self, EvaluationResult, FitnessVector};
use resisched_core::generator::bio::BioGenerator;
use resisched_core::generator::cpsat::CpSatGenerator;
use resisched_core::generator::greedy::GreedyGenerator;
use resisched_core::generator::{GenerateParams, Generator};
use resisched_core::{constraints::ConstraintRegistry, SchedulingContext};

use crate::scenario::Scenario;

/// Spec default: stop retrying a scenario after 50 regenerate attempts.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
/// Spec default: a scenario passes once its score is within 10% of baseline.
pub const DEFAULT_SCORE_RATIO_THRESHOLD: f64 = 0.9;
/// Minimum scenario pass rate the harness requires by default (spec §4.8);
/// the industry target quoted alongside it is 0.95.
pub const DEFAULT_PASS_RATE_THRESHOLD: f64 = 0.8;

/// Raw inputs the harness perturbs per scenario. Mirrors the arguments
/// `SchedulingContext::build` takes, plus the generation knobs needed
/// to replay the pipeline.
#[derive(Debug, Clone)]
pub struct HarnessInputs {
    pub people: Vec<Person>,
    pub blocks: Vec<Block>,
    pub templates: Vec<RotationTemplate>,
    pub absences: Vec<Absence>,
    pub existing_assignments: Vec<Assignment>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub algorithm: Algorithm,
    pub params: GenerateParams,
}

fn generator_for(algorithm: Algorithm) -> Box<dyn Generator> {
    match algorithm {
        Algorithm::Greedy => Box::new(GreedyGenerator::new()),
        Algorithm::CpSat => Box::<CpSatGenerator>::default(),
        Algorithm::Bio => Box::<BioGenerator>::default(),
    }
}

fn zero_evaluation() -> EvaluationResult {
    EvaluationResult {
        valid: false,
        score: 0.0,
        fitness_vector: FitnessVector {
            coverage: 0.0,
            fairness: 0.0,
            preferences: 0.0,
            acgme_compliance: 0.0,
            continuity: 0.0,
            learning: 0.0,
        },
        violations: vec![],
        penalties_by_constraint: Default::default(),
    }
}

fn apply_holidays(blocks: &[Block], holiday_dates: &[NaiveDate]) -> Vec<Block> {
    if holiday_dates.is_empty() {
        return blocks.to_vec();
    }
    blocks
        .iter()
        .map(|b| {
            let mut block = b.clone();
            if holiday_dates.contains(&b.date) {
                block.is_holiday = true;
            }
            block
        })
        .collect()
}

fn build_context(inputs: &HarnessInputs, scenario: &Scenario) -> SchedulingContext {
    let perturbation = scenario.perturbation(inputs.start, inputs.end, &inputs.people);
    let blocks = apply_holidays(&inputs.blocks, &perturbation.holiday_dates);
    let mut absences = inputs.absences.clone();
    absences.extend(perturbation.extra_absences);
    SchedulingContext::build(
        inputs.people.clone(),
        blocks,
        inputs.templates.clone(),
        inputs.existing_assignments.clone(),
        &absences,
    )
}

/// One scenario's outcome: whether the regenerated schedule held up,
/// and how many attempts it took.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub scenario_name: String,
    pub feasible: bool,
    pub score: f64,
    pub score_ratio: f64,
    pub iterations_used: u32,
    pub violated_constraints: Vec<String>,
}

/// Run one scenario to convergence (or exhaustion).
pub fn run_scenario(inputs: &HarnessInputs, registry: &ConstraintRegistry, scenario: &Scenario, baseline_score: f64) -> ScenarioOutcome {
    let context = build_context(inputs, scenario);
    let mut generator = generator_for(inputs.algorithm);

    let mut best = zero_evaluation();
    let mut iterations_used = 0u32;
    for iter in 0..DEFAULT_MAX_ITERATIONS {
        iterations_used = iter + 1;
        let mut params = inputs.params.clone();
        params.seed = inputs.params.seed.wrapping_add(iter as u64);

        let Some(candidate) = generator.generate(&context, &params) else { continue };
        let evaluation = evaluator::evaluate(&candidate.assignments, &context, registry);
        let ratio = score_ratio(evaluation.score, baseline_score);

        if evaluation.score > best.score {
            best = evaluation;
        }
        if best.valid && ratio >= DEFAULT_SCORE_RATIO_THRESHOLD {
            break;
        }
    }

    let score_ratio = score_ratio(best.score, baseline_score);
    ScenarioOutcome {
        scenario_name: scenario.name.clone(),
        feasible: best.valid,
        score: best.score,
        score_ratio,
        iterations_used,
        violated_constraints: best.penalties_by_constraint.keys().cloned().collect(),
    }
}

fn score_ratio(score: f64, baseline_score: f64) -> f64 {
    if baseline_score > 0.0 {
        score / baseline_score
    } else {
        1.0
    }
}

/// Score the unperturbed baseline once; every scenario's ratio is
/// relative to this.
pub fn baseline_score(inputs: &HarnessInputs, registry: &ConstraintRegistry) -> EvaluationResult {
    let context = build_context(inputs, &Scenario::baseline());
    let mut generator = generator_for(inputs.algorithm);
    match generator.generate(&context, &inputs.params) {
        Some(candidate) => evaluator::evaluate(&candidate.assignments, &context, registry),
        None => zero_evaluation(),
    }
}

/// Aggregate result across every scenario in a harness run.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    pub scenarios: Vec<ScenarioOutcome>,
    pub pass_rate: f64,
    pub worst_scenario: Option<String>,
    pub mean_score_degradation: f64,
    pub cascade_rate: f64,
}

/// Run every scenario against `inputs`, fanned out across rayon's
/// thread pool since scenarios are independent of one another.
pub fn run_harness(inputs: &HarnessInputs, registry: &ConstraintRegistry, scenarios: &[Scenario]) -> HarnessResult {
    let baseline = baseline_score(inputs, registry);

    let outcomes: Vec<ScenarioOutcome> = scenarios
        .par_iter()
        .map(|scenario| run_scenario(inputs, registry, scenario, baseline.score))
        .collect();

    let total = outcomes.len().max(1) as f64;
    let pass_rate = outcomes.iter().filter(|o| o.feasible && o.score_ratio >= DEFAULT_SCORE_RATIO_THRESHOLD).count() as f64 / total;
    let worst_scenario = outcomes
        .iter()
        .min_by(|a, b| a.score_ratio.partial_cmp(&b.score_ratio).unwrap_or(std::cmp::Ordering::Equal))
        .map(|o| o.scenario_name.clone());
    let mean_score_degradation = outcomes.iter().map(|o| (1.0 - o.score_ratio).max(0.0)).sum::<f64>() / total;
    let cascade_rate = outcomes.iter().filter(|o| !o.feasible).count() as f64 / total;

    HarnessResult { scenarios: outcomes, pass_rate, worst_scenario, mean_score_degradation, cascade_rate }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resisched_core::domain::{
        ActivityType, Capabilities, ClinicCaps, FacultyRole, PersonKind, RotationTemplate, TimeOfDay,
    };
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn faculty(id: Uuid) -> Person {
        Person {
            id,
            name: "Faculty".to_string(),
            kind: PersonKind::Faculty,
            pgy_level: None,
            faculty_role: Some(FacultyRole::Core),
            capabilities: Capabilities::default(),
            clinic_caps: ClinicCaps { min: 0, max: 10 },
        }
    }

    fn sample_inputs() -> HarnessInputs {
        let faculty_id = Uuid::new_v4();
        let blocks: Vec<Block> = (1..=7).map(|d| Block::new(day(d), TimeOfDay::Am, false)).collect();
        let template = RotationTemplate {
            id: Uuid::new_v4(),
            name: "FM Clinic".to_string(),
            abbreviation: "FM".to_string(),
            activity_type: ActivityType::Clinic,
            activity_code: resisched_core::domain::ActivityCode::FmClinic,
            requires_specialty: None,
            requires_procedure_credential: false,
            max_residents: Some(4),
            min_pgy_level: None,
            supervision_ratio: None,
        };
        HarnessInputs {
            people: vec![faculty(faculty_id)],
            blocks,
            templates: vec![template],
            absences: vec![],
            existing_assignments: vec![],
            start: day(1),
            end: day(7),
            algorithm: Algorithm::Greedy,
            params: GenerateParams::default(),
        }
    }

    #[test]
    fn baseline_scenario_does_not_degrade_itself() {
        let inputs = sample_inputs();
        let registry = ConstraintRegistry::with_builtins();
        let baseline = baseline_score(&inputs, &registry);
        let outcome = run_scenario(&inputs, &registry, &Scenario::baseline(), baseline.score);
        assert!((outcome.score_ratio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn run_harness_reports_one_outcome_per_scenario() {
        let inputs = sample_inputs();
        let registry = ConstraintRegistry::with_builtins();
        let scenarios = vec![Scenario::baseline(), Scenario::remove_faculty(Uuid::new_v4())];
        let result = run_harness(&inputs, &registry, &scenarios);
        assert_eq!(result.scenarios.len(), 2);
        assert!(result.pass_rate >= 0.0 && result.pass_rate <= 1.0);
    }
}
