//! CP-SAT generator substitute.
//!
//! No constraint-solver crate in this workspace's dependency stack
//! provides a real CP-SAT/ILP backend, so this variant is a bounded
//! randomized-restart local search over the same decision space a real
//! CP-SAT model would use: one boolean variable per admissible
//! `(resident, block, template)` triple. It starts from a greedy seed
//! and repeatedly tries single-swap moves that remove a hard-constraint
//! violation, restarting from a fresh greedy seed (new RNG substream) on
//! stagnation. `num_workers` restarts run concurrently via `rayon` is
//! left to the harness layer; this generator itself is single-threaded
//! and deterministic for a fixed seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use super::greedy::GreedyGenerator;
use super::{GenerateParams, Generator, ScheduleCandidate};
use crate::constraints::{ConstraintRegistry, Preset};
use crate::context::SchedulingContext;
use crate::domain::{Algorithm, Assignment, RunStatus};

/// How many swap attempts to try per restart before giving up on it.
const MOVES_PER_RESTART: usize = 200;

#[derive(Debug)]
pub struct CpSatGenerator {
    registry: ConstraintRegistry,
}

impl Default for CpSatGenerator {
    fn default() -> Self {
        let mut registry = ConstraintRegistry::with_builtins();
        registry.apply_preset(Preset::Minimal);
        Self { registry }
    }
}

impl CpSatGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn hard_violation_count(&self, assignments: &[Assignment], context: &SchedulingContext) -> usize {
        self.registry
            .active_names()
            .iter()
            .filter(|name| self.registry.is_hard(name))
            .filter_map(|name| self.registry.get(name))
            .map(|c| c.validate(assignments, context).violations.len())
            .sum()
    }
}

impl Generator for CpSatGenerator {
    fn generate(&mut self, context: &SchedulingContext, params: &GenerateParams) -> Option<ScheduleCandidate> {
        let start = std::time::Instant::now();
        let mut best: Option<Vec<Assignment>> = None;
        let mut best_violations = usize::MAX;

        let mut restart = 0u64;
        loop {
            if start.elapsed() > params.timeout {
                break;
            }
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(restart));
            let mut seed_params = params.clone();
            seed_params.seed = params.seed.wrapping_add(restart);

            let mut greedy = GreedyGenerator::new();
            let Some(seed_candidate) = greedy.generate(context, &seed_params) else {
                return None;
            };
            let mut assignments = seed_candidate.assignments;
            let mut violations = self.hard_violation_count(&assignments, context);

            for _ in 0..MOVES_PER_RESTART {
                if violations == 0 || start.elapsed() > params.timeout {
                    break;
                }
                if assignments.is_empty() {
                    break;
                }
                let idx = rng.gen_range(0..assignments.len());
                let Some(block) = context.block_by_id(assignments[idx].block_id) else {
                    continue;
                };
                let mut candidates: Vec<Uuid> = context
                    .residents()
                    .iter()
                    .filter(|r| context.availability(r.id, block.id))
                    .map(|r| r.id)
                    .collect();
                candidates.shuffle(&mut rng);
                let Some(&replacement) = candidates.first() else {
                    continue;
                };

                let original = assignments[idx].person_id;
                assignments[idx].person_id = replacement;
                let new_violations = self.hard_violation_count(&assignments, context);
                if new_violations <= violations {
                    violations = new_violations;
                } else {
                    assignments[idx].person_id = original;
                }
            }

            if violations < best_violations {
                best_violations = violations;
                best = Some(assignments);
            }
            if best_violations == 0 {
                break;
            }
            restart += 1;
            if restart as usize * MOVES_PER_RESTART > 50_000 {
                break;
            }
        }

        let assignments = best?;
        let status = if best_violations == 0 {
            RunStatus::Succeeded
        } else {
            RunStatus::Partial
        };
        Some(ScheduleCandidate {
            assignments,
            algorithm: Algorithm::CpSat,
            seed: params.seed,
            runtime_ms: start.elapsed().as_millis() as u64,
            status,
        })
    }

    fn clear_cache(&mut self) {}
}
