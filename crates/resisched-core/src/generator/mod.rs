//! Candidate Generator (C4): pluggable scheduling algorithms that turn
//! a `SchedulingContext` into a `ScheduleCandidate`.

pub mod bio;
pub mod cpsat;
pub mod greedy;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::SchedulingContext;
use crate::domain::{Algorithm, Assignment, RunStatus};

/// Tunables shared by every generator variant.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    /// RNG seed; generators must be deterministic for a fixed seed.
    pub seed: u64,
    /// Target coverage density `ρ`: fraction of eligible residents to
    /// assign per block (`n = max(1, ⌊ρ · |residents|⌋)`).
    pub coverage_density: f64,
    /// Wall-clock budget. Generators check this between blocks and
    /// return a partial candidate rather than exceeding it.
    pub timeout: Duration,
    /// Parallelism hint for search-based generators (CP-SAT substitute).
    pub num_workers: usize,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            seed: 42,
            coverage_density: 1.0,
            timeout: Duration::from_secs(30),
            num_workers: 1,
        }
    }
}

/// Output of one generator run: the assignments plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleCandidate {
    pub assignments: Vec<Assignment>,
    pub algorithm: Algorithm,
    pub seed: u64,
    pub runtime_ms: u64,
    pub status: RunStatus,
}

/// Polymorphic capability set every generator implements.
pub trait Generator {
    fn generate(&mut self, context: &SchedulingContext, params: &GenerateParams) -> Option<ScheduleCandidate>;

    fn generate_batch(
        &mut self,
        context: &SchedulingContext,
        params: &GenerateParams,
        count: usize,
    ) -> Vec<ScheduleCandidate> {
        (0..count)
            .filter_map(|i| {
                let mut batch_params = params.clone();
                batch_params.seed = params.seed.wrapping_add(i as u64);
                self.generate(context, &batch_params)
            })
            .collect()
    }

    /// Discard any memoized per-context state. Generators that cache
    /// nothing can leave this as a no-op.
    fn clear_cache(&mut self) {}
}

/// Deterministic lexicographic tie-break on `(person_id, template_id)`,
/// used by every generator so runs are reproducible under a fixed seed.
pub fn lexicographic_key(person_id: Uuid, template_id: Uuid) -> (Uuid, Uuid) {
    (person_id, template_id)
}
