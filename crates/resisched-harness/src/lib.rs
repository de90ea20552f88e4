//! Resilience harness (C8): replay a baseline schedule against
//! adversarial scenarios (faculty/resident loss, unexpected leave,
//! holiday shocks, N-2 faculty-pair loss) and report how far the
//! regenerated schedule falls from the baseline's score.

pub mod n2;
pub mod scenario;
pub mod simulator;

pub use n2::{run_n2, FailureMode, N2Result, PairOutcome};
pub use scenario::{Perturbation, Scenario, ScenarioKind};
pub use simulator::{
    baseline_score, run_harness, run_scenario, HarnessInputs, HarnessResult, ScenarioOutcome,
    DEFAULT_MAX_ITERATIONS, DEFAULT_PASS_RATE_THRESHOLD, DEFAULT_SCORE_RATIO_THRESHOLD,
};
