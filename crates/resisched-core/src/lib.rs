//! Residency scheduling engine: context, constraints, solvers, compliance
//! validation, and explainability. Synchronous and I/O-free; adapters
//! in `resisched-storage` and callers in `resisched-cli`/`resisched-harness`
//! own persistence and concurrency.

pub mod acgme_audit;
pub mod anti_churn;
pub mod constraints;
pub mod context;
pub mod domain;
pub mod duty_hours;
pub mod equity;
pub mod evaluator;
pub mod explain;
pub mod generator;
pub mod immune;
pub mod integrity;
pub mod orchestrator;
pub mod ports;
pub mod presolver;

pub use context::SchedulingContext;
pub use domain::{DomainError, DomainResult, StatusHint};
pub use evaluator::{evaluate, EvaluationResult};
pub use generator::{GenerateParams, Generator, ScheduleCandidate};
pub use orchestrator::{
    GenerateScheduleRequest, GenerateScheduleResponse, Orchestrator, OrchestratorError,
};
