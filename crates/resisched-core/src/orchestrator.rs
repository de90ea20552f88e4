//! Orchestrator (C12): the single entry point, `generate_schedule`,
//! that wires context building, pre-solving, generation, evaluation,
//! anti-churn, ACGME auditing, and the C10 integrity trio together
//! behind the storage ports. Everything upstream of this module is
//! synchronous and I/O-free; this is where that pure core meets
//! `resisched-storage`.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::acgme_audit;
use crate::anti_churn::{self, ChurnSeverity};
use crate::constraints::{ConstraintRegistry, Preset};
use crate::context::SchedulingContext;
use crate::domain::{Algorithm, RunStatus, ScheduleRun, ScheduleSnapshot};
use crate::evaluator;
use crate::explain::{self, DecisionInputs};
use crate::generator::bio::BioGenerator;
use crate::generator::cpsat::CpSatGenerator;
use crate::generator::greedy::GreedyGenerator;
use crate::generator::{GenerateParams, Generator};
use crate::integrity::approval_chain::{ActorKind, ApprovalAction, ApprovalRecord};
use crate::integrity::idempotency::{self, IdempotencyDecision, IdempotencyRecord};
use crate::integrity::outbox::OutboxMessage;
use crate::ports::{AssignmentRepository, ContextRepository, ExplanationRepository, IntegrityRepository, RunRepository};
use crate::presolver;

#[derive(Debug, Clone)]
pub struct GenerateScheduleRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub algorithm: Algorithm,
    pub params: GenerateParams,
}

fn request_fingerprint(request: &GenerateScheduleRequest) -> serde_json::Value {
    serde_json::json!({
        "start_date": request.start_date,
        "end_date": request.end_date,
        "algorithm": request.algorithm,
        "seed": request.params.seed,
        "coverage_density": request.params.coverage_density,
        "num_workers": request.params.num_workers,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateScheduleResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub total_assigned: u32,
    pub coverage: f64,
    pub acgme_violations: u32,
    pub rigidity: f64,
    pub severity: ChurnSeverity,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("a run is already in progress for an overlapping date range")]
    Conflict,
    #[error("request body does not match the idempotency key's prior request")]
    IdempotencyConflict,
    #[error("pre-solver judged the request infeasible: {0:?}")]
    Infeasible(Vec<String>),
    #[error("generator produced no candidate within its deadline")]
    GenerationFailed,
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

fn generator_for(algorithm: Algorithm) -> Box<dyn Generator> {
    match algorithm {
        Algorithm::Greedy => Box::new(GreedyGenerator::new()),
        Algorithm::CpSat => Box::<CpSatGenerator>::default(),
        Algorithm::Bio => Box::<BioGenerator>::default(),
    }
}

/// Ties the pure core to its storage ports. Constructed once per
/// process with `Arc`-shared adapters; `generate_schedule` is safe to
/// call concurrently for non-overlapping date ranges (the run lock in
/// step 2 rejects overlapping ones).
pub struct Orchestrator {
    pub context_repo: Arc<dyn ContextRepository>,
    pub run_repo: Arc<dyn RunRepository>,
    pub assignment_repo: Arc<dyn AssignmentRepository>,
    pub explanation_repo: Arc<dyn ExplanationRepository>,
    pub integrity_repo: Arc<dyn IntegrityRepository>,
}

impl Orchestrator {
    pub async fn generate_schedule(
        &self,
        request: GenerateScheduleRequest,
        idempotency_key: Option<String>,
        actor_id: Option<Uuid>,
        actor_kind: ActorKind,
    ) -> Result<GenerateScheduleResponse, OrchestratorError> {
        let body_hash = idempotency::canonical_body_hash(&request_fingerprint(&request));

        // 1. Idempotency check. `pending_record` carries the original
        // `created_at` through to step 8, so completing it doesn't reset
        // the TTL's anchor to the completion time.
        let mut pending_record: Option<IdempotencyRecord> = None;
        if let Some(key) = &idempotency_key {
            let existing = self.integrity_repo.find_idempotency_record(key).await?;
            match idempotency::decide(existing.as_ref(), &body_hash, Utc::now()) {
                IdempotencyDecision::Replay(cached) => {
                    return Ok(serde_json::from_value(cached).map_err(|e| OrchestratorError::Repository(e.into()))?);
                }
                IdempotencyDecision::Conflict => return Err(OrchestratorError::IdempotencyConflict),
                IdempotencyDecision::InProgress => return Err(OrchestratorError::Conflict),
                IdempotencyDecision::Proceed => {
                    let record = IdempotencyRecord::new_pending(key.clone(), body_hash.clone(), Utc::now());
                    self.integrity_repo.save_idempotency_record(record.clone()).await?;
                    pending_record = Some(record);
                }
            }
        }

        // 2. Unique-run lock for the date range.
        if self
            .run_repo
            .find_in_progress_overlapping(request.start_date, request.end_date)
            .await?
            .is_some()
        {
            return Err(OrchestratorError::Conflict);
        }

        // 3. Build context; run pre-solver; fail fast on infeasibility.
        let people = self.context_repo.people().await?;
        let blocks = self.context_repo.blocks(request.start_date, request.end_date).await?;
        let templates = self.context_repo.templates().await?;
        let absences = self.context_repo.absences(request.start_date, request.end_date).await?;
        let existing_assignments = self
            .context_repo
            .existing_assignments(request.start_date, request.end_date)
            .await?;

        let context = SchedulingContext::build(people, blocks, templates, existing_assignments, &absences);

        let presolver_result = presolver::validate_saturation(&context, 1);
        if !presolver_result.feasible {
            if let Some(record) = pending_record.clone() {
                self.integrity_repo.save_idempotency_record(record).await.ok();
            }
            return Err(OrchestratorError::Infeasible(presolver_result.issues));
        }

        // 4-5. Generate, evaluate, compute anti-churn vs. the last snapshot.
        // Deleting prior assignments in the range is `assignment_repo`'s
        // transactional responsibility (storage owns row locks).
        let started = Instant::now();
        let mut generator = generator_for(request.algorithm);
        let candidate = generator
            .generate(&context, &request.params)
            .ok_or(OrchestratorError::GenerationFailed)?;

        let mut registry = ConstraintRegistry::with_builtins();
        registry.apply_preset(Preset::Standard);
        let evaluation = evaluator::evaluate(&candidate.assignments, &context, &registry);

        let new_snapshot = ScheduleSnapshot::from_triples(
            candidate
                .assignments
                .iter()
                .filter(|a| a.is_primary())
                .map(|a| (a.person_id, a.block_id, a.template_id)),
        );
        let previous_snapshot = self
            .run_repo
            .latest_snapshot(request.start_date, request.end_date)
            .await?
            .unwrap_or_else(ScheduleSnapshot::empty);

        let churn = anti_churn::estimate_churn_impact(&previous_snapshot, &new_snapshot);
        let rigidity = anti_churn::rigidity(&new_snapshot, &previous_snapshot);

        // ACGME post-hoc audit, folded into the persisted run record.
        let audit = acgme_audit::validate_all(&candidate.assignments, &context, request.start_date, request.end_date);

        let run_id = Uuid::new_v4();
        let total_assigned = candidate.assignments.iter().filter(|a| a.is_primary()).count() as u32;
        let total_blocks = context.blocks().iter().filter(|b| !b.is_weekend()).count();
        let coverage = if total_blocks > 0 {
            total_assigned as f64 / total_blocks as f64
        } else {
            0.0
        };

        let run = ScheduleRun {
            id: run_id,
            start_date: request.start_date,
            end_date: request.end_date,
            algorithm: request.algorithm,
            status: candidate.status,
            total_assigned,
            acgme_violations: audit.violations.len() as u32,
            runtime_seconds: started.elapsed().as_secs_f64(),
            config_json: serde_json::json!({
                "seed": request.params.seed,
                "coverage_density": request.params.coverage_density,
                "num_workers": request.params.num_workers,
                "timeout_secs": request.params.timeout.as_secs(),
            }),
        };

        // 6. Persist assignments + explanations; append approval record + outbox message.
        self.run_repo.create(run).await?;
        self.assignment_repo
            .replace_for_range(run_id, request.start_date, request.end_date, candidate.assignments.clone())
            .await?;

        let timestamp = Utc::now();
        let explanations = candidate
            .assignments
            .iter()
            .filter(|a| a.is_primary())
            .map(|assignment| {
                let scores: std::collections::HashMap<Uuid, f64> =
                    std::iter::once((assignment.person_id, evaluation.score)).collect();
                let inputs = DecisionInputs {
                    assignment_id: assignment.id,
                    selected_person_id: assignment.person_id,
                    block_id: assignment.block_id,
                    template_id: assignment.template_id,
                    all_candidate_ids: std::slice::from_ref(&assignment.person_id),
                    candidate_scores: &scores,
                    constraint_evaluations: Vec::new(),
                    algorithm: request.algorithm,
                    solver_version: explain::SOLVER_VERSION,
                    random_seed: Some(candidate.seed),
                };
                explain::explain(inputs, timestamp)
            })
            .collect();
        self.explanation_repo.save_batch(explanations).await?;

        let chain_id = format!("{}_{}", request.start_date, request.end_date);
        let payload = serde_json::json!({
            "run_id": run_id,
            "total_assigned": total_assigned,
            "coverage": coverage,
        });
        let record = match self.integrity_repo.chain_head(&chain_id).await? {
            Some(head) => ApprovalRecord::append(
                &head,
                ApprovalAction::ScheduleGenerated,
                payload,
                actor_id,
                actor_kind,
                None,
                timestamp,
            ),
            None => ApprovalRecord::genesis(chain_id, payload, actor_id, actor_kind, timestamp),
        };
        self.integrity_repo.append_approval_record(record).await?;

        let outbox_sequence = self.integrity_repo.next_outbox_sequence(run_id).await?;
        self.integrity_repo
            .enqueue_outbox_message(OutboxMessage {
                id: Uuid::new_v4(),
                aggregate_type: "schedule_run".to_string(),
                aggregate_id: run_id,
                event_type: "schedule.generated".to_string(),
                sequence: outbox_sequence,
                payload: serde_json::json!({
                    "run_id": run_id,
                    "start_date": request.start_date,
                    "end_date": request.end_date,
                }),
                status: crate::integrity::outbox::OutboxStatus::Pending,
                retry_count: 0,
                max_retries: crate::integrity::outbox::DEFAULT_MAX_RETRIES,
                next_retry_at: None,
                created_at: timestamp,
            })
            .await?;

        let response = GenerateScheduleResponse {
            run_id,
            status: candidate.status,
            total_assigned,
            coverage,
            acgme_violations: audit.violations.len() as u32,
            rigidity,
            severity: churn.severity,
        };

        // 8. Mark idempotency record completed with the response payload,
        // keeping the `created_at` stamped when the request first arrived.
        if let Some(mut record) = pending_record {
            record.status = crate::integrity::idempotency::IdempotencyStatus::Completed;
            record.response_body = Some(serde_json::to_value(&response).map_err(|e| OrchestratorError::Repository(e.into()))?);
            self.integrity_repo.save_idempotency_record(record).await?;
        }

        Ok(response)
    }
}
