//! In-memory adapter for all five ports. Backs the resilience harness
//! and integration tests (no sqlite round-trip to slow down a
//! thousand-scenario fan-out) and doubles as the CLI's default store
//! when no `--db` path is given.
//!
//! Shared mutable state behind `Arc<RwLock<_>>`, matching the cache
//! half of `iqrah-storage`'s `NodeRegistry`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use resisched_core::domain::{Absence, Assignment, Block, Person, RotationTemplate, RunStatus, ScheduleRun, ScheduleSnapshot};
use resisched_core::explain::DecisionExplanation;
use resisched_core::integrity::approval_chain::ApprovalRecord;
use resisched_core::integrity::idempotency::IdempotencyRecord;
use resisched_core::integrity::outbox::{OutboxMessage, OutboxStatus};
use resisched_core::ports::{AssignmentRepository, ContextRepository, ExplanationRepository, IntegrityRepository, RunRepository};

#[derive(Default)]
struct State {
    people: Vec<Person>,
    blocks: Vec<Block>,
    templates: Vec<RotationTemplate>,
    absences: Vec<Absence>,
    /// Tagged with the run that produced each assignment, so `for_run`
    /// and a range-wide delete-and-replace can both be served.
    assignments: Vec<(Uuid, Assignment)>,
    runs: HashMap<Uuid, ScheduleRun>,
    snapshots: HashMap<(NaiveDate, NaiveDate), ScheduleSnapshot>,
    explanations: HashMap<Uuid, DecisionExplanation>,
    idempotency: HashMap<String, IdempotencyRecord>,
    outbox: Vec<OutboxMessage>,
    outbox_sequences: HashMap<Uuid, u64>,
    chains: HashMap<String, Vec<ApprovalRecord>>,
}

/// Cheaply `Clone`-able handle onto one in-memory store; every clone
/// shares the same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, people: Vec<Person>, blocks: Vec<Block>, templates: Vec<RotationTemplate>, absences: Vec<Absence>) {
        let mut state = self.state.write().await;
        state.people = people;
        state.blocks = blocks;
        state.templates = templates;
        state.absences = absences;
    }
}

#[async_trait]
impl ContextRepository for InMemoryStore {
    async fn people(&self) -> anyhow::Result<Vec<Person>> {
        Ok(self.state.read().await.people.clone())
    }

    async fn blocks(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Block>> {
        Ok(self
            .state
            .read()
            .await
            .blocks
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }

    async fn templates(&self) -> anyhow::Result<Vec<RotationTemplate>> {
        Ok(self.state.read().await.templates.clone())
    }

    async fn absences(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Absence>> {
        Ok(self
            .state
            .read()
            .await
            .absences
            .iter()
            .filter(|a| a.start_date <= end && start <= a.end_date)
            .cloned()
            .collect())
    }

    async fn existing_assignments(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Assignment>> {
        let state = self.state.read().await;
        Ok(assignments_in_range(&state, start, end).map(|(_, a)| a.clone()).collect())
    }
}

fn assignments_in_range<'a>(
    state: &'a State,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = &'a (Uuid, Assignment)> {
    state.assignments.iter().filter(move |(_, assignment)| {
        state
            .blocks
            .iter()
            .find(|b| b.id == assignment.block_id)
            .map(|b| b.date >= start && b.date <= end)
            .unwrap_or(false)
    })
}

#[async_trait]
impl RunRepository for InMemoryStore {
    async fn create(&self, run: ScheduleRun) -> anyhow::Result<()> {
        self.state.write().await.runs.insert(run.id, run);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<ScheduleRun>> {
        Ok(self.state.read().await.runs.get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: RunStatus) -> anyhow::Result<()> {
        if let Some(run) = self.state.write().await.runs.get_mut(&id) {
            run.status = status;
        }
        Ok(())
    }

    async fn find_in_progress_overlapping(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Option<ScheduleRun>> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .values()
            .find(|run| run.status == RunStatus::InProgress && run.overlaps(start, end))
            .cloned())
    }

    async fn latest_snapshot(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Option<ScheduleSnapshot>> {
        Ok(self.state.read().await.snapshots.get(&(start, end)).cloned())
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryStore {
    async fn replace_for_range(&self, run_id: Uuid, start: NaiveDate, end: NaiveDate, assignments: Vec<Assignment>) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        let blocks = state.blocks.clone();
        state.assignments.retain(|(_, assignment)| {
            blocks
                .iter()
                .find(|b| b.id == assignment.block_id)
                .map(|b| !(b.date >= start && b.date <= end))
                .unwrap_or(true)
        });
        state.assignments.extend(assignments.into_iter().map(|a| (run_id, a)));

        let snapshot = ScheduleSnapshot::from_triples(
            state
                .assignments
                .iter()
                .filter(|(tagged_run, a)| *tagged_run == run_id && a.is_primary())
                .map(|(_, a)| (a.person_id, a.block_id, a.template_id)),
        );
        state.snapshots.insert((start, end), snapshot);
        Ok(())
    }

    async fn for_range(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Assignment>> {
        let state = self.state.read().await;
        Ok(assignments_in_range(&state, start, end).map(|(_, a)| a.clone()).collect())
    }

    async fn for_run(&self, run_id: Uuid) -> anyhow::Result<Vec<Assignment>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .iter()
            .filter(|(tagged_run, _)| *tagged_run == run_id)
            .map(|(_, a)| a.clone())
            .collect())
    }
}

#[async_trait]
impl ExplanationRepository for InMemoryStore {
    async fn save_batch(&self, explanations: Vec<DecisionExplanation>) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        for explanation in explanations {
            state.explanations.insert(explanation.assignment_id, explanation);
        }
        Ok(())
    }

    async fn for_assignment(&self, assignment_id: Uuid) -> anyhow::Result<Option<DecisionExplanation>> {
        Ok(self.state.read().await.explanations.get(&assignment_id).cloned())
    }
}

#[async_trait]
impl IntegrityRepository for InMemoryStore {
    async fn find_idempotency_record(&self, key: &str) -> anyhow::Result<Option<IdempotencyRecord>> {
        Ok(self.state.read().await.idempotency.get(key).cloned())
    }

    async fn save_idempotency_record(&self, record: IdempotencyRecord) -> anyhow::Result<()> {
        self.state.write().await.idempotency.insert(record.key.clone(), record);
        Ok(())
    }

    async fn next_outbox_sequence(&self, aggregate_id: Uuid) -> anyhow::Result<u64> {
        let mut state = self.state.write().await;
        let next = state.outbox_sequences.entry(aggregate_id).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    async fn enqueue_outbox_message(&self, message: OutboxMessage) -> anyhow::Result<()> {
        self.state.write().await.outbox.push(message);
        Ok(())
    }

    async fn claim_outbox_batch(&self, batch_size: usize) -> anyhow::Result<Vec<OutboxMessage>> {
        let mut state = self.state.write().await;
        let mut claimed = Vec::with_capacity(batch_size);
        for message in state.outbox.iter_mut() {
            if claimed.len() >= batch_size {
                break;
            }
            if message.status == OutboxStatus::Pending {
                message.status = OutboxStatus::Processing;
                claimed.push(message.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_outbox_published(&self, message_id: Uuid) -> anyhow::Result<()> {
        if let Some(message) = self.state.write().await.outbox.iter_mut().find(|m| m.id == message_id) {
            message.status = OutboxStatus::Published;
        }
        Ok(())
    }

    async fn append_approval_record(&self, record: ApprovalRecord) -> anyhow::Result<()> {
        self.state.write().await.chains.entry(record.chain_id.clone()).or_default().push(record);
        Ok(())
    }

    async fn chain_head(&self, chain_id: &str) -> anyhow::Result<Option<ApprovalRecord>> {
        Ok(self.state.read().await.chains.get(chain_id).and_then(|records| records.last().cloned()))
    }

    async fn chain_records(&self, chain_id: &str) -> anyhow::Result<Vec<ApprovalRecord>> {
        Ok(self.state.read().await.chains.get(chain_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resisched_core::domain::{Algorithm, TimeOfDay};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn sample_run(id: Uuid, status: RunStatus) -> ScheduleRun {
        ScheduleRun {
            id,
            start_date: date(1),
            end_date: date(7),
            algorithm: Algorithm::Greedy,
            status,
            total_assigned: 0,
            acgme_violations: 0,
            runtime_seconds: 0.0,
            config_json: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn find_in_progress_overlapping_matches_only_in_progress() {
        let store = InMemoryStore::new();
        store.create(sample_run(Uuid::new_v4(), RunStatus::Succeeded)).await.unwrap();
        assert!(store.find_in_progress_overlapping(date(1), date(7)).await.unwrap().is_none());

        let id = Uuid::new_v4();
        store.create(sample_run(id, RunStatus::InProgress)).await.unwrap();
        let found = store.find_in_progress_overlapping(date(3), date(10)).await.unwrap();
        assert_eq!(found.unwrap().id, id);
    }

    #[tokio::test]
    async fn replace_for_range_evicts_only_assignments_in_range() {
        let store = InMemoryStore::new();
        let block_in = Block::new(date(2), TimeOfDay::Am, false);
        let block_out = Block::new(date(20), TimeOfDay::Am, false);
        store.seed(vec![], vec![block_in.clone(), block_out.clone()], vec![], vec![]).await;

        let assignment_out = Assignment {
            id: Uuid::new_v4(),
            block_id: block_out.id,
            person_id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            role: resisched_core::domain::AssignmentRole::Primary,
            activity_code: resisched_core::domain::ActivityCode::FmClinic,
            notes: None,
            updated_at: chrono::Utc::now(),
        };
        store
            .replace_for_range(Uuid::new_v4(), date(1), date(1), vec![assignment_out.clone()])
            .await
            .unwrap();

        let run_id = Uuid::new_v4();
        let assignment_in = Assignment {
            id: Uuid::new_v4(),
            block_id: block_in.id,
            ..assignment_out.clone()
        };
        store
            .replace_for_range(run_id, date(1), date(7), vec![assignment_in.clone()])
            .await
            .unwrap();

        let remaining = store.for_range(date(1), date(31)).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|a| a.id == assignment_out.id));
        assert!(remaining.iter().any(|a| a.id == assignment_in.id));
    }

    #[tokio::test]
    async fn claim_outbox_batch_marks_processing_and_excludes_already_claimed() {
        let store = InMemoryStore::new();
        let message = OutboxMessage {
            id: Uuid::new_v4(),
            aggregate_type: "schedule_run".to_string(),
            aggregate_id: Uuid::new_v4(),
            event_type: "schedule.generated".to_string(),
            sequence: 1,
            payload: serde_json::json!({}),
            status: OutboxStatus::Pending,
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            created_at: chrono::Utc::now(),
        };
        store.enqueue_outbox_message(message.clone()).await.unwrap();

        let first_batch = store.claim_outbox_batch(10).await.unwrap();
        assert_eq!(first_batch.len(), 1);
        let second_batch = store.claim_outbox_batch(10).await.unwrap();
        assert!(second_batch.is_empty());
    }
}
