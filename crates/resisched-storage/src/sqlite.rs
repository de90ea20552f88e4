//! Sqlite adapter for all five ports, sharing one `SqlitePool` the way
//! `SqliteContentRepository`/`SqliteUserRepository` each wrap a pool
//! for their bounded database. Every row carries a `data` JSON column
//! (see `schema.rs`); only the columns a query actually filters or
//! joins on are promoted to real SQL columns.
//!
//! Queries use the runtime `sqlx::query`/`.bind()` API rather than the
//! `query!`/`query_as!` compile-time macros the teacher favors
//! elsewhere, since those macros type-check against a live database at
//! build time.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use resisched_core::domain::{
    Absence, Assignment, Block, Person, RotationTemplate, RunStatus, ScheduleRun, ScheduleSnapshot,
};
use resisched_core::explain::DecisionExplanation;
use resisched_core::integrity::approval_chain::ApprovalRecord;
use resisched_core::integrity::idempotency::IdempotencyRecord;
use resisched_core::integrity::outbox::{OutboxMessage, OutboxStatus};
use resisched_core::ports::{
    AssignmentRepository, ContextRepository, ExplanationRepository, IntegrityRepository, RunRepository,
};

use crate::error::Result as StorageResult;
use crate::schema;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &str) -> StorageResult<Self> {
        Ok(Self { pool: schema::init_db(db_path).await? })
    }

    pub async fn in_memory() -> StorageResult<Self> {
        Ok(Self { pool: schema::init_memory_db().await? })
    }

    /// Underlying pool, for callers that seed the context tables
    /// directly (outside the five ports this adapter implements).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn status_str(status: RunStatus) -> &'static str {
        match status {
            RunStatus::Pending => "pending",
            RunStatus::InProgress => "in_progress",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    fn outbox_status_str(status: OutboxStatus) -> &'static str {
        match status {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Published => "published",
            OutboxStatus::Failed => "failed",
        }
    }
}

#[async_trait]
impl ContextRepository for SqliteStore {
    async fn people(&self) -> anyhow::Result<Vec<Person>> {
        let rows = sqlx::query("SELECT data FROM people").fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("data")))
            .collect::<Result<_, _>>()?)
    }

    async fn blocks(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Block>> {
        let rows = sqlx::query("SELECT data FROM blocks WHERE date >= ? AND date <= ? ORDER BY date")
            .bind(start.to_string())
            .bind(end.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("data")))
            .collect::<Result<_, _>>()?)
    }

    async fn templates(&self) -> anyhow::Result<Vec<RotationTemplate>> {
        let rows = sqlx::query("SELECT data FROM templates").fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("data")))
            .collect::<Result<_, _>>()?)
    }

    async fn absences(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Absence>> {
        let rows = sqlx::query("SELECT data FROM absences WHERE start_date <= ? AND end_date >= ?")
            .bind(end.to_string())
            .bind(start.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("data")))
            .collect::<Result<_, _>>()?)
    }

    async fn existing_assignments(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Assignment>> {
        let rows = sqlx::query(
            "SELECT assignments.data AS data FROM assignments
             JOIN blocks ON assignments.block_id = blocks.id
             WHERE blocks.date >= ? AND blocks.date <= ?",
        )
        .bind(start.to_string())
        .bind(end.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("data")))
            .collect::<Result<_, _>>()?)
    }
}

#[async_trait]
impl RunRepository for SqliteStore {
    async fn create(&self, run: ScheduleRun) -> anyhow::Result<()> {
        let data = serde_json::to_string(&run)?;
        sqlx::query(
            "INSERT INTO runs (id, start_date, end_date, status, data) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET start_date=excluded.start_date, end_date=excluded.end_date,
                status=excluded.status, data=excluded.data",
        )
        .bind(run.id.to_string())
        .bind(run.start_date.to_string())
        .bind(run.end_date.to_string())
        .bind(Self::status_str(run.status))
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<ScheduleRun>> {
        let row = sqlx::query("SELECT data FROM runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| serde_json::from_str(&r.get::<String, _>("data"))).transpose()?)
    }

    async fn update_status(&self, id: Uuid, status: RunStatus) -> anyhow::Result<()> {
        let Some(mut run) = self.find(id).await? else {
            return Ok(());
        };
        run.status = status;
        let data = serde_json::to_string(&run)?;
        sqlx::query("UPDATE runs SET status = ?, data = ? WHERE id = ?")
            .bind(Self::status_str(status))
            .bind(data)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_in_progress_overlapping(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Option<ScheduleRun>> {
        let row = sqlx::query(
            "SELECT data FROM runs WHERE status = ? AND start_date <= ? AND end_date >= ? LIMIT 1",
        )
        .bind(Self::status_str(RunStatus::InProgress))
        .bind(end.to_string())
        .bind(start.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| serde_json::from_str(&r.get::<String, _>("data"))).transpose()?)
    }

    async fn latest_snapshot(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Option<ScheduleSnapshot>> {
        let row = sqlx::query("SELECT data FROM snapshots WHERE start_date = ? AND end_date = ?")
            .bind(start.to_string())
            .bind(end.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| serde_json::from_str(&r.get::<String, _>("data"))).transpose()?)
    }
}

#[async_trait]
impl AssignmentRepository for SqliteStore {
    async fn replace_for_range(
        &self,
        run_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        assignments: Vec<Assignment>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM assignments WHERE block_id IN (SELECT id FROM blocks WHERE date >= ? AND date <= ?)",
        )
        .bind(start.to_string())
        .bind(end.to_string())
        .execute(&mut *tx)
        .await?;

        for assignment in &assignments {
            let data = serde_json::to_string(assignment)?;
            sqlx::query("INSERT INTO assignments (id, run_id, block_id, data) VALUES (?, ?, ?, ?)")
                .bind(assignment.id.to_string())
                .bind(run_id.to_string())
                .bind(assignment.block_id.to_string())
                .bind(data)
                .execute(&mut *tx)
                .await?;
        }

        let snapshot = ScheduleSnapshot::from_triples(
            assignments.iter().filter(|a| a.is_primary()).map(|a| (a.person_id, a.block_id, a.template_id)),
        );
        let snapshot_data = serde_json::to_string(&snapshot)?;
        sqlx::query(
            "INSERT INTO snapshots (start_date, end_date, data) VALUES (?, ?, ?)
             ON CONFLICT(start_date, end_date) DO UPDATE SET data = excluded.data",
        )
        .bind(start.to_string())
        .bind(end.to_string())
        .bind(snapshot_data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn for_range(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Assignment>> {
        ContextRepository::existing_assignments(self, start, end).await
    }

    async fn for_run(&self, run_id: Uuid) -> anyhow::Result<Vec<Assignment>> {
        let rows = sqlx::query("SELECT data FROM assignments WHERE run_id = ?")
            .bind(run_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("data")))
            .collect::<Result<_, _>>()?)
    }
}

#[async_trait]
impl ExplanationRepository for SqliteStore {
    async fn save_batch(&self, explanations: Vec<DecisionExplanation>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for explanation in &explanations {
            let data = serde_json::to_string(explanation)?;
            sqlx::query(
                "INSERT INTO explanations (assignment_id, data) VALUES (?, ?)
                 ON CONFLICT(assignment_id) DO UPDATE SET data = excluded.data",
            )
            .bind(explanation.assignment_id.to_string())
            .bind(data)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn for_assignment(&self, assignment_id: Uuid) -> anyhow::Result<Option<DecisionExplanation>> {
        let row = sqlx::query("SELECT data FROM explanations WHERE assignment_id = ?")
            .bind(assignment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| serde_json::from_str(&r.get::<String, _>("data"))).transpose()?)
    }
}

#[async_trait]
impl IntegrityRepository for SqliteStore {
    async fn find_idempotency_record(&self, key: &str) -> anyhow::Result<Option<IdempotencyRecord>> {
        let row = sqlx::query("SELECT data FROM idempotency_records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| serde_json::from_str(&r.get::<String, _>("data"))).transpose()?)
    }

    async fn save_idempotency_record(&self, record: IdempotencyRecord) -> anyhow::Result<()> {
        let data = serde_json::to_string(&record)?;
        sqlx::query(
            "INSERT INTO idempotency_records (key, data) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data",
        )
        .bind(record.key.as_str())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn next_outbox_sequence(&self, aggregate_id: Uuid) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let current: Option<i64> = sqlx::query("SELECT next_seq FROM outbox_sequences WHERE aggregate_id = ?")
            .bind(aggregate_id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .map(|r| r.get("next_seq"));
        let next = current.unwrap_or(0) + 1;
        sqlx::query(
            "INSERT INTO outbox_sequences (aggregate_id, next_seq) VALUES (?, ?)
             ON CONFLICT(aggregate_id) DO UPDATE SET next_seq = excluded.next_seq",
        )
        .bind(aggregate_id.to_string())
        .bind(next)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(next as u64)
    }

    async fn enqueue_outbox_message(&self, message: OutboxMessage) -> anyhow::Result<()> {
        let data = serde_json::to_string(&message)?;
        sqlx::query("INSERT INTO outbox_messages (id, aggregate_id, status, data) VALUES (?, ?, ?, ?)")
            .bind(message.id.to_string())
            .bind(message.aggregate_id.to_string())
            .bind(Self::outbox_status_str(message.status))
            .bind(data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn claim_outbox_batch(&self, batch_size: usize) -> anyhow::Result<Vec<OutboxMessage>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query("SELECT id, data FROM outbox_messages WHERE status = ? LIMIT ?")
            .bind(Self::outbox_status_str(OutboxStatus::Pending))
            .bind(batch_size as i64)
            .fetch_all(&mut *tx)
            .await?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            let mut message: OutboxMessage = serde_json::from_str(&row.get::<String, _>("data"))?;
            message.status = OutboxStatus::Processing;
            let data = serde_json::to_string(&message)?;
            sqlx::query("UPDATE outbox_messages SET status = ?, data = ? WHERE id = ?")
                .bind(Self::outbox_status_str(OutboxStatus::Processing))
                .bind(data)
                .bind(message.id.to_string())
                .execute(&mut *tx)
                .await?;
            claimed.push(message);
        }
        tx.commit().await?;
        Ok(claimed)
    }

    async fn mark_outbox_published(&self, message_id: Uuid) -> anyhow::Result<()> {
        let row = sqlx::query("SELECT data FROM outbox_messages WHERE id = ?")
            .bind(message_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(()) };
        let mut message: OutboxMessage = serde_json::from_str(&row.get::<String, _>("data"))?;
        message.status = OutboxStatus::Published;
        let data = serde_json::to_string(&message)?;
        sqlx::query("UPDATE outbox_messages SET status = ?, data = ? WHERE id = ?")
            .bind(Self::outbox_status_str(OutboxStatus::Published))
            .bind(data)
            .bind(message_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_approval_record(&self, record: ApprovalRecord) -> anyhow::Result<()> {
        let data = serde_json::to_string(&record)?;
        sqlx::query("INSERT INTO approval_records (chain_id, sequence_num, data) VALUES (?, ?, ?)")
            .bind(record.chain_id.as_str())
            .bind(record.sequence_num as i64)
            .bind(data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn chain_head(&self, chain_id: &str) -> anyhow::Result<Option<ApprovalRecord>> {
        let row = sqlx::query(
            "SELECT data FROM approval_records WHERE chain_id = ? ORDER BY sequence_num DESC LIMIT 1",
        )
        .bind(chain_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| serde_json::from_str(&r.get::<String, _>("data"))).transpose()?)
    }

    async fn chain_records(&self, chain_id: &str) -> anyhow::Result<Vec<ApprovalRecord>> {
        let rows = sqlx::query("SELECT data FROM approval_records WHERE chain_id = ? ORDER BY sequence_num ASC")
            .bind(chain_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("data")))
            .collect::<Result<_, _>>()?)
    }
}

/// Seeds the base tables (people/blocks/templates/absences) that
/// `ContextRepository` reads. The orchestrator never writes these; a
/// separate intake process (outside this crate's scope) owns them.
pub async fn seed_context(
    pool: &SqlitePool,
    people: &[Person],
    blocks: &[Block],
    templates: &[RotationTemplate],
    absences: &[Absence],
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for person in people {
        sqlx::query("INSERT OR REPLACE INTO people (id, data) VALUES (?, ?)")
            .bind(person.id.to_string())
            .bind(serde_json::to_string(person)?)
            .execute(&mut *tx)
            .await?;
    }
    for block in blocks {
        sqlx::query("INSERT OR REPLACE INTO blocks (id, date, data) VALUES (?, ?, ?)")
            .bind(block.id.to_string())
            .bind(block.date.to_string())
            .bind(serde_json::to_string(block)?)
            .execute(&mut *tx)
            .await?;
    }
    for template in templates {
        sqlx::query("INSERT OR REPLACE INTO templates (id, data) VALUES (?, ?)")
            .bind(template.id.to_string())
            .bind(serde_json::to_string(template)?)
            .execute(&mut *tx)
            .await?;
    }
    for absence in absences {
        sqlx::query("INSERT INTO absences (person_id, start_date, end_date, data) VALUES (?, ?, ?, ?)")
            .bind(absence.person_id.to_string())
            .bind(absence.start_date.to_string())
            .bind(absence.end_date.to_string())
            .bind(serde_json::to_string(absence)?)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}
