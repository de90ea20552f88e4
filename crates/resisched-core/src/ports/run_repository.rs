use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{RunStatus, ScheduleRun, ScheduleSnapshot};

/// `ScheduleRun` lifecycle and the unique-run lock the orchestrator
/// acquires before generating over a date range (spec §4.12 step 2: a
/// run `InProgress` on an overlapping range fails fast with `conflict`).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn create(&self, run: ScheduleRun) -> anyhow::Result<()>;

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<ScheduleRun>>;

    async fn update_status(&self, id: Uuid, status: RunStatus) -> anyhow::Result<()>;

    /// Any run `InProgress` whose date range overlaps `[start, end]`,
    /// used to enforce the unique-run-per-range lock.
    async fn find_in_progress_overlapping(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Option<ScheduleRun>>;

    /// Last committed snapshot for the date range, consumed by the
    /// Anti-Churn Scorer to compare a new candidate against.
    async fn latest_snapshot(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Option<ScheduleSnapshot>>;
}
