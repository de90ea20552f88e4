use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::Assignment;

/// Persisted assignments for a run. `replace_for_range` is transactional
/// from the caller's perspective: storage is expected to delete the
/// prior assignments for the range and insert the new ones atomically
/// (spec §4.12 step 4: "transaction + row locks + delete existing").
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn replace_for_range(
        &self,
        run_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        assignments: Vec<Assignment>,
    ) -> anyhow::Result<()>;

    async fn for_range(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Assignment>>;

    async fn for_run(&self, run_id: Uuid) -> anyhow::Result<Vec<Assignment>>;
}
