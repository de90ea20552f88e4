use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Absence, Assignment, Block, Person, RotationTemplate};

/// Loads the inputs `SchedulingContext::build` needs for a date range.
/// Read-only: this port never writes back to storage.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContextRepository: Send + Sync {
    async fn people(&self) -> anyhow::Result<Vec<Person>>;

    async fn blocks(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Block>>;

    async fn templates(&self) -> anyhow::Result<Vec<RotationTemplate>>;

    async fn absences(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Absence>>;

    /// Assignments already committed in the date range, e.g. from a
    /// prior partial run or a manual edit the new run should respect.
    async fn existing_assignments(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Assignment>>;
}
