use async_trait::async_trait;
use uuid::Uuid;

use crate::explain::DecisionExplanation;

/// Persisted per-assignment `DecisionExplanation`s (C9), keyed by the
/// `assignment_id` they explain.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ExplanationRepository: Send + Sync {
    async fn save_batch(&self, explanations: Vec<DecisionExplanation>) -> anyhow::Result<()>;

    async fn for_assignment(&self, assignment_id: Uuid) -> anyhow::Result<Option<DecisionExplanation>>;
}
