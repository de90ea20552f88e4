use async_trait::async_trait;

use crate::integrity::{ApprovalRecord, IdempotencyRecord, OutboxMessage};

/// Persistence for the three C10 concerns (idempotency, outbox, approval
/// chain). Bundled into one port because storage wraps all three in a
/// single transaction around a schedule mutation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IntegrityRepository: Send + Sync {
    async fn find_idempotency_record(&self, key: &str) -> anyhow::Result<Option<IdempotencyRecord>>;

    async fn save_idempotency_record(&self, record: IdempotencyRecord) -> anyhow::Result<()>;

    /// Next strictly-increasing `sequence` for this aggregate, per
    /// `integrity::outbox::next_sequence`'s contract.
    async fn next_outbox_sequence(&self, aggregate_id: uuid::Uuid) -> anyhow::Result<u64>;

    async fn enqueue_outbox_message(&self, message: OutboxMessage) -> anyhow::Result<()>;

    async fn claim_outbox_batch(&self, batch_size: usize) -> anyhow::Result<Vec<OutboxMessage>>;

    async fn mark_outbox_published(&self, message_id: uuid::Uuid) -> anyhow::Result<()>;

    async fn append_approval_record(&self, record: ApprovalRecord) -> anyhow::Result<()>;

    async fn chain_head(&self, chain_id: &str) -> anyhow::Result<Option<ApprovalRecord>>;

    async fn chain_records(&self, chain_id: &str) -> anyhow::Result<Vec<ApprovalRecord>>;
}
