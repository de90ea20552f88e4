//! Outbox message shape and retry-backoff arithmetic. Writing a message
//! happens in the same transaction as the business mutation it
//! describes (storage's concern); this module only owns the type and
//! the pure backoff/ordering rules the relay loop follows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default max retry attempts before a message is abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Relay polling batch size.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// A message stuck in `processing` longer than this is reclaimed.
pub const STUCK_PROCESSING_TIMEOUT_SECS: i64 = 300;
/// Published messages move to archive after this many hours.
pub const ARCHIVE_AFTER_HOURS: i64 = 24;
/// Archived messages are deleted after this many days.
pub const RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Published,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub sequence: u64,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Exponential backoff: `min(300, 10 · 2^(retry_count − 1))` seconds.
/// `retry_count` is the attempt number that just failed (1-indexed).
pub fn next_retry_delay(retry_count: u32) -> i64 {
    let base: i64 = 10;
    let exponent = retry_count.saturating_sub(1);
    let delay = base.saturating_mul(1i64.wrapping_shl(exponent.min(62)));
    delay.min(300)
}

/// Next strictly-increasing sequence number for an aggregate, given the
/// highest sequence already written.
pub fn next_sequence(max_existing: Option<u64>) -> u64 {
    max_existing.map(|s| s + 1).unwrap_or(0)
}
