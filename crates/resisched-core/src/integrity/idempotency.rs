//! Idempotency record shape and the decision logic for the orchestrator
//! entry point: replay, conflict, in-progress, or proceed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default time-to-live for a completed idempotency record before it is
/// eligible for replay no longer and the sweeper may delete it.
pub fn default_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub body_hash: String,
    pub status: IdempotencyStatus,
    pub response_body: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new_pending(key: String, body_hash: String, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            body_hash,
            status: IdempotencyStatus::Pending,
            response_body: None,
            created_at,
            expires_at: created_at + default_ttl(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// `SHA-256(canonical(params))` over the request parameters that define
/// "the same request" for idempotency purposes. Field order in the
/// caller-supplied struct doesn't matter: callers should serialize
/// through `serde_json::to_value` and pass the resulting `Value` here so
/// object keys are already stably ordered by `serde_json`'s BTreeMap-
/// backed `Map` (when the `preserve_order` feature is off, which this
/// workspace does not enable).
pub fn canonical_body_hash(params: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(params).expect("idempotency params serialize");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// What the orchestrator should do given an optional existing record for
/// `(key, body_hash)`.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyDecision {
    /// No record, or an expired one: proceed and create a new pending record.
    Proceed,
    /// A completed record for the same body_hash within TTL: replay it.
    Replay(serde_json::Value),
    /// A record exists for this key with a different body_hash.
    Conflict,
    /// A record exists for this key and is still pending.
    InProgress,
}

/// Decide what to do given the existing record (if any) for an
/// idempotency key and the hash of the incoming request body.
pub fn decide(existing: Option<&IdempotencyRecord>, incoming_body_hash: &str, now: DateTime<Utc>) -> IdempotencyDecision {
    let Some(record) = existing else {
        return IdempotencyDecision::Proceed;
    };
    if record.is_expired(now) {
        return IdempotencyDecision::Proceed;
    }
    if record.body_hash != incoming_body_hash {
        return IdempotencyDecision::Conflict;
    }
    match record.status {
        IdempotencyStatus::Pending => IdempotencyDecision::InProgress,
        IdempotencyStatus::Completed => IdempotencyDecision::Replay(
            record.response_body.clone().unwrap_or(serde_json::Value::Null),
        ),
        IdempotencyStatus::Failed => IdempotencyDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_params_hash_identically_regardless_of_key_order() {
        let a = serde_json::json!({"start_date": "2026-01-01", "algorithm": "greedy"});
        let b = serde_json::json!({"algorithm": "greedy", "start_date": "2026-01-01"});
        assert_eq!(canonical_body_hash(&a), canonical_body_hash(&b));
    }

    #[test]
    fn no_record_proceeds() {
        let now = Utc::now();
        assert_eq!(decide(None, "h", now), IdempotencyDecision::Proceed);
    }

    #[test]
    fn mismatched_body_hash_conflicts() {
        let now = Utc::now();
        let record = IdempotencyRecord::new_pending("k".into(), "h1".into(), now);
        assert_eq!(decide(Some(&record), "h2", now), IdempotencyDecision::Conflict);
    }

    #[test]
    fn pending_record_is_in_progress() {
        let now = Utc::now();
        let record = IdempotencyRecord::new_pending("k".into(), "h1".into(), now);
        assert_eq!(decide(Some(&record), "h1", now), IdempotencyDecision::InProgress);
    }

    #[test]
    fn expired_completed_record_proceeds_instead_of_replaying() {
        let created_at = Utc::now() - Duration::hours(25);
        let mut record = IdempotencyRecord::new_pending("k".into(), "h1".into(), created_at);
        record.status = IdempotencyStatus::Completed;
        record.response_body = Some(serde_json::json!({"run_id": "abc"}));
        assert_eq!(decide(Some(&record), "h1", Utc::now()), IdempotencyDecision::Proceed);
    }

    #[test]
    fn completed_record_within_ttl_replays() {
        let now = Utc::now();
        let mut record = IdempotencyRecord::new_pending("k".into(), "h1".into(), now);
        record.status = IdempotencyStatus::Completed;
        record.response_body = Some(serde_json::json!({"run_id": "abc"}));
        assert_eq!(
            decide(Some(&record), "h1", now),
            IdempotencyDecision::Replay(serde_json::json!({"run_id": "abc"}))
        );
    }
}
