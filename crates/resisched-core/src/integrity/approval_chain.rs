//! Hash-chained approval log: every schedule-affecting mutation appends
//! a record whose hash covers the previous record's hash, so any
//! retroactive edit breaks every hash after it. Genesis anchors the
//! chain at `sequence_num = 0` with an empty `prev_hash`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Human,
    System,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    ScheduleGenerated,
    AssignmentEdited,
    AssignmentSwapped,
    Approved,
    DaySealed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub chain_id: String,
    pub sequence_num: u64,
    pub prev_hash: String,
    pub record_hash: String,
    pub payload: serde_json::Value,
    pub action: ApprovalAction,
    pub actor_id: Option<Uuid>,
    pub actor_kind: ActorKind,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `SHA-256(canonical(prev_hash, payload, actor_id, actor_kind, action, timestamp, reason))`,
/// `canonical` being JSON with sorted keys (serde_json's default map
/// ordering, which is lexicographic unless the `preserve_order` feature
/// is enabled — it is not, in this workspace).
fn compute_hash(
    prev_hash: &str,
    payload: &serde_json::Value,
    actor_id: Option<Uuid>,
    actor_kind: ActorKind,
    action: ApprovalAction,
    timestamp: DateTime<Utc>,
    reason: Option<&str>,
) -> String {
    let canonical = serde_json::json!({
        "prev_hash": prev_hash,
        "payload": payload,
        "actor_id": actor_id,
        "actor_kind": actor_kind,
        "action": action,
        "timestamp": timestamp.to_rfc3339(),
        "reason": reason,
    });
    let serialized = serde_json::to_string(&canonical).expect("approval record payload serializes");
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl ApprovalRecord {
    pub fn genesis(
        chain_id: impl Into<String>,
        payload: serde_json::Value,
        actor_id: Option<Uuid>,
        actor_kind: ActorKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let chain_id = chain_id.into();
        let record_hash = compute_hash(
            "",
            &payload,
            actor_id,
            actor_kind,
            ApprovalAction::ScheduleGenerated,
            timestamp,
            None,
        );
        Self {
            chain_id,
            sequence_num: 0,
            prev_hash: String::new(),
            record_hash,
            payload,
            action: ApprovalAction::ScheduleGenerated,
            actor_id,
            actor_kind,
            reason: None,
            created_at: timestamp,
        }
    }

    /// Append a new record onto `head`, a reference to the current chain
    /// tip. Returns the new record; callers persist it and advance the
    /// head pointer.
    pub fn append(
        head: &ApprovalRecord,
        action: ApprovalAction,
        payload: serde_json::Value,
        actor_id: Option<Uuid>,
        actor_kind: ActorKind,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let record_hash = compute_hash(
            &head.record_hash,
            &payload,
            actor_id,
            actor_kind,
            action,
            timestamp,
            reason.as_deref(),
        );
        Self {
            chain_id: head.chain_id.clone(),
            sequence_num: head.sequence_num + 1,
            prev_hash: head.record_hash.clone(),
            record_hash,
            payload,
            action,
            actor_id,
            actor_kind,
            reason,
            created_at: timestamp,
        }
    }

    /// Recompute this record's hash from its own fields and check it
    /// against the stored `record_hash`.
    pub fn verify_hash(&self) -> bool {
        let expected = compute_hash(
            &self.prev_hash,
            &self.payload,
            self.actor_id,
            self.actor_kind,
            self.action,
            self.created_at,
            self.reason.as_deref(),
        );
        expected == self.record_hash
    }
}

#[derive(Debug, Clone)]
pub struct ChainVerification {
    pub valid: bool,
    pub broken_at_sequence: Option<u64>,
    pub head_hash: Option<String>,
    pub genesis_hash: Option<String>,
}

/// Walk a chain ordered by `sequence_num` and verify (i) sequence
/// contiguity starting at 0, (ii) `prev_hash` linkage, (iii) each
/// record's recomputed hash.
pub fn verify_chain(records: &[ApprovalRecord]) -> ChainVerification {
    if records.is_empty() {
        return ChainVerification {
            valid: true,
            broken_at_sequence: None,
            head_hash: None,
            genesis_hash: None,
        };
    }

    let mut prev_hash = String::new();
    for (expected_seq, record) in records.iter().enumerate() {
        if record.sequence_num != expected_seq as u64 {
            return ChainVerification {
                valid: false,
                broken_at_sequence: Some(record.sequence_num),
                head_hash: records.last().map(|r| r.record_hash.clone()),
                genesis_hash: records.first().map(|r| r.record_hash.clone()),
            };
        }
        if expected_seq > 0 && record.prev_hash != prev_hash {
            return ChainVerification {
                valid: false,
                broken_at_sequence: Some(record.sequence_num),
                head_hash: records.last().map(|r| r.record_hash.clone()),
                genesis_hash: records.first().map(|r| r.record_hash.clone()),
            };
        }
        if !record.verify_hash() {
            return ChainVerification {
                valid: false,
                broken_at_sequence: Some(record.sequence_num),
                head_hash: records.last().map(|r| r.record_hash.clone()),
                genesis_hash: records.first().map(|r| r.record_hash.clone()),
            };
        }
        prev_hash = record.record_hash.clone();
    }

    ChainVerification {
        valid: true,
        broken_at_sequence: None,
        head_hash: records.last().map(|r| r.record_hash.clone()),
        genesis_hash: records.first().map(|r| r.record_hash.clone()),
    }
}

/// Binary Merkle root over a day's record hashes, padding with
/// `SHA-256("")` leaves up to the next power of two. Empty input yields
/// `SHA-256("")`.
pub fn merkle_root(hashes: &[String]) -> String {
    fn sha256_hex(s: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(s.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    if hashes.is_empty() {
        return sha256_hex("");
    }

    let mut level = hashes.to_vec();
    let empty_hash = sha256_hex("");
    while level.len() & (level.len() - 1) != 0 {
        level.push(empty_hash.clone());
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| sha256_hex(&format!("{}{}", pair[0], pair[1])))
            .collect();
    }
    level.into_iter().next().unwrap_or(empty_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_sequence_zero_and_empty_prev_hash() {
        let genesis = ApprovalRecord::genesis("chain-1", serde_json::json!({}), None, ActorKind::System, Utc::now());
        assert_eq!(genesis.sequence_num, 0);
        assert_eq!(genesis.prev_hash, "");
        assert!(genesis.verify_hash());
    }

    #[test]
    fn chain_of_three_verifies() {
        let genesis = ApprovalRecord::genesis("chain-1", serde_json::json!({"n": 0}), None, ActorKind::System, Utc::now());
        let r1 = ApprovalRecord::append(
            &genesis,
            ApprovalAction::AssignmentEdited,
            serde_json::json!({"n": 1}),
            None,
            ActorKind::Human,
            Some("swap".into()),
            Utc::now(),
        );
        let r2 = ApprovalRecord::append(
            &r1,
            ApprovalAction::Approved,
            serde_json::json!({"n": 2}),
            None,
            ActorKind::Human,
            None,
            Utc::now(),
        );
        let result = verify_chain(&[genesis, r1, r2]);
        assert!(result.valid);
    }

    #[test]
    fn tampered_payload_breaks_verification() {
        let genesis = ApprovalRecord::genesis("chain-1", serde_json::json!({"n": 0}), None, ActorKind::System, Utc::now());
        let mut r1 = ApprovalRecord::append(
            &genesis,
            ApprovalAction::AssignmentEdited,
            serde_json::json!({"n": 1}),
            None,
            ActorKind::Human,
            None,
            Utc::now(),
        );
        r1.payload = serde_json::json!({"n": 999});
        let result = verify_chain(&[genesis, r1]);
        assert!(!result.valid);
    }

    #[test]
    fn merkle_root_is_deterministic() {
        let hashes = vec!["a".repeat(64), "b".repeat(64), "c".repeat(64)];
        let root1 = merkle_root(&hashes);
        let root2 = merkle_root(&hashes);
        assert_eq!(root1, root2);
    }

    #[test]
    fn empty_merkle_root_is_hash_of_empty_string() {
        let mut hasher = Sha256::new();
        hasher.update(b"");
        let expected = format!("{:x}", hasher.finalize());
        assert_eq!(merkle_root(&[]), expected);
    }
}
