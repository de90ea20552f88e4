//! Idempotency + Outbox + Approval Chain (C10): the pure, I/O-free
//! logic each adapter (`resisched-storage`) wraps with actual
//! persistence. This module defines the data shapes and the decision
//! functions; it never touches a database or message bus itself.

pub mod approval_chain;
pub mod idempotency;
pub mod outbox;

pub use approval_chain::{ApprovalAction, ApprovalRecord, ActorKind, ChainVerification};
pub use idempotency::{canonical_body_hash, IdempotencyDecision, IdempotencyRecord, IdempotencyStatus};
pub use outbox::{next_retry_delay, OutboxMessage, OutboxStatus};
