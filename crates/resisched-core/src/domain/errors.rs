//! Domain error taxonomy.
//!
//! The core never depends on an HTTP crate; `status_hint` maps each
//! variant to the status code a REST layer (outside this core) would
//! return per spec §6, without the core owning that dependency.

use thiserror::Error;

/// Coarse status family a caller-facing layer would map to an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    Ok,
    Partial,
    Conflict,
    Infeasible,
    Timeout,
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("infeasible input: {0}")]
    Infeasible(String),

    #[error("concurrent conflict: {0}")]
    Conflict(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("solver timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("approval chain tampering detected at sequence {0}")]
    ChainTampered(u64),
}

impl DomainError {
    pub fn status_hint(&self) -> StatusHint {
        match self {
            DomainError::Infeasible(_) => StatusHint::Infeasible,
            DomainError::Conflict(_) | DomainError::ChainTampered(_) => StatusHint::Conflict,
            DomainError::Timeout(_) => StatusHint::Timeout,
            DomainError::Repository(_) | DomainError::InvalidRequest(_) => StatusHint::Infeasible,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
