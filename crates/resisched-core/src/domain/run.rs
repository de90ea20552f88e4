//! ScheduleRun and ScheduleSnapshot.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Which generator algorithm produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Greedy,
    CpSat,
    Bio,
}

/// Lifecycle status of a `ScheduleRun`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    InProgress,
    Succeeded,
    Partial,
    Failed,
}

/// A single invocation of the scheduling pipeline over a date range.
///
/// Invariant: at most one run with an overlapping date range may be
/// `InProgress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRun {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub algorithm: Algorithm,
    pub status: RunStatus,
    pub total_assigned: u32,
    pub acgme_violations: u32,
    pub runtime_seconds: f64,
    pub config_json: serde_json::Value,
}

impl ScheduleRun {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Immutable frozen set of `(person_id, block_id, template_id)` tuples,
/// used by the Anti-Churn Scorer to compare against a prior committed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub triples: HashSet<(Uuid, Uuid, Uuid)>,
    pub taken_at: DateTime<Utc>,
}

impl ScheduleSnapshot {
    pub fn from_triples(triples: impl IntoIterator<Item = (Uuid, Uuid, Uuid)>) -> Self {
        Self {
            triples: triples.into_iter().collect(),
            taken_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self {
            triples: HashSet::new(),
            taken_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}
