//! Assignments: the output of the scheduling pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::ActivityCode;

/// The capacity in which a person holds an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    Primary,
    Supervising,
    Backup,
}

/// One person assigned to one block under one rotation template.
///
/// Invariant: `(person_id, block_id)` is unique for `role = Primary`;
/// faculty may hold multiple roles per block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub block_id: Uuid,
    pub person_id: Uuid,
    pub template_id: Uuid,
    pub role: AssignmentRole,
    pub activity_code: ActivityCode,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_primary(&self) -> bool {
        self.role == AssignmentRole::Primary
    }
}

/// Verify the unique-primary-per-block invariant over a candidate set.
/// Returns the list of block IDs that have more than one primary assignment.
pub fn find_duplicate_primaries(assignments: &[Assignment]) -> Vec<Uuid> {
    use std::collections::HashMap;
    let mut counts: HashMap<Uuid, u32> = HashMap::new();
    for assignment in assignments.iter().filter(|a| a.is_primary()) {
        *counts.entry(assignment.block_id).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(block_id, _)| block_id)
        .collect()
}
