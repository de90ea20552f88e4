//! Hard capacity constraints: per-person clinic caps, per-template
//! max-residents caps, and the unique-primary-per-block invariant.

use std::collections::HashMap;

use uuid::Uuid;

use super::{Constraint, ConstraintKind, Priority, Severity, ValidationResult, Violation};
use crate::context::SchedulingContext;
use crate::domain::{find_duplicate_primaries, Assignment};

/// Each person's weekly primary-clinic-template assignment count must sit
/// within their `ClinicCaps` range.
pub struct ClinicCapacity;

impl Constraint for ClinicCapacity {
    fn name(&self) -> &'static str {
        "ClinicCapacity"
    }
    fn category(&self) -> &'static str {
        "capacity"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }
    fn priority(&self) -> Priority {
        Priority::High
    }
    fn default_weight(&self) -> f64 {
        1.0
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary()) {
            let Some(template) = context.template_by_id(assignment.template_id) else {
                continue;
            };
            if template.is_weekday_only_clinic() {
                *counts.entry(assignment.person_id).or_insert(0) += 1;
            }
        }

        let mut violations = Vec::new();
        for person in context.all_people() {
            let count = counts.get(&person.id).copied().unwrap_or(0);
            if count < person.clinic_caps.min {
                violations.push(Violation::new(
                    Severity::Warning,
                    format!(
                        "{} has {} clinic half-days, below minimum {}",
                        person.name, count, person.clinic_caps.min
                    ),
                    vec![person.id],
                ));
            } else if count > person.clinic_caps.max {
                violations.push(Violation::new(
                    Severity::Error,
                    format!(
                        "{} has {} clinic half-days, above maximum {}",
                        person.name, count, person.clinic_caps.max
                    ),
                    vec![person.id],
                ));
            }
        }
        ValidationResult::failed(violations)
    }
}

/// No rotation template may exceed its configured `max_residents` on any
/// single block.
pub struct TemplateMaxResidents;

impl Constraint for TemplateMaxResidents {
    fn name(&self) -> &'static str {
        "TemplateMaxResidents"
    }
    fn category(&self) -> &'static str {
        "capacity"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }
    fn priority(&self) -> Priority {
        Priority::High
    }
    fn default_weight(&self) -> f64 {
        1.0
    }

    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult {
        let mut counts: HashMap<(Uuid, Uuid), u32> = HashMap::new();
        for assignment in assignments.iter().filter(|a| a.is_primary()) {
            let Some(person) = context.person_by_id(assignment.person_id) else {
                continue;
            };
            if !person.is_resident() {
                continue;
            }
            *counts
                .entry((assignment.block_id, assignment.template_id))
                .or_insert(0) += 1;
        }

        let mut violations = Vec::new();
        for ((block_id, template_id), count) in counts {
            let Some(template) = context.template_by_id(template_id) else {
                continue;
            };
            if let Some(max) = template.max_residents {
                if count > max {
                    violations.push(
                        Violation::new(
                            Severity::Error,
                            format!(
                                "template {} over capacity on block {}: {} > {}",
                                template.name, block_id, count, max
                            ),
                            vec![block_id, template_id],
                        )
                        .with_details(serde_json::json!({ "count": count, "max": max })),
                    );
                }
            }
        }
        ValidationResult::failed(violations)
    }
}

/// At most one `Primary` assignment per block (faculty may still hold
/// Supervising/Backup roles on the same block).
pub struct UniquePrimaryPerBlock;

impl Constraint for UniquePrimaryPerBlock {
    fn name(&self) -> &'static str {
        "UniquePrimaryPerBlock"
    }
    fn category(&self) -> &'static str {
        "capacity"
    }
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }
    fn priority(&self) -> Priority {
        Priority::Critical
    }
    fn default_weight(&self) -> f64 {
        1.0
    }

    fn validate(&self, assignments: &[Assignment], _context: &SchedulingContext) -> ValidationResult {
        let violations = find_duplicate_primaries(assignments)
            .into_iter()
            .map(|block_id| {
                Violation::new(
                    Severity::Critical,
                    format!("block {} has more than one primary assignment", block_id),
                    vec![block_id],
                )
            })
            .collect();
        ValidationResult::failed(violations)
    }
}
