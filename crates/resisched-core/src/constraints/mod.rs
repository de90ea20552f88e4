//! Constraint Registry (C2): a named, ordered collection of hard and
//! soft constraints with enable/disable, weight overrides, and
//! dependency resolution.

pub mod acgme;
pub mod capacity;
pub mod fixtures;
pub mod soft;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::SchedulingContext;
use crate::domain::Assignment;

/// How severely a violation should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Scheduling priority tier, independent of hard/soft classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// Whether a constraint must hold (hard) or merely contributes a penalty
/// (soft).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Hard,
    Soft,
}

/// A single constraint failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub message: String,
    pub affected_ids: Vec<Uuid>,
    pub details: serde_json::Value,
}

impl Violation {
    pub fn new(severity: Severity, message: impl Into<String>, affected_ids: Vec<Uuid>) -> Self {
        Self {
            severity,
            message: message.into(),
            affected_ids,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// The outcome of running one constraint's `validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub satisfied: bool,
    pub violations: Vec<Violation>,
    /// Custom scalar cost for soft constraints with a non-count-based
    /// penalty (e.g. Equity's Gini-derived cost). `None` means "use
    /// violation count as the cost".
    pub custom_cost: Option<f64>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            satisfied: true,
            violations: Vec::new(),
            custom_cost: None,
        }
    }

    pub fn failed(violations: Vec<Violation>) -> Self {
        Self {
            satisfied: violations.is_empty(),
            violations,
            custom_cost: None,
        }
    }

    pub fn with_custom_cost(mut self, cost: f64) -> Self {
        self.custom_cost = Some(cost);
        self
    }

    /// The cost this result contributes: `custom_cost` if set, else the
    /// violation count.
    pub fn cost(&self) -> f64 {
        self.custom_cost.unwrap_or(self.violations.len() as f64)
    }
}

/// Polymorphic capability set every constraint implements. Pure: no I/O,
/// deterministic given `(assignments, context)`, and re-entrant across
/// threads.
pub trait Constraint: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> &'static str;
    fn kind(&self) -> ConstraintKind;
    fn priority(&self) -> Priority;
    fn default_weight(&self) -> f64;
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }
    fn conflicts_with(&self) -> &'static [&'static str] {
        &[]
    }
    fn validate(&self, assignments: &[Assignment], context: &SchedulingContext) -> ValidationResult;
}

/// Per-constraint runtime configuration tracked by the registry.
#[derive(Debug, Clone)]
struct ConstraintConfig {
    enabled: bool,
    weight: f64,
}

/// Named, ordered collection of constraints with enable/disable, weight
/// overrides, preset application, and dependency resolution.
pub struct ConstraintRegistry {
    order: Vec<&'static str>,
    constraints: HashMap<&'static str, Box<dyn Constraint>>,
    config: HashMap<&'static str, ConstraintConfig>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            constraints: HashMap::new(),
            config: HashMap::new(),
        }
    }

    /// Construct a registry with every built-in constraint registered and
    /// enabled at its default weight (the `standard` preset).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(acgme::Availability));
        registry.register(Box::new(acgme::EightyHourRule));
        registry.register(Box::new(acgme::OneInSevenRule));
        registry.register(Box::new(acgme::SupervisionRatio::default()));
        registry.register(Box::new(capacity::ClinicCapacity));
        registry.register(Box::new(capacity::TemplateMaxResidents));
        registry.register(Box::new(capacity::UniquePrimaryPerBlock));
        registry.register(Box::new(fixtures::FmitStaffingFloor));
        registry.register(Box::new(fixtures::PostFmitSundayBlocking));
        registry.register(Box::new(fixtures::NightFloatHeadcount));
        registry.register(Box::new(fixtures::FmitResidentHeadcount));
        registry.register(Box::new(soft::Equity));
        registry.register(Box::new(soft::Continuity));
        registry.register(Box::new(soft::FacultyPreference));
        registry.register(Box::new(soft::WeekendFairness));
        registry.register(Box::new(soft::CallSpacing));
        registry.register(Box::new(soft::FmitContinuityTurf));
        registry.register(Box::new(soft::SmResidentFacultyAlignment));
        registry
    }

    pub fn register(&mut self, constraint: Box<dyn Constraint>) {
        let name = constraint.name();
        self.order.push(name);
        self.config.insert(
            name,
            ConstraintConfig {
                enabled: true,
                weight: constraint.default_weight(),
            },
        );
        self.constraints.insert(name, constraint);
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(cfg) = self.config.get_mut(name) {
            cfg.enabled = enabled;
        }
    }

    pub fn set_weight(&mut self, name: &str, weight: f64) {
        if let Some(cfg) = self.config.get_mut(name) {
            cfg.weight = weight;
        }
    }

    pub fn weight_of(&self, name: &str) -> f64 {
        self.config.get(name).map(|c| c.weight).unwrap_or(0.0)
    }

    /// Apply one of the named presets. Idempotent: applying the same
    /// preset twice yields the same configuration.
    pub fn apply_preset(&mut self, preset: Preset) {
        match preset {
            Preset::Minimal => {
                let keep: HashSet<&str> = [
                    acgme::Availability.name(),
                    acgme::EightyHourRule.name(),
                    acgme::OneInSevenRule.name(),
                    acgme::SupervisionRatio::default().name(),
                ]
                .into_iter()
                .collect();
                for name in &self.order {
                    self.set_enabled(name, keep.contains(name));
                }
            }
            Preset::Standard => {
                for name in self.order.clone() {
                    self.set_enabled(&name, true);
                    let default_weight = self.constraints[name].default_weight();
                    self.set_weight(&name, default_weight);
                }
            }
            Preset::Strict => {
                for name in self.order.clone() {
                    self.set_enabled(&name, true);
                    let default_weight = self.constraints[name].default_weight();
                    self.set_weight(&name, default_weight * 2.0);
                }
            }
            Preset::ResilienceTier1 => {
                for name in self.order.clone() {
                    self.set_enabled(&name, true);
                }
                self.set_weight(soft::WeekendFairness.name(), 2.0);
            }
            Preset::ResilienceTier2 => {
                for name in self.order.clone() {
                    self.set_enabled(&name, true);
                }
                self.set_weight(soft::WeekendFairness.name(), 3.0);
                self.set_weight(soft::Equity.name(), 2.0);
            }
            Preset::CallScheduling => {
                for name in self.order.clone() {
                    let is_call_relevant = matches!(
                        name,
                        "Availability"
                            | "EightyHourRule"
                            | "OneInSevenRule"
                            | "CallSpacing"
                            | "UniquePrimaryPerBlock"
                    );
                    self.set_enabled(&name, is_call_relevant);
                }
            }
            Preset::SportsMedicine => {
                for name in self.order.clone() {
                    let is_relevant = matches!(
                        name,
                        "Availability"
                            | "EightyHourRule"
                            | "OneInSevenRule"
                            | "SupervisionRatio"
                            | "SMResidentFacultyAlignment"
                            | "ClinicCapacity"
                    );
                    self.set_enabled(&name, is_relevant);
                }
            }
        }
    }

    /// Names active in registration order: enabled, and every name in
    /// `dependencies` is also active.
    pub fn active_names(&self) -> Vec<&'static str> {
        let mut active: HashSet<&'static str> = HashSet::new();
        // Fixed-point iteration: a constraint depending on a not-yet-seen
        // dependency is re-checked after the first pass.
        loop {
            let mut changed = false;
            for &name in &self.order {
                if active.contains(name) {
                    continue;
                }
                let enabled = self.config.get(name).map(|c| c.enabled).unwrap_or(false);
                if !enabled {
                    continue;
                }
                let deps_ok = self.constraints[name]
                    .dependencies()
                    .iter()
                    .all(|dep| active.contains(dep));
                if deps_ok {
                    active.insert(name);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        self.order
            .iter()
            .copied()
            .filter(|n| active.contains(n))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Constraint> {
        self.constraints.get(name).map(|b| b.as_ref())
    }

    pub fn is_hard(&self, name: &str) -> bool {
        self.constraints
            .get(name)
            .map(|c| c.kind() == ConstraintKind::Hard)
            .unwrap_or(false)
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Named constraint-registry configuration bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Minimal,
    Standard,
    Strict,
    ResilienceTier1,
    ResilienceTier2,
    CallScheduling,
    SportsMedicine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_preset_keeps_only_acgme_and_availability() {
        let mut registry = ConstraintRegistry::with_builtins();
        registry.apply_preset(Preset::Minimal);
        let active = registry.active_names();
        assert!(active.contains(&"Availability"));
        assert!(active.contains(&"EightyHourRule"));
        assert!(!active.contains(&"Equity"));
    }

    #[test]
    fn strict_preset_doubles_weights() {
        let mut registry = ConstraintRegistry::with_builtins();
        let base = registry.weight_of("Equity");
        registry.apply_preset(Preset::Strict);
        assert!((registry.weight_of("Equity") - base * 2.0).abs() < 1e-9);
    }

    #[test]
    fn preset_apply_is_idempotent() {
        let mut registry = ConstraintRegistry::with_builtins();
        registry.apply_preset(Preset::Standard);
        let first = registry.active_names();
        registry.apply_preset(Preset::Standard);
        let second = registry.active_names();
        assert_eq!(first, second);
    }

    #[test]
    fn disabled_dependency_deactivates_dependent() {
        let mut registry = ConstraintRegistry::with_builtins();
        registry.set_enabled("Availability", false);
        let active = registry.active_names();
        // SupervisionRatio does not depend on Availability in this
        // implementation, so this only checks Availability itself drops.
        assert!(!active.contains(&"Availability"));
    }
}
