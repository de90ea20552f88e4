//! Negative-selection anomaly detector (C11): a feature vector over a
//! schedule state, random detectors trained by discarding any that
//! match a known-valid schedule, and antibodies that repair anomalous
//! states.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

/// Default dimensionality of the extracted feature vector.
pub const DEFAULT_FEATURE_DIMS: usize = 12;
/// Fixed (non-category) features before the per-category coverage tail.
const BASE_FEATURE_COUNT: usize = 6;
/// Cap on negative-selection generation attempts per detector, to bound
/// training time when `detection_radius` is large relative to the
/// training set's spread.
const MAX_ATTEMPTS_PER_DETECTOR: usize = 200;

#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub total_blocks: u32,
    pub covered_blocks: u32,
    pub faculty_count: u32,
    pub resident_count: u32,
    pub acgme_violation_count: u32,
    pub avg_hours_per_week: f64,
    pub supervision_ratio: f64,
    pub workload_std_dev: f64,
    pub schedule_changes: u32,
    pub total_assignments: u32,
    /// Coverage ratio per rotation category (e.g. "clinic", "inpatient").
    pub coverage_by_type: HashMap<String, f64>,
}

/// Flatten a schedule state into a fixed-length, roughly-normalized
/// feature vector: coverage_rate, violation_count, mean_hours,
/// supervision_ratio, churn_rate, workload_std_dev, then per-category
/// coverage sorted by category name, padded with zeros or truncated to
/// fill the remaining `feature_dims - 6` slots.
pub fn extract_features(state: &ScheduleState, feature_dims: usize) -> Vec<f32> {
    let coverage_rate = if state.total_blocks > 0 {
        state.covered_blocks as f64 / state.total_blocks as f64
    } else {
        0.0
    };
    let violation_count = state.acgme_violation_count as f64 / 10.0;
    let mean_hours = state.avg_hours_per_week / 80.0;
    let supervision_ratio = state.supervision_ratio / 4.0;
    let churn_rate = if state.total_assignments > 0 {
        state.schedule_changes as f64 / state.total_assignments as f64
    } else {
        0.0
    };
    let workload_std_dev = state.workload_std_dev;

    let mut features: Vec<f32> = vec![
        coverage_rate as f32,
        violation_count as f32,
        mean_hours as f32,
        supervision_ratio as f32,
        churn_rate as f32,
        workload_std_dev as f32,
    ];

    let mut categories: Vec<&String> = state.coverage_by_type.keys().collect();
    categories.sort();
    let tail_len = feature_dims.saturating_sub(BASE_FEATURE_COUNT);
    for idx in 0..tail_len {
        let value = categories.get(idx).map(|k| state.coverage_by_type[*k] as f32).unwrap_or(0.0);
        features.push(value);
    }
    features.truncate(feature_dims);
    while features.len() < feature_dims {
        features.push(0.0);
    }
    features
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| ((*x - *y) as f64).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Clone)]
pub struct Detector {
    pub id: Uuid,
    pub center: Vec<f32>,
    pub radius: f64,
    pub created_at: DateTime<Utc>,
    pub matches_count: u64,
}

impl Detector {
    pub fn get_distance(&self, point: &[f32]) -> f64 {
        euclidean_distance(&self.center, point)
    }

    pub fn matches(&self, point: &[f32]) -> bool {
        self.get_distance(point) <= self.radius
    }
}

pub type RepairFn = Box<dyn Fn(&ScheduleState) -> ScheduleState + Send + Sync>;

pub struct Antibody {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub repair_function: RepairFn,
    pub affinity_center: Vec<f32>,
    pub affinity_radius: f64,
    pub applications_count: u32,
    pub success_count: u32,
}

impl Antibody {
    /// `1 - distance/radius` clamped to `[0, 1]`; zero outside the radius.
    pub fn get_affinity(&self, point: &[f32]) -> f64 {
        let distance = euclidean_distance(&self.affinity_center, point);
        if distance > self.affinity_radius || self.affinity_radius <= 0.0 {
            0.0
        } else {
            (1.0 - distance / self.affinity_radius).clamp(0.0, 1.0)
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.applications_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.applications_count as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct AnomalyReport {
    pub anomaly_score: f64,
    pub matching_detectors: Vec<Uuid>,
    pub severity: Severity,
    pub description: String,
}

pub struct RepairResult {
    pub antibody_name: String,
    pub anomaly_before: f64,
    pub anomaly_after: f64,
    pub successful: bool,
    pub repaired_state: ScheduleState,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ImmuneStatistics {
    pub is_trained: bool,
    pub detector_count: usize,
    pub feature_dims: usize,
    pub anomalies_detected: u64,
    pub repairs_applied: u64,
    pub antibody_performance: HashMap<String, f64>,
}

pub struct ScheduleImmuneSystem {
    pub feature_dims: usize,
    pub detector_count: usize,
    pub detection_radius: f64,
    pub detectors: Vec<Detector>,
    pub antibodies: HashMap<String, Antibody>,
    pub is_trained: bool,
    pub training_features: Vec<Vec<f32>>,
    pub anomalies_detected: u64,
    pub repairs_applied: u64,
    seed: u64,
}

impl ScheduleImmuneSystem {
    pub fn new(feature_dims: usize, detector_count: usize, detection_radius: f64) -> Self {
        Self {
            feature_dims,
            detector_count,
            detection_radius,
            detectors: Vec::new(),
            antibodies: HashMap::new(),
            is_trained: false,
            training_features: Vec::new(),
            anomalies_detected: 0,
            repairs_applied: 0,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn extract_features(&self, state: &ScheduleState) -> Vec<f32> {
        extract_features(state, self.feature_dims)
    }

    /// Negative selection: generate random detectors, discarding any
    /// that falls within `detection_radius` of a known-valid training
    /// schedule. An empty training set leaves the system untrained.
    pub fn train(&mut self, schedules: &[ScheduleState]) {
        self.training_features = schedules.iter().map(|s| self.extract_features(s)).collect();
        self.detectors.clear();

        if self.training_features.is_empty() {
            self.is_trained = false;
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let now = Utc::now();
        for _ in 0..self.detector_count {
            for _attempt in 0..MAX_ATTEMPTS_PER_DETECTOR {
                let center: Vec<f32> = (0..self.feature_dims).map(|_| rng.gen_range(0.0..1.0)).collect();
                let matches_self = self
                    .training_features
                    .iter()
                    .any(|f| euclidean_distance(&center, f) < self.detection_radius);
                if !matches_self {
                    self.detectors.push(Detector {
                        id: Uuid::new_v4(),
                        center,
                        radius: self.detection_radius,
                        created_at: now,
                        matches_count: 0,
                    });
                    break;
                }
            }
        }
        self.is_trained = true;
    }

    /// Fraction of detectors that match `state`'s feature vector.
    pub fn get_anomaly_score(&self, state: &ScheduleState) -> f64 {
        if self.detectors.is_empty() {
            return 0.0;
        }
        let features = self.extract_features(state);
        let matching = self.detectors.iter().filter(|d| d.matches(&features)).count();
        matching as f64 / self.detectors.len() as f64
    }

    /// A state is anomalous if any trained detector matches it. Updates
    /// per-detector match counts and the anomaly counter as a side effect.
    pub fn is_anomaly(&mut self, state: &ScheduleState) -> bool {
        if !self.is_trained {
            return false;
        }
        let features = self.extract_features(state);
        let mut any_matched = false;
        for detector in &mut self.detectors {
            if detector.matches(&features) {
                detector.matches_count += 1;
                any_matched = true;
            }
        }
        if any_matched {
            self.anomalies_detected += 1;
        }
        any_matched
    }

    pub fn detect_anomaly(&mut self, state: &ScheduleState) -> Option<AnomalyReport> {
        if !self.is_anomaly(state) {
            return None;
        }
        let features = self.extract_features(state);
        let matching_detectors: Vec<Uuid> =
            self.detectors.iter().filter(|d| d.matches(&features)).map(|d| d.id).collect();
        let anomaly_score = self.get_anomaly_score(state);
        let severity = if anomaly_score >= 0.75 {
            Severity::Critical
        } else if anomaly_score >= 0.5 {
            Severity::High
        } else if anomaly_score >= 0.25 {
            Severity::Medium
        } else {
            Severity::Low
        };
        Some(AnomalyReport {
            anomaly_score,
            matching_detectors: matching_detectors.clone(),
            severity,
            description: format!(
                "{} of {} detectors matched (score {:.2})",
                matching_detectors.len(),
                self.detectors.len(),
                anomaly_score
            ),
        })
    }

    pub fn register_antibody(
        &mut self,
        name: impl Into<String>,
        repair_fn: RepairFn,
        description: impl Into<String>,
        affinity_pattern: Option<&ScheduleState>,
        affinity_radius: f64,
    ) {
        let name = name.into();
        let affinity_center = affinity_pattern
            .map(|s| self.extract_features(s))
            .unwrap_or_else(|| vec![0.0; self.feature_dims]);
        self.antibodies.insert(
            name.clone(),
            Antibody {
                id: Uuid::new_v4(),
                name,
                description: description.into(),
                repair_function: repair_fn,
                affinity_center,
                affinity_radius,
                applications_count: 0,
                success_count: 0,
            },
        );
    }

    pub fn select_antibody(&self, state: &ScheduleState) -> Option<(&str, &Antibody)> {
        if self.antibodies.is_empty() {
            return None;
        }
        let features = self.extract_features(state);
        self.antibodies
            .iter()
            .map(|(name, antibody)| (name.as_str(), antibody, antibody.get_affinity(&features)))
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap())
            .map(|(name, antibody, _)| (name, antibody))
    }

    pub fn apply_repair(&mut self, state: &ScheduleState) -> Option<RepairResult> {
        let selected_name = self.select_antibody(state)?.0.to_string();
        let anomaly_before = self.get_anomaly_score(state);

        let repair_outcome = {
            let antibody = self.antibodies.get(&selected_name)?;
            catch_unwind(AssertUnwindSafe(|| (antibody.repair_function)(state)))
        };

        self.repairs_applied += 1;
        let antibody = self.antibodies.get_mut(&selected_name)?;
        antibody.applications_count += 1;

        let result = match repair_outcome {
            Ok(repaired_state) => {
                let anomaly_after = self.get_anomaly_score(&repaired_state);
                let successful = anomaly_after < anomaly_before;
                if successful {
                    self.antibodies.get_mut(&selected_name)?.success_count += 1;
                }
                RepairResult {
                    antibody_name: selected_name,
                    anomaly_before,
                    anomaly_after,
                    successful,
                    repaired_state,
                    message: if successful {
                        "repair applied successfully".to_string()
                    } else {
                        "repair applied but did not reduce anomaly score".to_string()
                    },
                }
            }
            Err(_) => RepairResult {
                antibody_name: selected_name,
                anomaly_before,
                anomaly_after: anomaly_before,
                successful: false,
                repaired_state: state.clone(),
                message: "repair failed: repair function panicked".to_string(),
            },
        };
        Some(result)
    }

    pub fn get_statistics(&self) -> ImmuneStatistics {
        ImmuneStatistics {
            is_trained: self.is_trained,
            detector_count: self.detectors.len(),
            feature_dims: self.feature_dims,
            anomalies_detected: self.anomalies_detected,
            repairs_applied: self.repairs_applied,
            antibody_performance: self
                .antibodies
                .iter()
                .map(|(name, a)| (name.clone(), a.success_rate()))
                .collect(),
        }
    }

    pub fn reset_statistics(&mut self) {
        self.anomalies_detected = 0;
        self.repairs_applied = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_state() -> ScheduleState {
        let mut coverage_by_type = HashMap::new();
        coverage_by_type.insert("clinic".to_string(), 0.95);
        coverage_by_type.insert("inpatient".to_string(), 0.90);
        coverage_by_type.insert("procedure".to_string(), 0.85);
        ScheduleState {
            total_blocks: 100,
            covered_blocks: 95,
            faculty_count: 10,
            resident_count: 20,
            acgme_violation_count: 0,
            avg_hours_per_week: 75.0,
            supervision_ratio: 0.5,
            workload_std_dev: 0.1,
            schedule_changes: 5,
            total_assignments: 100,
            coverage_by_type,
        }
    }

    fn invalid_state() -> ScheduleState {
        let mut coverage_by_type = HashMap::new();
        coverage_by_type.insert("clinic".to_string(), 0.70);
        coverage_by_type.insert("inpatient".to_string(), 0.65);
        coverage_by_type.insert("procedure".to_string(), 0.60);
        ScheduleState {
            total_blocks: 100,
            covered_blocks: 70,
            faculty_count: 5,
            resident_count: 20,
            acgme_violation_count: 2,
            avg_hours_per_week: 85.0,
            supervision_ratio: 4.0,
            workload_std_dev: 0.5,
            schedule_changes: 30,
            total_assignments: 100,
            coverage_by_type,
        }
    }

    #[test]
    fn feature_extraction_has_requested_dimensions() {
        let system = ScheduleImmuneSystem::new(12, 50, 0.15);
        let features = system.extract_features(&valid_state());
        assert_eq!(features.len(), 12);
    }

    #[test]
    fn feature_extraction_reflects_coverage() {
        let system = ScheduleImmuneSystem::new(12, 50, 0.15);
        let features = system.extract_features(&valid_state());
        assert!((features[0] - 0.95).abs() < 0.01);
    }

    #[test]
    fn detector_matches_within_radius_only() {
        let detector = Detector {
            id: Uuid::new_v4(),
            center: vec![0.5, 0.5, 0.5],
            radius: 0.2,
            created_at: Utc::now(),
            matches_count: 0,
        };
        assert!(detector.matches(&[0.55, 0.55, 0.55]));
        assert!(!detector.matches(&[0.9, 0.9, 0.9]));
    }

    #[test]
    fn training_with_empty_schedules_leaves_system_untrained() {
        let mut system = ScheduleImmuneSystem::new(12, 50, 0.15);
        system.train(&[]);
        assert!(!system.is_trained);
        assert!(system.detectors.is_empty());
    }

    #[test]
    fn negative_selection_rejects_detectors_matching_valid_schedules() {
        let mut system = ScheduleImmuneSystem::new(12, 30, 0.15).with_seed(7);
        let schedules = vec![valid_state(); 10];
        system.train(&schedules);

        let valid_features = system.extract_features(&valid_state());
        let matches = system.detectors.iter().filter(|d| d.matches(&valid_features)).count();
        assert_eq!(matches, 0);
    }

    #[test]
    fn invalid_schedule_scores_higher_than_valid() {
        let mut system = ScheduleImmuneSystem::new(12, 80, 0.15).with_seed(11);
        let schedules = vec![valid_state(); 10];
        system.train(&schedules);

        let valid_score = system.get_anomaly_score(&valid_state());
        let invalid_score = system.get_anomaly_score(&invalid_state());
        assert!(invalid_score > valid_score);
    }

    #[test]
    fn untrained_system_never_reports_anomalies() {
        let mut system = ScheduleImmuneSystem::new(12, 50, 0.15);
        assert!(!system.is_anomaly(&invalid_state()));
    }

    #[test]
    fn select_antibody_picks_highest_affinity() {
        let mut system = ScheduleImmuneSystem::new(12, 10, 0.15);
        system.register_antibody(
            "low_affinity",
            Box::new(|s: &ScheduleState| s.clone()),
            "",
            None,
            0.1,
        );
        system.register_antibody(
            "high_affinity",
            Box::new(|s: &ScheduleState| s.clone()),
            "",
            Some(&invalid_state()),
            5.0,
        );
        let (name, _) = system.select_antibody(&invalid_state()).unwrap();
        assert_eq!(name, "high_affinity");
    }

    #[test]
    fn apply_repair_improves_anomaly_score() {
        let mut system = ScheduleImmuneSystem::new(12, 50, 0.15).with_seed(3);
        system.train(&vec![valid_state(); 10]);
        system.register_antibody(
            "fix",
            Box::new(|_s: &ScheduleState| valid_state()),
            "full repair",
            Some(&invalid_state()),
            5.0,
        );
        let result = system.apply_repair(&invalid_state()).unwrap();
        assert!(result.successful);
        assert!(result.anomaly_after < result.anomaly_before);
    }

    #[test]
    fn apply_repair_reports_failure_on_panic() {
        let mut system = ScheduleImmuneSystem::new(12, 50, 0.15).with_seed(3);
        system.train(&vec![valid_state(); 10]);
        system.register_antibody(
            "broken",
            Box::new(|_s: &ScheduleState| panic!("intentional failure")),
            "",
            Some(&invalid_state()),
            5.0,
        );
        let result = system.apply_repair(&invalid_state()).unwrap();
        assert!(!result.successful);
        assert!(result.message.contains("failed"));
    }

    #[test]
    fn reset_statistics_clears_counters() {
        let mut system = ScheduleImmuneSystem::new(12, 50, 0.15).with_seed(1);
        system.train(&vec![valid_state(); 10]);
        system.is_anomaly(&invalid_state());
        assert!(system.anomalies_detected > 0 || system.detectors.is_empty());
        system.reset_statistics();
        assert_eq!(system.anomalies_detected, 0);
        assert_eq!(system.repairs_applied, 0);
    }
}
