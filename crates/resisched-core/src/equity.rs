//! Gini-coefficient fairness metrics (C11) over per-provider duty hours,
//! optionally weighted by assignment intensity.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

/// `gini <= TARGET_GINI` is considered equitable.
pub const TARGET_GINI: f64 = 0.15;

#[derive(Debug, Error, PartialEq)]
pub enum EquityError {
    #[error("values list cannot be empty")]
    EmptyValues,
    #[error("values cannot contain negative numbers")]
    NegativeValues,
    #[error("weights cannot contain negative numbers")]
    NegativeWeights,
    #[error("weights length ({got}) must match values length ({expected})")]
    WeightsLengthMismatch { expected: usize, got: usize },
}

/// `(2 * sum(i * x_i) - (n+1) * sum(x_i)) / (n * sum(x_i))` over values
/// sorted ascending, `i` 1-indexed. Scale-invariant; range `[0, (n-1)/n]`.
/// All-zero input returns `0.0` by convention (no one to be unequal to).
///
/// When `weights` is given, each value is scaled by its weight before the
/// coefficient is computed — two providers with equal `value * weight`
/// products contribute no inequality between them.
pub fn gini_coefficient(values: &[f64], weights: Option<&[f64]>) -> Result<f64, EquityError> {
    if values.is_empty() {
        return Err(EquityError::EmptyValues);
    }
    if values.iter().any(|v| *v < 0.0) {
        return Err(EquityError::NegativeValues);
    }

    let weighted: Vec<f64> = match weights {
        Some(w) => {
            if w.len() != values.len() {
                return Err(EquityError::WeightsLengthMismatch {
                    expected: values.len(),
                    got: w.len(),
                });
            }
            if w.iter().any(|x| *x < 0.0) {
                return Err(EquityError::NegativeWeights);
            }
            values.iter().zip(w.iter()).map(|(v, w)| v * w).collect()
        }
        None => values.to_vec(),
    };

    let mut sorted = weighted;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let total: f64 = sorted.iter().sum();
    if total == 0.0 {
        return Ok(0.0);
    }

    let n = sorted.len() as f64;
    let weighted_sum: f64 = sorted
        .iter()
        .enumerate()
        .map(|(idx, x)| (idx as f64 + 1.0) * x)
        .sum();

    Ok((2.0 * weighted_sum - (n + 1.0) * total) / (n * total))
}

/// Cumulative population share (x) vs. cumulative hour share (y),
/// `n + 1` points each including the origin `(0, 0)`. All-zero input
/// degenerates to the equality line.
pub fn lorenz_curve(values: &[f64]) -> Result<(Vec<f64>, Vec<f64>), EquityError> {
    if values.is_empty() {
        return Err(EquityError::EmptyValues);
    }
    if values.iter().any(|v| *v < 0.0) {
        return Err(EquityError::NegativeValues);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let total: f64 = sorted.iter().sum();

    let mut xs = Vec::with_capacity(n + 1);
    let mut ys = Vec::with_capacity(n + 1);
    xs.push(0.0);
    ys.push(0.0);

    let mut cumulative = 0.0;
    for (idx, value) in sorted.iter().enumerate() {
        cumulative += value;
        xs.push((idx as f64 + 1.0) / n as f64);
        ys.push(if total > 0.0 { cumulative / total } else { (idx as f64 + 1.0) / n as f64 });
    }

    Ok((xs, ys))
}

#[derive(Debug, Clone)]
pub struct EquityReport {
    pub gini: f64,
    pub target_gini: f64,
    pub is_equitable: bool,
    pub mean_hours: f64,
    pub std_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
    pub most_overloaded: Uuid,
    pub most_underloaded: Uuid,
    pub overload_delta: f64,
    pub underload_delta: f64,
    pub recommendations: Vec<String>,
}

/// Suggested single-transfer rebalancing: move `hours` from `from` to
/// `to` so both land closer to the group mean.
#[derive(Debug, Clone)]
pub struct TransferSuggestion {
    pub from: Uuid,
    pub to: Uuid,
    pub hours: f64,
}

/// Suggest transferring half the gap between the most overloaded and
/// most underloaded provider, capped by what the underloaded provider
/// is short of the mean.
pub fn suggest_transfer(
    provider_hours: &HashMap<Uuid, f64>,
    overloaded: Uuid,
    underloaded: Uuid,
) -> Option<TransferSuggestion> {
    let over = *provider_hours.get(&overloaded)?;
    let under = *provider_hours.get(&underloaded)?;
    if over <= under {
        return None;
    }
    let hours = (over - under) / 2.0;
    Some(TransferSuggestion { from: overloaded, to: underloaded, hours })
}

pub fn equity_report(
    provider_hours: &HashMap<Uuid, f64>,
    intensity_weights: Option<&HashMap<Uuid, f64>>,
) -> Result<EquityReport, EquityError> {
    if provider_hours.is_empty() {
        return Err(EquityError::EmptyValues);
    }

    let ids: Vec<Uuid> = provider_hours.keys().copied().collect();
    let values: Vec<f64> = ids.iter().map(|id| provider_hours[id]).collect();

    let weights: Option<Vec<f64>> = match intensity_weights {
        Some(map) => {
            if map.len() != provider_hours.len() || ids.iter().any(|id| !map.contains_key(id)) {
                return Err(EquityError::WeightsLengthMismatch {
                    expected: provider_hours.len(),
                    got: map.len(),
                });
            }
            Some(ids.iter().map(|id| map[id]).collect())
        }
        None => None,
    };

    let gini = gini_coefficient(&values, weights.as_deref())?;

    let n = values.len() as f64;
    let mean_hours = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean_hours).powi(2)).sum::<f64>() / n;
    let std_hours = variance.sqrt();
    let min_hours = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_hours = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let effective = |idx: usize| weights.as_ref().map(|w| values[idx] * w[idx]).unwrap_or(values[idx]);
    let (most_overloaded_idx, _) = (0..ids.len())
        .map(|i| (i, effective(i)))
        .fold((0, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    let (most_underloaded_idx, _) = (0..ids.len())
        .map(|i| (i, effective(i)))
        .fold((0, f64::INFINITY), |acc, cur| if cur.1 < acc.1 { cur } else { acc });

    let most_overloaded = ids[most_overloaded_idx];
    let most_underloaded = ids[most_underloaded_idx];
    let overload_delta = values[most_overloaded_idx] - mean_hours;
    let underload_delta = mean_hours - values[most_underloaded_idx];
    let is_equitable = gini <= TARGET_GINI;

    let mut recommendations = Vec::new();
    if is_equitable {
        recommendations.push("Workload distribution is equitable; no action needed.".to_string());
    } else {
        if overload_delta > 0.0 {
            recommendations.push(format!(
                "Provider {most_overloaded} is {overload_delta:.1}h above average; consider reducing assignments."
            ));
        }
        if underload_delta > 0.0 {
            recommendations.push(format!(
                "Provider {most_underloaded} is {underload_delta:.1}h below average; consider increasing assignments."
            ));
        }
        if let Some(transfer) = suggest_transfer(provider_hours, most_overloaded, most_underloaded) {
            recommendations.push(format!(
                "Consider a transfer of {:.1}h from {} to {} to rebalance.",
                transfer.hours, transfer.from, transfer.to
            ));
        }
        if let Some(w) = &weights {
            if let Some((idx, max_w)) = w.iter().enumerate().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()) {
                if *max_w > 1.5 {
                    recommendations.push(format!(
                        "Provider {} carries high-intensity assignments (weight {:.1}); factor this into future balancing.",
                        ids[idx], max_w
                    ));
                }
            }
        }
    }

    Ok(EquityReport {
        gini,
        target_gini: TARGET_GINI,
        is_equitable,
        mean_hours,
        std_hours,
        min_hours,
        max_hours,
        most_overloaded,
        most_underloaded,
        overload_delta,
        underload_delta,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_equality_is_zero_gini() {
        assert_eq!(gini_coefficient(&[10.0, 10.0, 10.0, 10.0], None).unwrap(), 0.0);
    }

    #[test]
    fn single_value_is_zero_gini() {
        assert_eq!(gini_coefficient(&[42.0], None).unwrap(), 0.0);
    }

    #[test]
    fn maximum_inequality_hits_n_minus_one_over_n() {
        let result = gini_coefficient(&[0.0, 0.0, 0.0, 100.0], None).unwrap();
        assert!((result - 0.75).abs() < 1e-9);
    }

    #[test]
    fn moderate_inequality_matches_known_value() {
        let result = gini_coefficient(&[10.0, 20.0, 30.0, 40.0], None).unwrap();
        assert!((result - 0.25).abs() < 1e-9);
    }

    #[test]
    fn all_zeros_is_zero_gini() {
        assert_eq!(gini_coefficient(&[0.0, 0.0, 0.0, 0.0], None).unwrap(), 0.0);
    }

    #[test]
    fn empty_values_is_an_error() {
        assert_eq!(gini_coefficient(&[], None), Err(EquityError::EmptyValues));
    }

    #[test]
    fn negative_values_is_an_error() {
        assert_eq!(gini_coefficient(&[10.0, -5.0], None), Err(EquityError::NegativeValues));
    }

    #[test]
    fn weighted_compensating_inequality_cancels_out() {
        // 60h at 1.0 intensity == 40h at 1.5 intensity: equal weighted load.
        let result = gini_coefficient(&[60.0, 40.0], Some(&[1.0, 1.5])).unwrap();
        assert!(result.abs() < 1e-9);
    }

    #[test]
    fn scale_invariance_holds() {
        let small = gini_coefficient(&[1.0, 2.0, 3.0, 4.0], None).unwrap();
        let large = gini_coefficient(&[1000.0, 2000.0, 3000.0, 4000.0], None).unwrap();
        assert!((small - large).abs() < 1e-9);
    }

    #[test]
    fn lorenz_curve_perfect_equality_is_the_diagonal() {
        let (xs, ys) = lorenz_curve(&[10.0, 10.0, 10.0, 10.0]).unwrap();
        assert_eq!(xs.len(), 5);
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn equity_report_flags_equitable_group() {
        let mut hours = HashMap::new();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for (id, h) in ids.iter().zip([165.0, 168.0, 170.0, 162.0, 165.0]) {
            hours.insert(*id, h);
        }
        let report = equity_report(&hours, None).unwrap();
        assert!(report.is_equitable);
        assert!(report.gini < TARGET_GINI);
    }

    #[test]
    fn equity_report_flags_inequitable_group_with_transfer_suggestion() {
        let mut hours = HashMap::new();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for (id, h) in ids.iter().zip([80.0, 160.0, 170.0, 165.0, 280.0]) {
            hours.insert(*id, h);
        }
        let report = equity_report(&hours, None).unwrap();
        assert!(!report.is_equitable);
        assert!(report.gini > TARGET_GINI);
        assert!(report.recommendations.iter().any(|r| r.contains("transfer") || r.contains("Transfer")));
    }
}
