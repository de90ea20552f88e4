//! Shared rolling-window duty-hour arithmetic, used by both the
//! in-pipeline ACGME hard constraints (C2) and the post-hoc ACGME
//! Validator (C6) so the two never drift apart on the definition of
//! "a rolling 7-day window".

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::context::SchedulingContext;
use crate::domain::{ActivityCode, Assignment};

/// Hours represented by one primary half-day assignment, of any
/// activity code.
pub const HOURS_PER_BLOCK: f64 = 4.0;

/// The ACGME rolling 7-day weekly duty-hour cap.
pub const HOURS_CAP_PER_WEEK: f64 = 80.0;

/// Hours a single primary assignment of `activity_code` contributes to
/// duty-hour totals. Flat across every activity code.
pub fn hours_for_activity(_activity_code: &ActivityCode) -> f64 {
    HOURS_PER_BLOCK
}

/// Per-resident, per-date hour totals for `Primary` assignments only.
pub fn hours_by_person_and_date(
    assignments: &[Assignment],
    context: &SchedulingContext,
) -> HashMap<Uuid, HashMap<NaiveDate, f64>> {
    let mut out: HashMap<Uuid, HashMap<NaiveDate, f64>> = HashMap::new();
    for assignment in assignments.iter().filter(|a| a.is_primary()) {
        let Some(block) = context.block_by_id(assignment.block_id) else {
            continue;
        };
        *out.entry(assignment.person_id)
            .or_default()
            .entry(block.date)
            .or_insert(0.0) += hours_for_activity(&assignment.activity_code);
    }
    out
}

/// For one resident's date->hours map, enumerate every 7-day window
/// (anchored at each date present in the schedule's range) and its
/// total hours.
pub fn rolling_seven_day_totals(
    by_date: &HashMap<NaiveDate, f64>,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Vec<(NaiveDate, f64)> {
    let mut windows = Vec::new();
    let mut start = range_start;
    while start <= range_end {
        let end = start + chrono::Duration::days(6);
        let total: f64 = (0..7)
            .map(|offset| {
                by_date
                    .get(&(start + chrono::Duration::days(offset)))
                    .copied()
                    .unwrap_or(0.0)
            })
            .sum();
        windows.push((start, total));
        if end >= range_end {
            break;
        }
        start = start.succ_opt().expect("date within representable bounds");
    }
    windows
}

/// `true` if every day in the window `[start, start+6]` has at least one
/// assignment (used to evaluate the "one day off in seven" rule: the
/// violation is the *absence* of any day with zero hours).
pub fn window_has_day_off(by_date: &HashMap<NaiveDate, f64>, window_start: NaiveDate) -> bool {
    (0..7).any(|offset| {
        by_date
            .get(&(window_start + chrono::Duration::days(offset)))
            .copied()
            .unwrap_or(0.0)
            == 0.0
    })
}
