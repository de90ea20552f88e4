//! Adversarial scenarios (C8): the perturbations replayed against a
//! baseline schedule to probe how the pipeline degrades under faculty
//! or resident loss.
//!
//! `SchedulingContext` is immutable and rebuilt from scratch for every
//! run, so "take a savepoint, inject synthetic absences, roll back"
//! has no literal transaction to model: a scenario just describes a
//! perturbation of the baseline's raw inputs, and the simulator builds
//! a fresh, throwaway context from them per attempt. Nothing is ever
//! mutated in place.

use chrono::{Duration, NaiveDate};
use resisched_core::domain::{Absence, AbsenceType, Person};
use uuid::Uuid;

/// One of the six perturbation shapes spec'd for the resilience harness.
#[derive(Debug, Clone)]
pub enum ScenarioKind {
    /// No perturbation; establishes the score everything else is measured against.
    Baseline,
    RemoveFaculty(Uuid),
    RemoveResident(Uuid),
    UnexpectedLeave { person_id: Uuid, start: NaiveDate, days: i64 },
    /// `reduction_pct` of the workforce goes on blocking leave for the
    /// first `days` days of the run, and those same days are marked
    /// `Block::is_holiday`.
    HolidayShock { reduction_pct: f64, days: i64 },
    MultipleAbsence(Vec<Uuid>),
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub kind: ScenarioKind,
}

/// What a scenario does to the baseline's raw inputs before the
/// context is rebuilt: extra absences layered on top of the real
/// ones, plus dates to flip `Block::is_holiday` for.
#[derive(Debug, Clone, Default)]
pub struct Perturbation {
    pub extra_absences: Vec<Absence>,
    pub holiday_dates: Vec<NaiveDate>,
}

impl Scenario {
    pub fn baseline() -> Self {
        Scenario { name: "baseline".to_string(), kind: ScenarioKind::Baseline }
    }

    pub fn remove_faculty(id: Uuid) -> Self {
        Scenario { name: format!("remove_faculty[{id}]"), kind: ScenarioKind::RemoveFaculty(id) }
    }

    pub fn remove_resident(id: Uuid) -> Self {
        Scenario { name: format!("remove_resident[{id}]"), kind: ScenarioKind::RemoveResident(id) }
    }

    pub fn unexpected_leave(person_id: Uuid, start: NaiveDate, days: i64) -> Self {
        Scenario {
            name: format!("unexpected_leave[{person_id},{start},{days}]"),
            kind: ScenarioKind::UnexpectedLeave { person_id, start, days },
        }
    }

    pub fn holiday_shock(reduction_pct: f64, days: i64) -> Self {
        Scenario {
            name: format!("holiday_shock[{reduction_pct},{days}]"),
            kind: ScenarioKind::HolidayShock { reduction_pct, days },
        }
    }

    pub fn multiple_absence(ids: Vec<Uuid>) -> Self {
        Scenario { name: format!("multiple_absence[{}]", ids.len()), kind: ScenarioKind::MultipleAbsence(ids) }
    }

    /// Build this scenario's perturbation of `[range_start, range_end]`.
    /// `people` is the baseline roster, sorted by id, needed only by
    /// `HolidayShock` to pick which fraction of the workforce to pull.
    pub fn perturbation(&self, range_start: NaiveDate, range_end: NaiveDate, people: &[Person]) -> Perturbation {
        match &self.kind {
            ScenarioKind::Baseline => Perturbation::default(),
            ScenarioKind::RemoveFaculty(id) | ScenarioKind::RemoveResident(id) => Perturbation {
                extra_absences: vec![blocking_absence(*id, range_start, range_end)],
                holiday_dates: vec![],
            },
            ScenarioKind::UnexpectedLeave { person_id, start, days } => {
                let end = (*start + Duration::days((*days - 1).max(0))).min(range_end);
                Perturbation { extra_absences: vec![blocking_absence(*person_id, *start, end)], holiday_dates: vec![] }
            }
            ScenarioKind::HolidayShock { reduction_pct, days } => {
                let holiday_dates = dates_in_range(range_start, range_end, *days);
                let Some(shock_end) = holiday_dates.last().copied() else {
                    return Perturbation::default();
                };
                let affected_count = ((people.len() as f64) * reduction_pct.clamp(0.0, 1.0)).round() as usize;
                let mut sorted: Vec<&Person> = people.iter().collect();
                sorted.sort_by_key(|p| p.id);
                let extra_absences = sorted
                    .into_iter()
                    .take(affected_count)
                    .map(|p| blocking_absence(p.id, range_start, shock_end))
                    .collect();
                Perturbation { extra_absences, holiday_dates }
            }
            ScenarioKind::MultipleAbsence(ids) => Perturbation {
                extra_absences: ids.iter().map(|id| blocking_absence(*id, range_start, range_end)).collect(),
                holiday_dates: vec![],
            },
        }
    }
}

fn blocking_absence(person_id: Uuid, start_date: NaiveDate, end_date: NaiveDate) -> Absence {
    Absence {
        person_id,
        start_date,
        end_date: end_date.max(start_date),
        absence_type: AbsenceType::Other("resilience_harness".to_string()),
        is_blocking: true,
    }
}

fn dates_in_range(start: NaiveDate, end: NaiveDate, count: i64) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut date = start;
    for _ in 0..count.max(0) {
        if date > end {
            break;
        }
        dates.push(date);
        date += Duration::days(1);
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn baseline_perturbs_nothing() {
        let perturbation = Scenario::baseline().perturbation(day(1), day(14), &[]);
        assert!(perturbation.extra_absences.is_empty());
        assert!(perturbation.holiday_dates.is_empty());
    }

    #[test]
    fn remove_faculty_blocks_the_whole_range() {
        let id = Uuid::new_v4();
        let perturbation = Scenario::remove_faculty(id).perturbation(day(1), day(14), &[]);
        assert_eq!(perturbation.extra_absences.len(), 1);
        let absence = &perturbation.extra_absences[0];
        assert_eq!(absence.person_id, id);
        assert!(absence.is_blocking);
        assert_eq!(absence.start_date, day(1));
        assert_eq!(absence.end_date, day(14));
    }

    #[test]
    fn unexpected_leave_spans_only_the_requested_days() {
        let id = Uuid::new_v4();
        let perturbation = Scenario::unexpected_leave(id, day(3), 4).perturbation(day(1), day(14), &[]);
        let absence = &perturbation.extra_absences[0];
        assert_eq!(absence.start_date, day(3));
        assert_eq!(absence.end_date, day(6));
    }

    #[test]
    fn holiday_shock_marks_days_and_pulls_the_requested_fraction() {
        use resisched_core::domain::{Capabilities, ClinicCaps, FacultyRole, PersonKind};

        let people: Vec<Person> = (0..10)
            .map(|_| Person {
                id: Uuid::new_v4(),
                name: "Faculty".to_string(),
                kind: PersonKind::Faculty,
                pgy_level: None,
                faculty_role: Some(FacultyRole::Core),
                capabilities: Capabilities::default(),
                clinic_caps: ClinicCaps { min: 0, max: 10 },
            })
            .collect();
        let perturbation = Scenario::holiday_shock(0.5, 3).perturbation(day(1), day(14), &people);
        assert_eq!(perturbation.holiday_dates, vec![day(1), day(2), day(3)]);
        assert_eq!(perturbation.extra_absences.len(), 5);
    }

    #[test]
    fn multiple_absence_blocks_every_named_person() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let perturbation = Scenario::multiple_absence(ids.clone()).perturbation(day(1), day(14), &[]);
        assert_eq!(perturbation.extra_absences.len(), 3);
        for (absence, id) in perturbation.extra_absences.iter().zip(ids.iter()) {
            assert_eq!(absence.person_id, *id);
        }
    }
}
