//! Absences and the derived availability matrix.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Category of absence. The core does not branch on the specific reason,
/// only on whether it blocks availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbsenceType {
    Vacation,
    Sick,
    ConferenceLeave,
    Parental,
    Other(String),
}

/// A closed date interval during which a person may be unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Absence {
    pub person_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub absence_type: AbsenceType,
    /// Blocking absences hard-remove availability; non-blocking absences
    /// only influence soft preferences.
    pub is_blocking: bool,
}

impl Absence {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A single availability entry for one `(person, block)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub partial_absence: bool,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            available: true,
            partial_absence: false,
        }
    }
}

/// Derived mapping `(person_id, block_id) -> Availability`, built once per
/// run in O(|people| * |blocks|).
#[derive(Debug, Clone, Default)]
pub struct AvailabilityMatrix {
    entries: HashMap<(Uuid, Uuid), Availability>,
}

impl AvailabilityMatrix {
    /// Build the matrix from the full person/block sets and the absences
    /// that apply to them.
    pub fn build(
        person_ids: &[Uuid],
        blocks: &[(Uuid, NaiveDate)],
        absences: &[Absence],
    ) -> Self {
        let mut by_person: HashMap<Uuid, Vec<&Absence>> = HashMap::new();
        for absence in absences {
            by_person.entry(absence.person_id).or_default().push(absence);
        }

        let mut entries = HashMap::with_capacity(person_ids.len() * blocks.len());
        for &person_id in person_ids {
            let person_absences = by_person.get(&person_id);
            for &(block_id, date) in blocks {
                let mut availability = Availability::default();
                if let Some(absences) = person_absences {
                    for absence in absences {
                        if absence.covers(date) {
                            if absence.is_blocking {
                                availability.available = false;
                            } else {
                                availability.partial_absence = true;
                            }
                        }
                    }
                }
                entries.insert((person_id, block_id), availability);
            }
        }

        Self { entries }
    }

    pub fn get(&self, person_id: Uuid, block_id: Uuid) -> Availability {
        self.entries
            .get(&(person_id, block_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_available(&self, person_id: Uuid, block_id: Uuid) -> bool {
        self.get(person_id, block_id).available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn blocking_absence_removes_availability() {
        let person = Uuid::new_v4();
        let block = Uuid::new_v4();
        let absences = vec![Absence {
            person_id: person,
            start_date: date(1),
            end_date: date(5),
            absence_type: AbsenceType::Sick,
            is_blocking: true,
        }];
        let matrix = AvailabilityMatrix::build(&[person], &[(block, date(3))], &absences);
        assert!(!matrix.is_available(person, block));
    }

    #[test]
    fn non_blocking_absence_keeps_availability_but_flags_partial() {
        let person = Uuid::new_v4();
        let block = Uuid::new_v4();
        let absences = vec![Absence {
            person_id: person,
            start_date: date(1),
            end_date: date(5),
            absence_type: AbsenceType::Other("family".into()),
            is_blocking: false,
        }];
        let matrix = AvailabilityMatrix::build(&[person], &[(block, date(3))], &absences);
        let entry = matrix.get(person, block);
        assert!(entry.available);
        assert!(entry.partial_absence);
    }

    #[test]
    fn unlisted_pair_defaults_available() {
        let matrix = AvailabilityMatrix::build(&[], &[], &[]);
        assert!(matrix.is_available(Uuid::new_v4(), Uuid::new_v4()));
    }
}
