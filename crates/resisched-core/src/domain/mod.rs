//! Core entity types (§3 of the scheduling engine spec).

pub mod absence;
pub mod activity;
pub mod assignment;
pub mod block;
pub mod errors;
pub mod person;
pub mod run;

pub use absence::{Absence, AbsenceType, Availability, AvailabilityMatrix};
pub use activity::{ActivityCode, ActivityType, RotationTemplate};
pub use assignment::{find_duplicate_primaries, Assignment, AssignmentRole};
pub use block::{sort_blocks, Block, TimeOfDay};
pub use errors::{DomainError, DomainResult, StatusHint};
pub use person::{AdminTrack, Capabilities, ClinicCaps, FacultyRole, Person, PersonKind, PgyLevel};
pub use run::{Algorithm, RunStatus, ScheduleRun, ScheduleSnapshot};
