//! Person entities: residents and faculty.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of person participating in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonKind {
    Resident,
    Faculty,
}

/// Post-graduate year tier for residents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PgyLevel {
    Pgy1,
    Pgy2,
    Pgy3,
}

impl PgyLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            PgyLevel::Pgy1 => 1,
            PgyLevel::Pgy2 => 2,
            PgyLevel::Pgy3 => 3,
        }
    }
}

/// Administrative specialty track for an `Admin` faculty role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminTrack {
    Gme,
    Dfm,
    Sm,
}

/// Faculty role classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacultyRole {
    Core,
    SportsMed,
    Admin(AdminTrack),
}

/// Capability flags a person may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub performs_procedures: bool,
    pub is_sports_medicine: bool,
}

/// Weekly clinic caps, expressed in half-day blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicCaps {
    pub min: u32,
    pub max: u32,
}

/// A resident or faculty member. Read-only during a scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub kind: PersonKind,
    pub pgy_level: Option<PgyLevel>,
    pub faculty_role: Option<FacultyRole>,
    pub capabilities: Capabilities,
    pub clinic_caps: ClinicCaps,
}

impl Person {
    pub fn is_resident(&self) -> bool {
        self.kind == PersonKind::Resident
    }

    pub fn is_faculty(&self) -> bool {
        self.kind == PersonKind::Faculty
    }

    /// True for PGY-1/PGY-2 residents, who drive the supervision ratio.
    pub fn is_junior_resident(&self) -> bool {
        matches!(self.pgy_level, Some(PgyLevel::Pgy1) | Some(PgyLevel::Pgy2))
    }
}
