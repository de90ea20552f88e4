//! Canonical activity code table and rotation templates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical activity code. `Other` preserves forward compatibility with
/// template-defined codes the core does not interpret specially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityCode {
    FmClinic,
    C,
    At,
    Pcat,
    Nf,
    Fmit,
    Gme,
    Dfm,
    SmClinic,
    Other(String),
}

/// Broad classification of what a rotation template represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Clinic,
    Inpatient,
    Procedure,
    Call,
    Conference,
    Leave,
    Admin,
    Supervision,
}

/// A named activity pattern a resident or faculty member can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationTemplate {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: String,
    pub activity_type: ActivityType,
    pub activity_code: ActivityCode,
    pub requires_specialty: Option<String>,
    pub requires_procedure_credential: bool,
    pub max_residents: Option<u32>,
    pub min_pgy_level: Option<u8>,
    pub supervision_ratio: Option<u32>,
}

impl RotationTemplate {
    /// `true` for templates whose activity type never gets scheduled on
    /// weekend/holiday blocks (clinic-style templates).
    pub fn is_weekday_only_clinic(&self) -> bool {
        self.activity_type == ActivityType::Clinic
    }
}
