//! Request and response shapes for treatment summary generation.
//!
//! The request contract is deliberately loose: every field is optional
//! with a sensible default so the portal UI can evolve without breaking
//! callers. Bounds beyond enum membership are checked by `validate`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{
    Arches, Attachments, Audience, CaseDifficulty, CaseTier, MonitoringApproach, Tone,
    TreatmentType,
};
use crate::models::FieldViolation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentSummaryRequest {
    #[serde(default)]
    pub is_regeneration: bool,
    #[serde(default)]
    pub previous_version_uuid: Option<String>,
    /// Case tier for CDT code mapping. Selection is skipped entirely when
    /// absent.
    #[serde(default)]
    pub tier: Option<CaseTier>,
    #[serde(default = "default_treatment_type")]
    pub treatment_type: TreatmentType,
    #[serde(default = "default_area_treated")]
    pub area_treated: Arches,
    #[serde(default = "default_duration_range")]
    pub duration_range: String,
    #[serde(default = "default_case_difficulty")]
    pub case_difficulty: CaseDifficulty,
    #[serde(default = "default_monitoring_approach")]
    pub monitoring_approach: MonitoringApproach,
    #[serde(default = "default_attachments")]
    pub attachments: Attachments,
    #[serde(default)]
    pub whitening_included: bool,
    #[serde(default)]
    pub dentist_note: Option<String>,
    #[serde(default = "default_audience")]
    pub audience: Audience,
    #[serde(default = "default_tone")]
    pub tone: Tone,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub practice_name: Option<String>,
    /// Patient age for CDT logic (adolescent under 18, adult 18 and over).
    #[serde(default)]
    pub patient_age: Option<i64>,
}

fn default_treatment_type() -> TreatmentType {
    TreatmentType::ClearAligners
}

fn default_area_treated() -> Arches {
    Arches::Both
}

fn default_duration_range() -> String {
    "4-6 months".to_string()
}

fn default_case_difficulty() -> CaseDifficulty {
    CaseDifficulty::Moderate
}

fn default_monitoring_approach() -> MonitoringApproach {
    MonitoringApproach::Mixed
}

fn default_attachments() -> Attachments {
    Attachments::Some
}

fn default_audience() -> Audience {
    Audience::Patient
}

fn default_tone() -> Tone {
    Tone::Reassuring
}

impl Default for TreatmentSummaryRequest {
    fn default() -> Self {
        Self {
            is_regeneration: false,
            previous_version_uuid: None,
            tier: None,
            treatment_type: default_treatment_type(),
            area_treated: default_area_treated(),
            duration_range: default_duration_range(),
            case_difficulty: default_case_difficulty(),
            monitoring_approach: default_monitoring_approach(),
            attachments: default_attachments(),
            whitening_included: false,
            dentist_note: None,
            audience: default_audience(),
            tone: default_tone(),
            patient_name: None,
            practice_name: None,
            patient_age: None,
        }
    }
}

impl TreatmentSummaryRequest {
    /// Field bounds beyond enum membership.
    pub fn validate(&self) -> Result<(), FieldViolation> {
        if let Some(age) = self.patient_age {
            if !(0..=120).contains(&age) {
                return Err(FieldViolation::new(
                    "patient_age",
                    "must be between 0 and 120",
                ));
            }
        }
        if self.duration_range.is_empty() || self.duration_range.chars().count() > 50 {
            return Err(FieldViolation::new(
                "duration_range",
                "must be between 1 and 50 characters",
            ));
        }
        for (field, value) in [
            ("patient_name", &self.patient_name),
            ("practice_name", &self.practice_name),
        ] {
            if let Some(v) = value {
                if v.chars().count() > 200 {
                    return Err(FieldViolation::new(field, "must be at most 200 characters"));
                }
            }
        }
        if let Some(note) = &self.dentist_note {
            if note.chars().count() > 500 {
                return Err(FieldViolation::new(
                    "dentist_note",
                    "must be at most 500 characters",
                ));
            }
        }
        Ok(())
    }
}

/// Structured output contract for the LLM. Both fields must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentSummaryOutput {
    pub title: String,
    pub summary: String,
}

/// Add-on suggestion attached to a treatment CDT selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdtAddOn {
    pub code: String,
    pub description: String,
}

/// CDT block of the treatment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentCdtCodes {
    pub primary_code: String,
    pub primary_description: String,
    pub suggested_add_ons: Vec<CdtAddOn>,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentMetadata {
    pub tokens_used: i64,
    pub generation_time_ms: i64,
    pub audience: Audience,
    pub tone: Tone,
    pub seed: i64,
    pub document_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentSummaryResponse {
    pub success: bool,
    pub document: TreatmentSummaryOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdt_codes: Option<TreatmentCdtCodes>,
    pub metadata: TreatmentMetadata,
    pub uuid: Uuid,
    pub is_regenerated: bool,
    pub previous_version_uuid: Option<String>,
    pub seed: i64,
}
