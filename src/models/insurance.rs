//! Request and response shapes for insurance summary generation. An
//! administrative support tool: inputs are explicit, nothing is inferred,
//! and only flagged diagnostic assets generate codes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{AgeGroup, Arches, CodeCategory, InsuranceTier, MonitoringApproach};
use crate::models::FieldViolation;

/// Diagnostic assets available for the case. No guessing: if an asset is
/// not flagged, no code is emitted for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticAssets {
    #[serde(default)]
    pub intraoral_photos: bool,
    #[serde(default)]
    pub panoramic_xray: bool,
    #[serde(default)]
    pub fmx: bool,
    /// Carried for the treatment flow's add-on mapping; the insurance
    /// selection ignores it.
    #[serde(default)]
    pub diagnostic_casts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceSummaryRequest {
    #[serde(default)]
    pub is_regeneration: bool,
    #[serde(default)]
    pub previous_version_uuid: Option<String>,
    pub tier: InsuranceTier,
    #[serde(default = "default_arches")]
    pub arches: Arches,
    pub age_group: AgeGroup,
    #[serde(default = "default_retainers_included")]
    pub retainers_included: bool,
    #[serde(default)]
    pub diagnostic_assets: DiagnosticAssets,
    #[serde(default = "default_monitoring_approach")]
    pub monitoring_approach: MonitoringApproach,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_arches() -> Arches {
    Arches::Both
}

fn default_retainers_included() -> bool {
    true
}

fn default_monitoring_approach() -> MonitoringApproach {
    MonitoringApproach::Mixed
}

impl InsuranceSummaryRequest {
    pub fn validate(&self) -> Result<(), FieldViolation> {
        if let Some(notes) = &self.notes {
            if notes.chars().count() > 500 {
                return Err(FieldViolation::new(
                    "notes",
                    "must be at most 500 characters",
                ));
            }
        }
        Ok(())
    }
}

/// Structured output contract for the LLM. The disclaimer is set by the
/// system, not the model, so it stays byte-for-byte stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceSummaryOutput {
    pub insurance_summary: String,
    pub disclaimer: String,
}

/// One selected CDT code in the insurance response, primary first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdtCodeEntry {
    pub code: String,
    pub description: String,
    pub category: CodeCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceMetadata {
    pub tokens_used: i64,
    pub generation_time_ms: i64,
    pub tier: InsuranceTier,
    pub age_group: AgeGroup,
    pub seed: i64,
    pub document_version: String,
    pub cdt_notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceSummaryResponse {
    pub success: bool,
    pub document: InsuranceSummaryOutput,
    pub cdt_codes: Vec<CdtCodeEntry>,
    pub metadata: InsuranceMetadata,
    pub uuid: Uuid,
    pub is_regenerated: bool,
    pub previous_version_uuid: Option<String>,
    pub seed: i64,
}
