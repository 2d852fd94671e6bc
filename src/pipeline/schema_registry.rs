//! Static registry of per-document-kind metadata: the schema version
//! stamped onto every audit record, the JSON output schema sent to the
//! LLM, and the initial seed for fresh generations.

use serde_json::{json, Value};

use crate::models::DocumentKind;
use crate::settings::Settings;

/// Version string of the document contract, recorded at write time.
pub fn document_version(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::TreatmentSummary => "1.0",
        DocumentKind::InsuranceSummary => "1.0",
        DocumentKind::ProgressNotes => "1.0",
    }
}

/// Name under which the output schema is registered with the LLM.
pub fn schema_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::TreatmentSummary => "treatment_summary_output",
        DocumentKind::InsuranceSummary => "insurance_summary_output",
        DocumentKind::ProgressNotes => "progress_notes_output",
    }
}

/// JSON schema the LLM response must conform to.
///
/// The insurance schema asks the model for the summary text only; the
/// fixed disclaimer is attached by the system so it stays byte-for-byte
/// stable.
pub fn output_schema(kind: DocumentKind) -> Value {
    match kind {
        DocumentKind::TreatmentSummary => json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "summary": {"type": "string"}
            },
            "required": ["title", "summary"],
            "additionalProperties": false
        }),
        DocumentKind::InsuranceSummary => json!({
            "type": "object",
            "properties": {
                "insurance_summary": {"type": "string"}
            },
            "required": ["insurance_summary"],
            "additionalProperties": false
        }),
        // Declared but not generated; the placeholder route never calls
        // the LLM.
        DocumentKind::ProgressNotes => json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

/// Seed used for the first generation of a version chain.
pub fn initial_seed(settings: &Settings, kind: DocumentKind) -> i64 {
    match kind {
        DocumentKind::TreatmentSummary => settings.treatment_summary_seed,
        DocumentKind::InsuranceSummary => settings.insurance_summary_seed,
        DocumentKind::ProgressNotes => settings.progress_notes_seed,
    }
}
