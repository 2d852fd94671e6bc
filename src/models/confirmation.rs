//! Clinician confirmation of a generated document. At most one
//! confirmation exists per generation; PDF rendering of confirmed
//! documents happens in an external subsystem that stamps
//! `pdf_generated_at` out of band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::DocumentKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub id: Uuid,
    pub generation_id: Uuid,
    pub user_id: String,
    pub document_kind: DocumentKind,
    pub document_version: String,
    pub confirmed_at: DateTime<Utc>,
    /// Final reviewed content, redacted per policy. An empty JSON object
    /// when the request carried no payload.
    pub confirmed_payload: String,
    pub notes: Option<String>,
    pub pdf_generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfirmationRequest {
    #[serde(default)]
    pub confirmed_payload: Option<serde_json::Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfirmationResponse {
    pub success: bool,
    pub confirmation_id: Uuid,
    pub generation_id: Uuid,
    pub user_id: String,
    pub document_type: DocumentKind,
    pub document_version: String,
    pub confirmed_at: DateTime<Utc>,
    pub message: String,
}
