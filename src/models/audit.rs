//! Append-only generation audit records. A record's `id` is the
//! generation_id returned to the client; regenerations link to their
//! parent through `previous_version_uuid`, forming a linear version chain
//! with a monotonically increasing seed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{DocumentKind, GenerationStatus};

/// One generation event, exactly as persisted. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub user_id: String,
    pub document_kind: DocumentKind,
    pub document_version: String,
    /// Serialized request, redacted per policy before persistence.
    pub input_data: String,
    /// Serialized parsed LLM output, redacted per policy. Empty object on
    /// error records.
    pub output_data: String,
    pub model_used: String,
    pub tokens_used: Option<i64>,
    pub generation_time_ms: Option<i64>,
    pub status: GenerationStatus,
    pub error_message: Option<String>,
    /// Present on every success record. Error records that failed before
    /// seed resolution have none.
    pub seed: Option<i64>,
    pub is_regenerated: bool,
    /// Stored verbatim from the request so failed regenerations keep the
    /// identifier the caller supplied.
    pub previous_version_uuid: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new audit row. The repository assigns `id` and
/// `created_at` on insert.
#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub user_id: String,
    pub document_kind: DocumentKind,
    pub document_version: String,
    pub input_data: String,
    pub output_data: String,
    pub model_used: String,
    pub tokens_used: Option<i64>,
    pub generation_time_ms: Option<i64>,
    pub status: GenerationStatus,
    pub error_message: Option<String>,
    pub seed: Option<i64>,
    pub is_regenerated: bool,
    pub previous_version_uuid: Option<String>,
}
