//! CDT procedure codes and the selection rules that map case attributes
//! onto them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{AgeGroup, CaseTier, CodeCategory};

/// A dental procedure code such as `D8010`. Codes are never deleted;
/// retiring one clears `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureCode {
    pub code: String,
    pub description: String,
    pub category: CodeCategory,
    pub is_primary: bool,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A selection rule mapping `(tier, age_group)` onto a procedure code.
/// At most one active rule may exist per pair; the referenced code must
/// exist and be active when the rule is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRule {
    pub id: Uuid,
    pub tier: CaseTier,
    pub age_group: AgeGroup,
    pub code: String,
    pub priority: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
