//! CDT code and selection rule tables. Rules are validated on every
//! write: the referenced code must exist and be active, and at most one
//! active rule may cover a `(tier, age_group)` pair.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::parse_timestamp;
use crate::db::DatabaseError;
use crate::models::{AgeGroup, CaseTier, CodeCategory, ProcedureCode, SelectionRule};

pub fn insert_code(
    conn: &Connection,
    code: &str,
    description: &str,
    category: CodeCategory,
    is_primary: bool,
    notes: Option<&str>,
) -> Result<(), DatabaseError> {
    if description.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "code {code} requires a non-empty description"
        )));
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cdt_codes (code, description, category, is_primary, is_active, notes,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)",
        params![code, description, category.as_str(), is_primary as i32, notes, now],
    )?;
    Ok(())
}

pub fn get_code(conn: &Connection, code: &str) -> Result<Option<ProcedureCode>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT code, description, category, is_primary, is_active, notes,
             created_at, updated_at
             FROM cdt_codes WHERE code = ?1",
            params![code],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, i32>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((code, description, category, is_primary, is_active, notes, created, updated)) = row
    else {
        return Ok(None);
    };

    Ok(Some(ProcedureCode {
        code,
        description,
        category: CodeCategory::from_str(&category)?,
        is_primary: is_primary != 0,
        is_active: is_active != 0,
        notes,
        created_at: parse_timestamp(&created)?,
        updated_at: parse_timestamp(&updated)?,
    }))
}

/// Retire a code. Codes are never deleted so historical rules and audit
/// records keep resolving.
pub fn deactivate_code(conn: &Connection, code: &str) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE cdt_codes SET is_active = 0, updated_at = ?2 WHERE code = ?1",
        params![code, Utc::now().to_rfc3339()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ProcedureCode".into(),
            id: code.into(),
        });
    }
    Ok(())
}

/// Insert an active selection rule after validating its invariants.
pub fn insert_rule(
    conn: &Connection,
    tier: CaseTier,
    age_group: AgeGroup,
    code: &str,
    priority: i64,
) -> Result<SelectionRule, DatabaseError> {
    let referenced = get_code(conn, code)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "ProcedureCode".into(),
        id: code.into(),
    })?;
    if !referenced.is_active {
        return Err(DatabaseError::ConstraintViolation(format!(
            "code {code} is inactive and cannot be referenced by a new rule"
        )));
    }
    if find_active_rule(conn, tier, age_group)?.is_some() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "an active rule already exists for tier={tier}, age_group={age_group}"
        )));
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO cdt_rules (id, tier, age_group, code, priority, is_active,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        params![
            id.to_string(),
            tier.as_str(),
            age_group.as_str(),
            code,
            priority,
            now.to_rfc3339()
        ],
    )?;

    Ok(SelectionRule {
        id,
        tier,
        age_group,
        code: code.to_string(),
        priority,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub fn deactivate_rule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE cdt_rules SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), Utc::now().to_rfc3339()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "SelectionRule".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// The active rule for a `(tier, age_group)` pair. Highest priority wins;
/// most recently updated breaks ties (only relevant for legacy data that
/// predates the uniqueness constraint).
pub fn find_active_rule(
    conn: &Connection,
    tier: CaseTier,
    age_group: AgeGroup,
) -> Result<Option<SelectionRule>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, tier, age_group, code, priority, is_active, created_at, updated_at
             FROM cdt_rules
             WHERE tier = ?1 AND age_group = ?2 AND is_active = 1
             ORDER BY priority DESC, updated_at DESC
             LIMIT 1",
            params![tier.as_str(), age_group.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i32>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((id, tier, age_group, code, priority, is_active, created, updated)) = row else {
        return Ok(None);
    };

    Ok(Some(SelectionRule {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        tier: CaseTier::from_str(&tier)?,
        age_group: AgeGroup::from_str(&age_group)?,
        code,
        priority,
        is_active: is_active != 0,
        created_at: parse_timestamp(&created)?,
        updated_at: parse_timestamp(&updated)?,
    }))
}
