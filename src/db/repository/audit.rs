//! Append-only generation audit log. The only write is `insert_generation`;
//! rows are never updated or deleted.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::repository::parse_timestamp;
use crate::db::DatabaseError;
use crate::models::{DocumentKind, GenerationRecord, GenerationStatus, NewGeneration};

/// Append a generation event. Assigns the id and timestamp and returns
/// the persisted record.
pub fn insert_generation(
    conn: &Connection,
    new: &NewGeneration,
) -> Result<GenerationRecord, DatabaseError> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO audit_log (id, user_id, document_kind, document_version, input_data,
         output_data, model_used, tokens_used, generation_time_ms, status, error_message,
         seed, is_regenerated, previous_version_uuid, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            id.to_string(),
            new.user_id,
            new.document_kind.as_str(),
            new.document_version,
            new.input_data,
            new.output_data,
            new.model_used,
            new.tokens_used,
            new.generation_time_ms,
            new.status.as_str(),
            new.error_message,
            new.seed,
            new.is_regenerated as i32,
            new.previous_version_uuid,
            created_at.to_rfc3339(),
        ],
    )?;

    Ok(GenerationRecord {
        id,
        user_id: new.user_id.clone(),
        document_kind: new.document_kind,
        document_version: new.document_version.clone(),
        input_data: new.input_data.clone(),
        output_data: new.output_data.clone(),
        model_used: new.model_used.clone(),
        tokens_used: new.tokens_used,
        generation_time_ms: new.generation_time_ms,
        status: new.status,
        error_message: new.error_message.clone(),
        seed: new.seed,
        is_regenerated: new.is_regenerated,
        previous_version_uuid: new.previous_version_uuid.clone(),
        created_at,
    })
}

const GENERATION_COLUMNS: &str = "id, user_id, document_kind, document_version, input_data, \
     output_data, model_used, tokens_used, generation_time_ms, status, error_message, seed, \
     is_regenerated, previous_version_uuid, created_at";

fn map_generation_row(row: &Row<'_>) -> rusqlite::Result<RawGeneration> {
    Ok(RawGeneration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        document_kind: row.get(2)?,
        document_version: row.get(3)?,
        input_data: row.get(4)?,
        output_data: row.get(5)?,
        model_used: row.get(6)?,
        tokens_used: row.get(7)?,
        generation_time_ms: row.get(8)?,
        status: row.get(9)?,
        error_message: row.get(10)?,
        seed: row.get(11)?,
        is_regenerated: row.get(12)?,
        previous_version_uuid: row.get(13)?,
        created_at: row.get(14)?,
    })
}

struct RawGeneration {
    id: String,
    user_id: String,
    document_kind: String,
    document_version: String,
    input_data: String,
    output_data: String,
    model_used: String,
    tokens_used: Option<i64>,
    generation_time_ms: Option<i64>,
    status: String,
    error_message: Option<String>,
    seed: Option<i64>,
    is_regenerated: i32,
    previous_version_uuid: Option<String>,
    created_at: String,
}

impl RawGeneration {
    fn into_record(self) -> Result<GenerationRecord, DatabaseError> {
        Ok(GenerationRecord {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            user_id: self.user_id,
            document_kind: DocumentKind::from_str(&self.document_kind)?,
            document_version: self.document_version,
            input_data: self.input_data,
            output_data: self.output_data,
            model_used: self.model_used,
            tokens_used: self.tokens_used,
            generation_time_ms: self.generation_time_ms,
            status: GenerationStatus::from_str(&self.status)?,
            error_message: self.error_message,
            seed: self.seed,
            is_regenerated: self.is_regenerated != 0,
            previous_version_uuid: self.previous_version_uuid,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Look up a generation by id. The id is accepted as an arbitrary string
/// so callers can pass client-supplied identifiers straight through.
pub fn get_generation(
    conn: &Connection,
    id: &str,
) -> Result<Option<GenerationRecord>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {GENERATION_COLUMNS} FROM audit_log WHERE id = ?1"),
            params![id],
            map_generation_row,
        )
        .optional()?;
    raw.map(RawGeneration::into_record).transpose()
}

/// Recent generations for a user, newest first.
pub fn list_generations_by_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> Result<Vec<GenerationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENERATION_COLUMNS} FROM audit_log
         WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![user_id, limit], map_generation_row)?;
    rows.map(|raw| raw.map_err(DatabaseError::from)?.into_record())
        .collect()
}

/// Generations of a kind since a point in time, oldest first.
pub fn list_generations_by_kind_since(
    conn: &Connection,
    kind: DocumentKind,
    since: DateTime<Utc>,
) -> Result<Vec<GenerationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENERATION_COLUMNS} FROM audit_log
         WHERE document_kind = ?1 AND created_at >= ?2 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![kind.as_str(), since.to_rfc3339()], map_generation_row)?;
    rows.map(|raw| raw.map_err(DatabaseError::from)?.into_record())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn sample(user: &str, seed: Option<i64>) -> NewGeneration {
        NewGeneration {
            user_id: user.to_string(),
            document_kind: DocumentKind::TreatmentSummary,
            document_version: "1.0".into(),
            input_data: "{}".into(),
            output_data: "{}".into(),
            model_used: "gpt-4o".into(),
            tokens_used: Some(321),
            generation_time_ms: Some(1500),
            status: GenerationStatus::Success,
            error_message: None,
            seed,
            is_regenerated: false,
            previous_version_uuid: None,
        }
    }

    #[test]
    fn insert_assigns_id_and_round_trips() {
        let conn = open_memory_database().unwrap();
        let record = insert_generation(&conn, &sample("dentist-1", Some(42))).unwrap();

        let fetched = get_generation(&conn, &record.id.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.user_id, "dentist-1");
        assert_eq!(fetched.document_kind, DocumentKind::TreatmentSummary);
        assert_eq!(fetched.seed, Some(42));
        assert_eq!(fetched.status, GenerationStatus::Success);
        assert!(!fetched.is_regenerated);
    }

    #[test]
    fn get_unknown_id_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_generation(&conn, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn error_record_persists_message_without_seed() {
        let conn = open_memory_database().unwrap();
        let new = NewGeneration {
            status: GenerationStatus::Error,
            error_message: Some("LLM call failed: connection refused".into()),
            seed: None,
            tokens_used: None,
            generation_time_ms: None,
            ..sample("dentist-1", None)
        };
        let record = insert_generation(&conn, &new).unwrap();
        let fetched = get_generation(&conn, &record.id.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(fetched.status, GenerationStatus::Error);
        assert!(fetched.error_message.unwrap().contains("connection refused"));
        assert!(fetched.seed.is_none());
    }

    #[test]
    fn list_by_user_filters_and_limits() {
        let conn = open_memory_database().unwrap();
        for _ in 0..3 {
            insert_generation(&conn, &sample("dentist-a", Some(42))).unwrap();
        }
        insert_generation(&conn, &sample("dentist-b", Some(42))).unwrap();

        let records = list_generations_by_user(&conn, "dentist-a", 2).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.user_id == "dentist-a"));
    }

    #[test]
    fn list_by_kind_since_excludes_older() {
        let conn = open_memory_database().unwrap();
        insert_generation(&conn, &sample("dentist-a", Some(42))).unwrap();

        let future = Utc::now() + chrono::Duration::hours(1);
        let records =
            list_generations_by_kind_since(&conn, DocumentKind::TreatmentSummary, future).unwrap();
        assert!(records.is_empty());

        let past = Utc::now() - chrono::Duration::hours(1);
        let records =
            list_generations_by_kind_since(&conn, DocumentKind::TreatmentSummary, past).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn regeneration_links_to_parent() {
        let conn = open_memory_database().unwrap();
        let parent = insert_generation(&conn, &sample("dentist-1", Some(42))).unwrap();

        let child = NewGeneration {
            seed: Some(43),
            is_regenerated: true,
            previous_version_uuid: Some(parent.id.to_string()),
            ..sample("dentist-1", None)
        };
        let child = insert_generation(&conn, &child).unwrap();
        let fetched = get_generation(&conn, &child.id.to_string())
            .unwrap()
            .unwrap();
        assert!(fetched.is_regenerated);
        assert_eq!(
            fetched.previous_version_uuid.as_deref(),
            Some(parent.id.to_string().as_str())
        );
        assert_eq!(fetched.seed, Some(43));
    }
}
