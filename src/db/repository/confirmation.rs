//! Document confirmation store. At most one confirmation per generation,
//! enforced both by an up-front check and by the unique index on
//! `generation_id` (which closes the race between concurrent confirms).

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{audit, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{ConfirmationRecord, DocumentKind, GenerationStatus};

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("Generation ID {0} not found")]
    GenerationNotFound(String),

    #[error("Generation {0} did not complete successfully and cannot be confirmed")]
    GenerationNotSuccessful(String),

    #[error("Document already confirmed at {confirmed_at}")]
    AlreadyConfirmed {
        generation_id: String,
        confirmed_at: String,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Record clinician confirmation of a generated document.
///
/// `confirmed_payload` is the serialized (already redacted) reviewed
/// content; callers pass `"{}"` when the request carried none. The
/// document version is carried over from the audit record.
pub fn confirm_document(
    conn: &Connection,
    generation_id: &str,
    user_id: &str,
    confirmed_payload: String,
    notes: Option<&str>,
) -> Result<ConfirmationRecord, ConfirmationError> {
    let generation = audit::get_generation(conn, generation_id)?
        .ok_or_else(|| ConfirmationError::GenerationNotFound(generation_id.to_string()))?;

    if generation.status != GenerationStatus::Success {
        return Err(ConfirmationError::GenerationNotSuccessful(
            generation_id.to_string(),
        ));
    }

    if let Some(existing) = get_confirmation(conn, generation_id)? {
        return Err(ConfirmationError::AlreadyConfirmed {
            generation_id: generation_id.to_string(),
            confirmed_at: existing.confirmed_at.to_rfc3339(),
        });
    }

    let id = Uuid::new_v4();
    let confirmed_at = Utc::now();
    let inserted = conn.execute(
        "INSERT INTO document_confirmations (id, generation_id, user_id, document_kind,
         document_version, confirmed_at, confirmed_payload, notes, pdf_generated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
        params![
            id.to_string(),
            generation.id.to_string(),
            user_id,
            generation.document_kind.as_str(),
            generation.document_version,
            confirmed_at.to_rfc3339(),
            confirmed_payload,
            notes,
        ],
    );

    if let Err(e) = inserted {
        // A concurrent confirm may have won the unique index race.
        if is_unique_violation(&e) {
            let existing = get_confirmation(conn, generation_id)?;
            return Err(ConfirmationError::AlreadyConfirmed {
                generation_id: generation_id.to_string(),
                confirmed_at: existing
                    .map(|c| c.confirmed_at.to_rfc3339())
                    .unwrap_or_default(),
            });
        }
        return Err(DatabaseError::from(e).into());
    }

    Ok(ConfirmationRecord {
        id,
        generation_id: generation.id,
        user_id: user_id.to_string(),
        document_kind: generation.document_kind,
        document_version: generation.document_version,
        confirmed_at,
        confirmed_payload,
        notes: notes.map(str::to_string),
        pdf_generated_at: None,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub fn get_confirmation(
    conn: &Connection,
    generation_id: &str,
) -> Result<Option<ConfirmationRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, generation_id, user_id, document_kind, document_version, confirmed_at,
             confirmed_payload, notes, pdf_generated_at
             FROM document_confirmations WHERE generation_id = ?1",
            params![generation_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            },
        )
        .optional()?;

    let Some((id, generation_id, user_id, kind, version, confirmed_at, payload, notes, pdf_at)) =
        row
    else {
        return Ok(None);
    };

    Ok(Some(ConfirmationRecord {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        generation_id: Uuid::parse_str(&generation_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id,
        document_kind: DocumentKind::from_str(&kind)?,
        document_version: version,
        confirmed_at: parse_timestamp(&confirmed_at)?,
        confirmed_payload: payload,
        notes,
        pdf_generated_at: pdf_at.as_deref().map(parse_timestamp).transpose()?,
    }))
}

pub fn is_confirmed(conn: &Connection, generation_id: &str) -> Result<bool, DatabaseError> {
    Ok(get_confirmation(conn, generation_id)?.is_some())
}
