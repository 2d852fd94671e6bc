//! `POST /api/v1/documents/{generation_id}/confirm`

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, AuthContext};
use crate::db::repository::confirmation;
use crate::models::{DocumentConfirmationRequest, DocumentConfirmationResponse};
use crate::redact;

/// Record clinician confirmation of a generated document. Required before
/// the external PDF subsystem will render it. Errors here are diagnostic
/// and not audited.
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(generation_id): Path<String>,
    ApiJson(request): ApiJson<DocumentConfirmationRequest>,
) -> Result<Json<DocumentConfirmationResponse>, ApiError> {
    let payload_json = request
        .confirmed_payload
        .unwrap_or_else(|| serde_json::json!({}));
    let payload = redact::prepare_audit_payload(&ctx.state.settings, &payload_json);

    let confirmation = {
        let conn = ctx.state.db()?;
        confirmation::confirm_document(
            &conn,
            &generation_id,
            &auth.user_id,
            payload,
            request.notes.as_deref(),
        )?
    };

    tracing::info!(
        user_id = %auth.user_id,
        generation_id = %confirmation.generation_id,
        confirmation_id = %confirmation.id,
        "Document confirmed"
    );

    Ok(Json(DocumentConfirmationResponse {
        success: true,
        confirmation_id: confirmation.id,
        generation_id: confirmation.generation_id,
        user_id: confirmation.user_id,
        document_type: confirmation.document_kind,
        document_version: confirmation.document_version,
        confirmed_at: confirmation.confirmed_at,
        message: "Document confirmed and ready for PDF generation".to_string(),
    }))
}
