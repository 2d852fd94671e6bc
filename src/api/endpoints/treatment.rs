//! `POST /api/v1/generate-treatment-summary`

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, AuthContext};
use crate::models::{TreatmentSummaryRequest, TreatmentSummaryResponse};
use crate::pipeline::coordinator;

/// Generate a treatment summary for a dental case. Structured case data
/// goes in; a narrative document, deterministic CDT codes, and an audit
/// record come out.
pub async fn generate(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<TreatmentSummaryRequest>,
) -> Result<Json<TreatmentSummaryResponse>, ApiError> {
    request.validate()?;
    let response =
        coordinator::generate_treatment_summary(&ctx.state, &auth.user_id, &request).await?;
    Ok(Json(response))
}
