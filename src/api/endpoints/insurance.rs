//! `POST /api/v1/generate-insurance-summary`

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, AuthContext};
use crate::models::{InsuranceSummaryRequest, InsuranceSummaryResponse};
use crate::pipeline::coordinator;

/// Generate a conservative, admin-facing insurance summary. Not a
/// diagnosis, claim submission, or guarantee of coverage; CDT codes are
/// selected deterministically from the rule table.
pub async fn generate(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<InsuranceSummaryRequest>,
) -> Result<Json<InsuranceSummaryResponse>, ApiError> {
    request.validate()?;
    let response =
        coordinator::generate_insurance_summary(&ctx.state, &auth.user_id, &request).await?;
    Ok(Json(response))
}
