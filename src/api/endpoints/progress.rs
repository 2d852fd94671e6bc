//! `POST /api/v1/generate-progress-notes` — placeholder.
//!
//! The module is declared but generation is not implemented; the route
//! acknowledges the request so portal integrations can probe for it.

use axum::{Extension, Json};
use serde::Serialize;

use crate::api::types::AuthContext;

#[derive(Serialize)]
pub struct ProgressNotesResponse {
    pub success: bool,
    pub message: &'static str,
    pub module: &'static str,
}

pub async fn generate(Extension(_auth): Extension<AuthContext>) -> Json<ProgressNotesResponse> {
    Json(ProgressNotesResponse {
        success: true,
        message: "Module coming soon",
        module: "progress-notes",
    })
}
