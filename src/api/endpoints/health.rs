//! Health and root endpoints. Unauthenticated.

use axum::Json;
use serde::Serialize;

use crate::settings::{APP_NAME, APP_VERSION};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: APP_VERSION,
    })
}

#[derive(Serialize)]
pub struct RootResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

/// `GET /` — API information.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: APP_NAME,
        version: APP_VERSION,
        status: "operational",
    })
}
