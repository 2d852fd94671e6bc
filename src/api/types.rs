//! Shared types for the API layer: the router context, the authenticated
//! principal, and a JSON extractor that renders decode failures as 422s.

use std::sync::Arc;

use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub state: Arc<AppState>,
}

impl ApiContext {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

/// Authenticated principal, injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

/// `axum::Json` wrapper whose rejection is a schema violation (422 with
/// the decoder's message) instead of axum's default mix of 400s.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::SchemaViolation(rejection.body_text())),
        }
    }
}
