//! API error types with structured JSON responses and the HTTP status
//! mapping for every failure the pipeline can produce.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::repository::confirmation::ConfirmationError;
use crate::db::DatabaseError;
use crate::models::FieldViolation;
use crate::pipeline::coordinator::GenerationError;
use crate::pipeline::llm::LlmError;
use crate::pipeline::selector::SelectionError;
use crate::state::StateError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    SchemaViolation(String),
    #[error("Invalid authentication credentials")]
    Unauthenticated,
    #[error("{0}")]
    RuleNotFound(String),
    #[error("{0}")]
    InsufficientInput(String),
    #[error("{0}")]
    CodeInactive(String),
    #[error("previous_version_uuid is required when is_regeneration is true")]
    RegenerationMissingParent,
    #[error("Previous generation {0} not found")]
    ParentNotFound(String),
    #[error("LLM call failed: {0}")]
    LlmCallFailed(String),
    #[error("LLM call timed out after {0}s")]
    LlmTimeout(u64),
    #[error("Generation ID {0} not found")]
    GenerationNotFound(String),
    #[error("Generation {0} did not complete successfully")]
    GenerationNotSuccessful(String),
    #[error("Document already confirmed at {0}")]
    AlreadyConfirmed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::SchemaViolation(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", detail.clone())
            }
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Invalid authentication credentials".to_string(),
            ),
            ApiError::RuleNotFound(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "RULE_NOT_FOUND", detail.clone())
            }
            ApiError::InsufficientInput(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INSUFFICIENT_INPUT",
                detail.clone(),
            ),
            ApiError::CodeInactive(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CODE_INACTIVE", detail.clone())
            }
            ApiError::RegenerationMissingParent => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "REGENERATION_MISSING_PARENT",
                self.to_string(),
            ),
            ApiError::ParentNotFound(_) => {
                (StatusCode::NOT_FOUND, "PARENT_NOT_FOUND", self.to_string())
            }
            ApiError::LlmCallFailed(_) => {
                (StatusCode::BAD_GATEWAY, "LLM_CALL_FAILED", self.to_string())
            }
            ApiError::LlmTimeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, "LLM_TIMEOUT", self.to_string())
            }
            ApiError::GenerationNotFound(_) => {
                (StatusCode::NOT_FOUND, "GENERATION_NOT_FOUND", self.to_string())
            }
            ApiError::GenerationNotSuccessful(_) => (
                StatusCode::CONFLICT,
                "GENERATION_NOT_SUCCESSFUL",
                self.to_string(),
            ),
            ApiError::AlreadyConfirmed(_) => {
                (StatusCode::CONFLICT, "ALREADY_CONFIRMED", self.to_string())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<FieldViolation> for ApiError {
    fn from(violation: FieldViolation) -> Self {
        ApiError::SchemaViolation(violation.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(_: AuthError) -> Self {
        ApiError::Unauthenticated
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::RegenerationMissingParent => ApiError::RegenerationMissingParent,
            GenerationError::ParentNotFound(id) => ApiError::ParentNotFound(id),
            GenerationError::Selection(selection) => selection.into(),
            GenerationError::Llm(llm) => llm.into(),
            GenerationError::Database(e) => ApiError::Internal(e.to_string()),
            GenerationError::State(e) => ApiError::Internal(e.to_string()),
            GenerationError::Serialization(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        match &err {
            SelectionError::InsufficientInput => ApiError::InsufficientInput(err.to_string()),
            SelectionError::RuleNotFound { .. } => ApiError::RuleNotFound(err.to_string()),
            SelectionError::CodeInactive(_) => ApiError::CodeInactive(err.to_string()),
            SelectionError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::CallFailed(reason) => ApiError::LlmCallFailed(reason),
            LlmError::Timeout(secs) => ApiError::LlmTimeout(secs),
        }
    }
}

impl From<ConfirmationError> for ApiError {
    fn from(err: ConfirmationError) -> Self {
        match err {
            ConfirmationError::GenerationNotFound(id) => ApiError::GenerationNotFound(id),
            ConfirmationError::GenerationNotSuccessful(id) => {
                ApiError::GenerationNotSuccessful(id)
            }
            ConfirmationError::AlreadyConfirmed { confirmed_at, .. } => {
                ApiError::AlreadyConfirmed(confirmed_at)
            }
            ConfirmationError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}
