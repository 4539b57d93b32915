//! HTTP mapping of the workflow error taxonomy.
//!
//! | WorkflowError | HTTP |
//! |---------------|------|
//! | Invalid       | 422  |
//! | Unauthorized  | 401  |
//! | Forbidden     | 403  |
//! | Conflict      | 409  |
//! | Ambiguous     | 502  |
//! | Backend       | 404 for not-found, else 502 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fb_client::SessionError;
use fb_workflow::{BackendError, RoleNotHeld, WorkflowError};

use crate::api_types::ErrorResponse;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                kind: kind.to_string(),
                current_status: None,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", error)
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", error)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        let current_status = e.current_status();
        let (status, kind) = match &e {
            WorkflowError::Invalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, "transition_invalid"),
            WorkflowError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            WorkflowError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            WorkflowError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            WorkflowError::Ambiguous { .. } => (StatusCode::BAD_GATEWAY, "outcome_unknown"),
            WorkflowError::Backend(BackendError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            WorkflowError::Backend(_) => (StatusCode::BAD_GATEWAY, "backend"),
        };
        let mut api = Self::new(status, kind, e.to_string());
        api.body.current_status = current_status;
        api
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        WorkflowError::from(e).into()
    }
}

impl From<RoleNotHeld> for ApiError {
    fn from(e: RoleNotHeld) -> Self {
        WorkflowError::from(e).into()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::unauthorized(format!("UNAUTHORIZED: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
