use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fable_db::{Database, ErrorKind, StoreError};
use tracing::error;

use crate::auth::AppState;
use crate::middleware::AuthError;

/// Every handler failure, rendered as `{"errorMessage": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "an unexpected error occurred")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "errorMessage": self.message })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::PRECONDITION_FAILED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Storage => {
                error!("Storage failure: {}", err);
                return Self::internal();
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::PRECONDITION_FAILED, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => {
                Self::new(StatusCode::PRECONDITION_FAILED, e.body_text())
            }
            other => {
                error!("Path extraction failed: {}", other.body_text());
                Self::internal()
            }
        }
    }
}

/// Run a blocking database call off the async runtime.
pub async fn db_call<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> fable_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::EmptyContent, StatusCode::PRECONDITION_FAILED),
            (StoreError::StoryNotFound, StatusCode::NOT_FOUND),
            (StoreError::RelayNotFound, StatusCode::NOT_FOUND),
            (StoreError::NotLockHolder, StatusCode::FORBIDDEN),
            (StoreError::NotLastRelay, StatusCode::FORBIDDEN),
            (StoreError::LockHeldByOther, StatusCode::CONFLICT),
            (StoreError::Poisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = ApiError::from(StoreError::Poisoned);
        assert_eq!(err.message(), "an unexpected error occurred");
    }
}
