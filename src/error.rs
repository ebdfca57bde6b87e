use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ApiResponse;

/// Everything a request can fail with. All variants funnel through one
/// boundary (`IntoResponse`) that produces the `{success: false, error}`
/// envelope; nothing is retried.
#[derive(Debug, Error)]
pub enum AppError {
    /// 400 — the message is the first violated validation rule.
    #[error("{0}")]
    BadRequest(String),

    /// 404 — the id matched no row.
    #[error("{0}")]
    NotFound(&'static str),

    /// 500 — the store is unreachable or a statement failed. The cause is
    /// logged, never sent to the client.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, what.to_string()),
            AppError::Database(err) => {
                tracing::error!(error = %err, "database failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_keeps_the_rule_message() {
        let response = AppError::BadRequest("title is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_error_maps_to_500() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
