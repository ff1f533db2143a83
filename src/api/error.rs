use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::ApiResponse;
use crate::error::Error;

/// Adapter from the domain taxonomy to HTTP. The adapter only translates;
/// the distinguishable messages come from the domain errors themselves.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Ambiguous(_) | Error::IntegrityViolation(_) => StatusCode::CONFLICT,
            Error::Unauthorized(_) | Error::Blocked(_) => StatusCode::FORBIDDEN,
            Error::ParseFailure(_) => StatusCode::BAD_REQUEST,
            Error::ExternalProcess(_) => StatusCode::BAD_GATEWAY,
            Error::Database(msg) | Error::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self.0 {
            // Do not leak store/internal details to callers.
            Error::Database(_) => "a database error occurred".to_string(),
            Error::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        };

        let body = ApiResponse::<()>::error(message);
        (status, Json(body)).into_response()
    }
}

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
