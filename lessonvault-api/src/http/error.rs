//! HTTP error mapping.
//!
//! Wraps [`lessonvault_core::Error`] the way the teacher's `AppError`
//! wraps its core error type: a status code plus a caller-facing
//! message, with the specific cause logged server-side only for
//! anything that must not leak (`synctv-api/src/http/error.rs`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// `Unauthorized` always becomes a generic `403`; the specific cause was
/// already logged by the authorization gate or credential service.
/// `MissingCredential` is the one exception spec §4.C carves out: it
/// gets its own distinct 403 body instead of the generic one.
impl From<lessonvault_core::Error> for AppError {
    fn from(err: lessonvault_core::Error) -> Self {
        use lessonvault_core::Error;

        match err {
            Error::BadRequest(msg) => Self::bad_request(msg),
            Error::Unauthorized(_) => Self::forbidden("forbidden"),
            Error::MissingCredential(_) => Self::forbidden("credential missing"),
            Error::NotFound(msg) => Self::not_found(msg),
            Error::TranscodeFailed(msg) => {
                tracing::error!(error = %msg, "transcode failed");
                Self::internal("internal error")
            }
            Error::CallbackFailed(msg) => {
                tracing::warn!(error = %msg, "callback delivery failed");
                Self::internal("internal error")
            }
            Error::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                Self::internal("internal error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonvault_core::Error;

    #[test]
    fn missing_credential_gets_a_distinct_body_from_other_unauthorized_errors() {
        let missing: AppError = Error::MissingCredential("no credential presented".to_string()).into();
        let generic: AppError = Error::Unauthorized("binding mismatch".to_string()).into();

        assert_eq!(missing.status, StatusCode::FORBIDDEN);
        assert_eq!(generic.status, StatusCode::FORBIDDEN);
        assert_ne!(missing.message, generic.message);
        assert_eq!(missing.message, "credential missing");
        assert_eq!(generic.message, "forbidden");
    }
}
