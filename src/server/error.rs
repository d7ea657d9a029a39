use crate::error;
use crate::server::otp::OtpError;
use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error("{message}")]
    Internal {
        message: String,
        cause: anyhow::Error,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// Wraps a plumbing failure; `message` is what the client gets to see.
    pub fn internal(message: impl Into<String>, cause: anyhow::Error) -> Self {
        ApiError::Internal {
            message: message.into(),
            cause,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Otp(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal { message, cause } = &self {
            error!("{}: {:?}", message, cause);
        }
        (
            self.status(),
            Json(serde_json::json!({
                "detail": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        )
            .into_response()
    }
}

#[test]
fn test_status_mapping() {
    assert_eq!(
        ApiError::from(OtpError::Expired).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(ApiError::from(OtpError::Invalid).to_string(), "Invalid OTP");
    assert_eq!(
        ApiError::Conflict("Email already exists".into()).status(),
        StatusCode::CONFLICT
    );
    let internal = ApiError::internal("Failed to send OTP", anyhow::anyhow!("smtp down"));
    assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(internal.to_string(), "Failed to send OTP");
}
