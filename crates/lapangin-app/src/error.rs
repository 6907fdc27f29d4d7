use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    DateConflict(String),

    #[error("{0}")]
    PastBooking(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ResourceNotFound(_) => "NotFound",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::InvalidInput(_) => "InvalidInput",
            ApiError::DateConflict(_) => "DateConflict",
            ApiError::PastBooking(_) => "PastBooking",
            ApiError::Unauthenticated(_) => "Unauthenticated",
            ApiError::Conflict(_) => "Conflict",
            ApiError::InternalError(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) | ApiError::PastBooking(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DateConflict(_) | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthenticated() -> Self {
        ApiError::Unauthenticated("Valid token is required".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::InternalError(details) => {
                error!("Internal error: {details}");
                "Internal server error".to_string()
            }
            other => {
                debug!("Request failed: {other}");
                other.to_string()
            }
        };
        let body = ErrorBody {
            kind: self.kind().to_string(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<lapangin_dal::Error> for ApiError {
    fn from(value: lapangin_dal::Error) -> Self {
        use lapangin_dal::Error;
        match value {
            Error::RecordNotFound(what) => ApiError::ResourceNotFound(what),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::InvalidInput(msg) => ApiError::InvalidInput(msg),
            e @ Error::DateConflict { .. } => ApiError::DateConflict(e.to_string()),
            e @ Error::PastBooking => ApiError::PastBooking(e.to_string()),
            Error::InvalidCredentials => {
                ApiError::Unauthenticated("Invalid e-mail or password".to_string())
            }
            Error::MissingVersion => ApiError::InvalidInput("Missing version".to_string()),
            e @ Error::FailedUpdate { .. } => ApiError::Conflict(e.to_string()),
            e => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<lapangin_auth::Error> for ApiError {
    fn from(value: lapangin_auth::Error) -> Self {
        ApiError::InternalError(value.to_string())
    }
}
