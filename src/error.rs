use axum::{
    Json,
    extract::{
        FromRequest, Request,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::MessageResponse;

/// ValidationError
///
/// A required-field or range check failed. Shared by the server handlers and the
/// client page operations so both sides reject the same forms with the same text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// RepoError
///
/// Failures raised by the persistence layer. Constraint violations are mapped to
/// `Conflict` / `Invalid` by the Postgres implementation so handlers never inspect
/// driver error codes themselves.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A row with the same key already exists.
    #[error("{0}")]
    Conflict(String),
    /// The referenced row does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The write referenced rows that do not exist (foreign key violation).
    #[error("{0}")]
    Invalid(String),
    /// Any other driver failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// ApiError
///
/// The single error type returned by every handler. Its `IntoResponse` implementation
/// renders `{"message": "..."}` with the matching status code, which is the only error
/// shape the pages know how to display.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized: Login required")]
    Unauthorized,

    #[error("Invalid SSN or role not recognized")]
    InvalidCredentials,

    #[error("Forbidden: Insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.0)
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            RepoError::NotFound(msg) => ApiError::NotFound(msg),
            RepoError::Invalid(msg) => ApiError::Validation(msg),
            RepoError::Database(e) => {
                tracing::error!("repository failure: {:?}", e);
                ApiError::Database(e.to_string())
            }
        }
    }
}

/// Malformed bodies, wrong field types and a missing JSON content type all surface as
/// a 400 with the extractor's explanation.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// JsonBody
///
/// `Json<T>` whose rejection is an `ApiError`, so a body that fails to parse is answered
/// with the same `{"message": "..."}` shape as every other error.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "request failed: {}", self);
        } else {
            tracing::debug!(%status, "request rejected: {}", self);
        }

        let body = Json(MessageResponse {
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
