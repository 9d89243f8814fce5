use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid email/password")]
    InvalidCredentials,

    #[error("{0}")]
    BadRequest(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Collapses an error into a 400 for endpoints whose clients only expect
    /// a bad-request envelope. Validation and uniqueness failures keep their
    /// message; everything else is logged and replaced by `fallback`.
    pub fn or_bad_request(self, fallback: &str) -> Self {
        match self {
            ApiError::Validation(message) | ApiError::Conflict(message) => {
                ApiError::BadRequest(message)
            }
            ApiError::BadRequest(message) => ApiError::BadRequest(message),
            other => {
                tracing::warn!(error = %other, "Request failed, responding with generic bad request");
                ApiError::BadRequest(fallback.to_string())
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            ApiError::Database(ref err) => {
                if err.contains("timeout") {
                    tracing::warn!("PostgreSQL operation timeout: {}", err);
                } else {
                    tracing::error!("PostgreSQL database error: {}", err);
                }

                // Keep connection details out of the response body
                if err.contains("timeout") {
                    "Database operation timed out, please try again".to_string()
                } else if err.contains("unavailable") || err.contains("connection") {
                    "Database service is temporarily unavailable".to_string()
                } else {
                    "A database error occurred".to_string()
                }
            }
            ApiError::Validation(message) => {
                tracing::debug!("Validation error: {}", message);
                message
            }
            ApiError::NotFound(resource) => {
                tracing::debug!("Resource not found: {}", resource);
                format!("{} not found", resource)
            }
            ApiError::Conflict(message) => {
                tracing::debug!("Constraint conflict: {}", message);
                message
            }
            ApiError::Unauthorized(reason) => {
                tracing::debug!("Rejected unauthenticated request: {}", reason);
                reason
            }
            ApiError::InvalidCredentials => "Invalid email/password".to_string(),
            ApiError::BadRequest(message) => message,
            ApiError::Timeout => {
                tracing::warn!("Request exceeded the configured timeout");
                "Request timed out".to_string()
            }
            ApiError::Internal(ref err) => {
                tracing::error!("Internal server error: {:#}", err);
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message
        }));

        (status, body).into_response()
    }
}

// PostgreSQL error mapping
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        let constraint = err
            .as_db_error()
            .and_then(|db| db.constraint())
            .unwrap_or_default()
            .to_string();

        match err.code() {
            Some(&SqlState::UNIQUE_VIOLATION) => ApiError::Conflict(conflict_message(&constraint)),
            Some(&SqlState::FOREIGN_KEY_VIOLATION) => {
                ApiError::Validation("Referenced resource does not exist".to_string())
            }
            Some(&SqlState::NOT_NULL_VIOLATION) => {
                let column = err
                    .as_db_error()
                    .and_then(|db| db.column())
                    .map(|c| format!("Required field '{}' is missing", c))
                    .unwrap_or_else(|| "Required field is missing".to_string());
                ApiError::Validation(column)
            }
            Some(&SqlState::CHECK_VIOLATION) => {
                ApiError::Validation("Data validation constraint violated".to_string())
            }
            Some(&SqlState::INVALID_TEXT_REPRESENTATION) => {
                ApiError::Validation("Invalid data format provided".to_string())
            }
            Some(&SqlState::STRING_DATA_RIGHT_TRUNCATION) => {
                ApiError::Validation("Text data exceeds maximum length".to_string())
            }
            Some(&SqlState::CONNECTION_EXCEPTION)
            | Some(&SqlState::CONNECTION_DOES_NOT_EXIST)
            | Some(&SqlState::CONNECTION_FAILURE) => {
                tracing::error!("PostgreSQL connection error: {}", err);
                ApiError::Database("Database connection unavailable".to_string())
            }
            _ => {
                tracing::error!("Unhandled PostgreSQL error: {} (code: {:?})", err, err.code());
                ApiError::Database("Database operation failed".to_string())
            }
        }
    }
}

// Connection pool error mapping
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                tracing::warn!("Database connection pool timeout: {}", err);
                ApiError::Database("Database connection timeout".to_string())
            }
            deadpool_postgres::PoolError::Closed => {
                tracing::error!("Database connection pool is closed");
                ApiError::Database("Database service unavailable".to_string())
            }
            _ => {
                tracing::error!("Database connection pool error: {}", err);
                ApiError::Database("Database connection unavailable".to_string())
            }
        }
    }
}

/// Maps a unique constraint name from the schema to a client-facing message.
fn conflict_message(constraint: &str) -> String {
    match constraint {
        "users_email_key" => "Email address is already taken".to_string(),
        "users_username_key" => "Username is already taken".to_string(),
        _ => "Resource already exists".to_string(),
    }
}

// Result type alias for convenience
pub type ApiResult<T> = Result<T, ApiError>;
