use axum::{
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use crypto_core::{TokenError, TokenType};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing or malformed Authorization header")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token type '{found}', expected '{expected}'")]
    WrongTokenType {
        expected: TokenType,
        found: TokenType,
    },

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Suspicious activity detected for this account")]
    SuspiciousActivity { until: DateTime<Utc> },

    #[error("Rate limit exceeded: {limit} requests per {window_secs} seconds")]
    RateLimitExceeded { limit: u32, window_secs: u64 },

    #[error("Principal referenced by token no longer exists")]
    PrincipalNotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::WrongTokenType { .. }
            | AuthError::TokenRevoked
            | AuthError::PrincipalNotFound => StatusCode::UNAUTHORIZED,
            AuthError::SuspiciousActivity { .. } | AuthError::RateLimitExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Never includes credentials or internals.
    fn public_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::MissingToken => "Missing bearer token".to_string(),
            AuthError::InvalidToken | AuthError::PrincipalNotFound => "Invalid token".to_string(),
            AuthError::WrongTokenType { expected, found } => {
                format!("Invalid token type '{found}', expected '{expected}'")
            }
            AuthError::TokenRevoked => {
                "Token has been revoked; use a newer token or log in again".to_string()
            }
            AuthError::SuspiciousActivity { until } => format!(
                "Temporarily blocked due to suspicious activity; log in again or wait until {}",
                until.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            AuthError::RateLimitExceeded { limit, window_secs } => format!(
                "Rate limit exceeded. {limit} requests per {window_secs} seconds"
            ),
            AuthError::Forbidden => "Forbidden".to_string(),
            AuthError::Database(_) | AuthError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AuthError::Database(detail) | AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
            }
            other => tracing::debug!(error = %other, status = status.as_u16(), "request rejected"),
        }

        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16()
        }));
        let mut response = (status, body).into_response();

        if let AuthError::RateLimitExceeded { limit, window_secs } = self {
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(limit),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(0u32),
            );
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(window_secs),
            );
        }

        response
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) | TokenError::Expired => AuthError::InvalidToken,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(err.to_string())
    }
}
