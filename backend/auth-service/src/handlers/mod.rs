/// HTTP request handlers (REST API)
pub mod auth;

pub use auth::{
    blacklist, check, client_trust, login, logout, refresh_token, BlacklistResponse,
    CheckResponse, LogoutResponse,
};

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
