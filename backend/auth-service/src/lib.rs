// Auth Service Library

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod tasks;
pub mod telemetry;

use std::sync::Arc;

pub use error::{AuthError, Result};
pub use routes::build_router;

use config::RateLimitSettings;
use security::rate_limit::RateLimiter;
use services::AuthService;

/// Shared handles passed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub rate_limits: Arc<RateLimitSettings>,
    pub admin_email: Arc<str>,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        rate_limiter: Arc<RateLimiter>,
        rate_limits: RateLimitSettings,
        admin_email: &str,
    ) -> Self {
        Self {
            auth,
            rate_limiter,
            rate_limits: Arc::new(rate_limits),
            admin_email: Arc::from(admin_email),
        }
    }
}
