//! Configuration management for the auth service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. `.env` file (local development)
//!
//! # Example
//!
//! ```no_run
//! use auth_service::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use chrono::Duration;
use crypto_core::TokenTtlPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::security::rate_limit::{RateLimitRule, MAX_WINDOW_SECS};

/// Longest accepted access token lifetime: one year.
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 366 * 24 * 60;
/// Longest accepted refresh token lifetime: ten years.
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 3650;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    pub rate_limit: RateLimitSettings,
    pub revocation: RevocationSettings,
    pub admin: AdminSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            server: ServerSettings::from_env()?,
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            rate_limit: RateLimitSettings::from_env()?,
            revocation: RevocationSettings::from_env()?,
            admin: AdminSettings::from_env(),
        })
    }
}

/// Read `name`, falling back to `default` when unset, and parse it.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("SERVER_PORT", 8000)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
        })
    }
}

/// Redis backs the rate limiter when configured; otherwise counters stay in
/// process memory.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            timeout_ms: env_or("REDIS_TIMEOUT_MS", 100)?,
        })
    }
}

/// JWT signing settings
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_web_days: i64,
    pub refresh_token_expire_trusted_days: i64,
    pub refresh_token_expire_mobile_days: i64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            private_key_path: env_or("JWT_PRIVATE_KEY_PATH", "certs/jwt-private.pem".into())?,
            public_key_path: env_or("JWT_PUBLIC_KEY_PATH", "certs/jwt-public.pem".into())?,
            algorithm: env::var("JWT_ALGORITHM").unwrap_or_else(|_| "RS256".to_string()),
            access_token_expire_minutes: env_or("ACCESS_TOKEN_EXPIRE_MINUTES", 15)?,
            refresh_token_expire_web_days: env_or("REFRESH_TOKEN_EXPIRE_WEB_DAYS", 7)?,
            refresh_token_expire_trusted_days: env_or("REFRESH_TOKEN_EXPIRE_TRUSTED_DAYS", 30)?,
            refresh_token_expire_mobile_days: env_or("REFRESH_TOKEN_EXPIRE_MOBILE_DAYS", 90)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&self.access_token_expire_minutes) {
            anyhow::bail!(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {MAX_ACCESS_TOKEN_MINUTES}"
            );
        }

        let refresh_days = [
            self.refresh_token_expire_web_days,
            self.refresh_token_expire_trusted_days,
            self.refresh_token_expire_mobile_days,
        ];
        if refresh_days
            .iter()
            .any(|days| !(1..=MAX_REFRESH_TOKEN_DAYS).contains(days))
        {
            anyhow::bail!(
                "Refresh token lifetimes must be between 1 and {MAX_REFRESH_TOKEN_DAYS} days"
            );
        }

        Ok(())
    }

    pub fn ttl_policy(&self) -> TokenTtlPolicy {
        TokenTtlPolicy {
            access: Duration::minutes(self.access_token_expire_minutes),
            refresh_web: Duration::days(self.refresh_token_expire_web_days),
            refresh_trusted: Duration::days(self.refresh_token_expire_trusted_days),
            refresh_mobile: Duration::days(self.refresh_token_expire_mobile_days),
        }
    }
}

/// Request quotas per rate-limit scope
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub global_limit: u32,
    pub auth_limit: u32,
    pub user_limit: u32,
    pub window_seconds: u64,
    pub user_window_seconds: u64,
    /// Extra lifetime of an idle key beyond its window
    pub key_grace_seconds: u64,
    /// Key client limits on `X-Forwarded-For`. Only safe behind a proxy that
    /// overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            global_limit: 100,
            auth_limit: 10,
            user_limit: 1000,
            window_seconds: 60,
            user_window_seconds: 3600,
            key_grace_seconds: 10,
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitSettings {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            global_limit: env_or("RATE_LIMIT_GLOBAL", defaults.global_limit)?,
            auth_limit: env_or("RATE_LIMIT_AUTH", defaults.auth_limit)?,
            user_limit: env_or("RATE_LIMIT_USER", defaults.user_limit)?,
            window_seconds: env_or("RATE_LIMIT_WINDOW_SECONDS", defaults.window_seconds)?,
            user_window_seconds: env_or(
                "RATE_LIMIT_USER_WINDOW_SECONDS",
                defaults.user_window_seconds,
            )?,
            key_grace_seconds: env_or(
                "RATE_LIMIT_KEY_GRACE_SECONDS",
                defaults.key_grace_seconds,
            )?,
            trust_forwarded_for: env_or(
                "RATE_LIMIT_TRUST_FORWARDED_FOR",
                defaults.trust_forwarded_for,
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let windows = [self.window_seconds, self.user_window_seconds];
        if windows
            .iter()
            .any(|secs| !(1..=MAX_WINDOW_SECS).contains(secs))
        {
            anyhow::bail!("Rate limit windows must be between 1 and {MAX_WINDOW_SECS} seconds");
        }
        if self.key_grace_seconds > MAX_WINDOW_SECS {
            anyhow::bail!("RATE_LIMIT_KEY_GRACE_SECONDS must be at most {MAX_WINDOW_SECS}");
        }
        Ok(())
    }

    pub fn global_rule(&self) -> RateLimitRule {
        RateLimitRule::new(self.global_limit, self.window_seconds)
    }

    pub fn auth_rule(&self) -> RateLimitRule {
        RateLimitRule::new(self.auth_limit, self.window_seconds)
    }

    pub fn user_rule(&self) -> RateLimitRule {
        RateLimitRule::new(self.user_limit, self.user_window_seconds)
    }

    pub fn key_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.key_grace_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct RevocationSettings {
    /// Live revoked tokens a subject may accumulate before being restricted
    pub suspicion_threshold: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for RevocationSettings {
    fn default() -> Self {
        Self {
            suspicion_threshold: 7,
            cleanup_interval_secs: 15 * 60,
        }
    }
}

impl RevocationSettings {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            suspicion_threshold: env_or(
                "REVOCATION_SUSPICION_THRESHOLD",
                defaults.suspicion_threshold,
            )?,
            cleanup_interval_secs: env_or(
                "REVOCATION_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            )?,
        };

        if settings.cleanup_interval_secs == 0 {
            anyhow::bail!("REVOCATION_CLEANUP_INTERVAL_SECS must be at least 1");
        }

        Ok(settings)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone)]
pub struct AdminSettings {
    pub admin_email: String,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            admin_email: "admin@example.com".to_string(),
        }
    }
}

impl AdminSettings {
    fn from_env() -> Self {
        env::var("ADMIN_EMAIL")
            .ok()
            .filter(|email| !email.trim().is_empty())
            .map(|admin_email| Self { admin_email })
            .unwrap_or_default()
    }
}
