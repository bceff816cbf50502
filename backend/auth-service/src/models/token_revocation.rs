/// Revoked token as exposed by the admin blacklist view
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevocationEntry {
    pub jti: String,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}
