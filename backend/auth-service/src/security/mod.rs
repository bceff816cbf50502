/// Security module for authentication
/// Provides password hashing, token revocation and rate limiting
pub mod password;
pub mod rate_limit;
pub mod token_revocation;

pub use password::{hash_password, verify_password};
pub use rate_limit::{RateLimitDecision, RateLimitRule, RateLimitScope, RateLimiter};
pub use token_revocation::RevocationStore;
