/// Data models for authentication
pub mod token_revocation;
pub mod user;

pub use token_revocation::RevocationEntry;
pub use user::{LoginRequest, User, UserProfile};
