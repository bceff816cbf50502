//! Shared token and time primitives for the task board services.
//!
//! - `jwt`: asymmetric token codec (mint / parse) and lifetime policy
//! - `clock`: injectable time source used by every expiry comparison

pub mod clock;
pub mod jwt;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use jwt::{
    AccessClaims, Claims, MintedToken, TokenCodec, TokenError, TokenKind, TokenPair,
    TokenResponse, TokenTtlPolicy, TokenType, TrustLevel,
};
