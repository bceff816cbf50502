//! Signed token codec shared by the task board services
//!
//! Mints and verifies compact JWS tokens (`header.payload.signature`) carrying
//! access or refresh claims. Only asymmetric algorithms are accepted, so any
//! service holding the public key alone can verify tokens without being able
//! to mint them.
//!
//! ## Security Design
//!
//! - **Asymmetric only**: HS* algorithms are refused at construction
//! - **Keys loaded once**: `from_key_files` reads both PEM files at startup
//! - **Clock-driven expiry**: `exp` is compared against the injected clock with
//!   zero leeway
//! - **No revocation here**: `parse` answers "is this token authentic and
//!   current"; the revocation store is consulted by the caller afterwards
//!
//! ## Usage
//!
//! ```rust,no_run
//! use crypto_core::{jwt::{TokenCodec, TokenTtlPolicy}, SystemClock};
//!
//! let codec = TokenCodec::from_key_files(
//!     "RS256",
//!     "certs/jwt-private.pem",
//!     "certs/jwt-public.pem",
//!     TokenTtlPolicy::default(),
//!     SystemClock::shared(),
//! )?;
//! let minted = codec.mint_refresh(42, Default::default())?;
//! let claims = codec.parse(&minted.token)?;
//! assert_eq!(claims.sub, "42");
//! # Ok::<(), crypto_core::jwt::TokenError>(())
//! ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::clock::SharedClock;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed or its signature is invalid: {0}")]
    Invalid(String),

    #[error("token has expired")]
    Expired,

    #[error("token lifetime must be at least one second")]
    NonPositiveTtl,

    #[error("signing key not configured; this codec can only verify tokens")]
    SigningKeyMissing,

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("failed to load key: {0}")]
    Key(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

// ============================================================================
// Token types and lifetime policy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much the issuing client is trusted; selects the refresh token lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    #[default]
    Web,
    Trusted,
    Mobile,
}

impl FromStr for TrustLevel {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(TrustLevel::Web),
            "trusted" => Ok(TrustLevel::Trusted),
            "mobile" => Ok(TrustLevel::Mobile),
            other => Err(TokenError::Invalid(format!("unknown client type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTtlPolicy {
    pub access: Duration,
    pub refresh_web: Duration,
    pub refresh_trusted: Duration,
    pub refresh_mobile: Duration,
}

impl Default for TokenTtlPolicy {
    fn default() -> Self {
        Self {
            access: Duration::minutes(15),
            refresh_web: Duration::days(7),
            refresh_trusted: Duration::days(30),
            refresh_mobile: Duration::days(90),
        }
    }
}

impl TokenTtlPolicy {
    pub fn refresh(&self, trust: TrustLevel) -> Duration {
        match trust {
            TrustLevel::Web => self.refresh_web,
            TrustLevel::Trusted => self.refresh_trusted,
            TrustLevel::Mobile => self.refresh_mobile,
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Public user attributes snapshotted into access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Type-dependent payload. Serialized inline with the `type` field as tag.
///
/// Refresh tokens carry nothing beyond the subject; profile data is re-read
/// from storage when a pair is rotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenKind {
    Access(AccessClaims),
    Refresh,
}

impl TokenKind {
    pub fn token_type(&self) -> TokenType {
        match self {
            TokenKind::Access(_) => TokenType::Access,
            TokenKind::Refresh => TokenType::Refresh,
        }
    }
}

/// JWT payload: registered claims plus the tagged token kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (numeric user ID as a string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token ID, the revocation key
    pub jti: String,
    #[serde(flatten)]
    pub kind: TokenKind,
}

impl Claims {
    pub fn token_type(&self) -> TokenType {
        self.kind.token_type()
    }

    pub fn subject_id(&self) -> Result<i64, TokenError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| TokenError::Invalid(format!("non-numeric subject {:?}", self.sub)))
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: MintedToken,
    pub refresh: MintedToken,
}

/// Token pair response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        let expires_in = pair.access.claims.exp - pair.access.claims.iat;
        Self {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: TokenTtlPolicy,
    clock: SharedClock,
}

impl TokenCodec {
    /// Build a codec that can both mint and verify.
    pub fn from_pem(
        algorithm: &str,
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        ttl: TokenTtlPolicy,
        clock: SharedClock,
    ) -> Result<Self, TokenError> {
        let algorithm = parse_algorithm(algorithm)?;
        let encoding_key = encoding_key_from_pem(algorithm, private_key_pem)?;
        let decoding_key = decoding_key_from_pem(algorithm, public_key_pem)?;
        Ok(Self::assemble(algorithm, Some(encoding_key), decoding_key, ttl, clock))
    }

    /// Build a codec for services that only validate tokens.
    pub fn verifier_only(
        algorithm: &str,
        public_key_pem: &[u8],
        clock: SharedClock,
    ) -> Result<Self, TokenError> {
        let algorithm = parse_algorithm(algorithm)?;
        let decoding_key = decoding_key_from_pem(algorithm, public_key_pem)?;
        Ok(Self::assemble(
            algorithm,
            None,
            decoding_key,
            TokenTtlPolicy::default(),
            clock,
        ))
    }

    /// Read both PEM files once and build a signing codec.
    pub fn from_key_files(
        algorithm: &str,
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
        ttl: TokenTtlPolicy,
        clock: SharedClock,
    ) -> Result<Self, TokenError> {
        let private_key_pem = read_key_file(private_key_path.as_ref())?;
        let public_key_pem = read_key_file(public_key_path.as_ref())?;
        Self::from_pem(algorithm, &private_key_pem, &public_key_pem, ttl, clock)
    }

    fn assemble(
        algorithm: Algorithm,
        encoding_key: Option<EncodingKey>,
        decoding_key: DecodingKey,
        ttl: TokenTtlPolicy,
        clock: SharedClock,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        // exp is checked in parse() against the injected clock
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            ttl,
            clock,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn can_sign(&self) -> bool {
        self.encoding_key.is_some()
    }

    /// Sign a new token for `subject` valid for `ttl` from now.
    pub fn mint(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<MintedToken, TokenError> {
        if ttl < Duration::seconds(1) {
            return Err(TokenError::NonPositiveTtl);
        }
        let encoding_key = self
            .encoding_key
            .as_ref()
            .ok_or(TokenError::SigningKeyMissing)?;

        let issued_at = self.clock.now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind,
        };

        let token = encode(&Header::new(self.algorithm), &claims, encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(MintedToken { token, claims })
    }

    pub fn mint_access(
        &self,
        user_id: i64,
        snapshot: AccessClaims,
    ) -> Result<MintedToken, TokenError> {
        self.mint(
            &user_id.to_string(),
            TokenKind::Access(snapshot),
            self.ttl.access,
        )
    }

    pub fn mint_refresh(&self, user_id: i64, trust: TrustLevel) -> Result<MintedToken, TokenError> {
        self.mint(
            &user_id.to_string(),
            TokenKind::Refresh,
            self.ttl.refresh(trust),
        )
    }

    pub fn mint_pair(
        &self,
        user_id: i64,
        snapshot: AccessClaims,
        trust: TrustLevel,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.mint_access(user_id, snapshot)?,
            refresh: self.mint_refresh(user_id, trust)?,
        })
    }

    /// Verify signature and temporal claims, returning the payload.
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token failed verification");
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;
        let claims = data.claims;

        if claims.exp <= claims.iat {
            return Err(TokenError::Invalid(
                "expiry does not follow issue time".to_string(),
            ));
        }
        if claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

// ============================================================================
// Key handling
// ============================================================================

fn parse_algorithm(name: &str) -> Result<Algorithm, TokenError> {
    let algorithm = Algorithm::from_str(name.trim())
        .map_err(|_| TokenError::UnsupportedAlgorithm(name.to_string()))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(TokenError::UnsupportedAlgorithm(name.to_string()))
        }
        other => Ok(other),
    }
}

fn encoding_key_from_pem(algorithm: Algorithm, pem: &[u8]) -> Result<EncodingKey, TokenError> {
    let key = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => EncodingKey::from_rsa_pem(pem),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(pem),
        other => return Err(TokenError::UnsupportedAlgorithm(format!("{other:?}"))),
    };
    key.map_err(|e| TokenError::Key(format!("private key: {e}")))
}

fn decoding_key_from_pem(algorithm: Algorithm, pem: &[u8]) -> Result<DecodingKey, TokenError> {
    let key = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
        other => return Err(TokenError::UnsupportedAlgorithm(format!("{other:?}"))),
    };
    key.map_err(|e| TokenError::Key(format!("public key: {e}")))
}

fn read_key_file(path: &Path) -> Result<Vec<u8>, TokenError> {
    std::fs::read(path).map_err(|e| TokenError::Key(format!("{}: {e}", path.display())))
}

// ============================================================================
// Tests
// ============================================================================
