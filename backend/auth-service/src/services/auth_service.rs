use crypto_core::{Claims, TokenCodec, TokenPair, TokenType, TrustLevel};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::UserRepository;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::User;
use crate::security::password::verify_credentials_blocking;
use crate::security::token_revocation::RevocationStore;

/// Principal resolved from a valid, unrevoked token.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub claims: Claims,
}

/// Issues, validates, rotates and revokes tokens.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    codec: Arc<TokenCodec>,
    revocations: Arc<RevocationStore>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        codec: Arc<TokenCodec>,
        revocations: Arc<RevocationStore>,
    ) -> Self {
        Self {
            users,
            codec,
            revocations,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn revocations(&self) -> &Arc<RevocationStore> {
        &self.revocations
    }

    /// Look up `email` and check `password` against its stored hash.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User> {
        let user = self.users.find_by_email(email).await?;
        let stored_hash = user.as_ref().map(|u| u.password.clone());

        verify_credentials_blocking(password.to_string(), stored_hash).await?;
        user.ok_or(AuthError::InvalidCredentials)
    }

    pub async fn login(&self, email: &str, password: &str, trust: TrustLevel) -> Result<TokenPair> {
        metrics::inc_login_requests();

        let user = match self.verify_credentials(email, password).await {
            Ok(user) => user,
            Err(err) => {
                if matches!(err, AuthError::InvalidCredentials) {
                    metrics::inc_login_failures();
                    warn!("login rejected: invalid credentials");
                }
                return Err(err);
            }
        };

        let pair = self.issue_token_pair(&user, trust)?;
        info!(user_id = user.id, jti = %pair.refresh.claims.jti, ?trust, "user logged in");
        Ok(pair)
    }

    pub fn issue_token_pair(&self, user: &User, trust: TrustLevel) -> Result<TokenPair> {
        Ok(self
            .codec
            .mint_pair(user.id, user.access_snapshot(), trust)?)
    }

    /// Validate `token` for an endpoint expecting `expected` tokens.
    ///
    /// Checks run in order: signature and expiry, token type, revocation,
    /// suspicious activity on the subject, then the subject must still exist.
    pub async fn authenticate(&self, token: &str, expected: TokenType) -> Result<Authenticated> {
        let claims = self.codec.parse(token)?;

        let found = claims.token_type();
        if found != expected {
            return Err(AuthError::WrongTokenType { expected, found });
        }

        if self.revocations.is_revoked(&claims.jti) {
            warn!(jti = %claims.jti, subject = %claims.sub, "revoked token presented");
            return Err(AuthError::TokenRevoked);
        }

        if let Some(until) = self.revocations.is_suspicious(&claims.sub) {
            warn!(subject = %claims.sub, %until, "subject restricted after repeated revocations");
            return Err(AuthError::SuspiciousActivity { until });
        }

        let user_id = claims.subject_id()?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        Ok(Authenticated { user, claims })
    }

    /// Rotate a refresh token: the presented token is revoked and a new pair
    /// minted. Of two concurrent rotations of one token, only one succeeds.
    pub async fn refresh(&self, token: &str, trust: TrustLevel) -> Result<TokenPair> {
        let Authenticated { user, claims } = self.authenticate(token, TokenType::Refresh).await?;

        if !self.revoke(&claims) {
            warn!(jti = %claims.jti, user_id = user.id, "refresh token reused concurrently");
            return Err(AuthError::TokenRevoked);
        }

        let pair = self.issue_token_pair(&user, trust)?;
        metrics::inc_token_refresh();
        info!(user_id = user.id, old_jti = %claims.jti, new_jti = %pair.refresh.claims.jti, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke the presented token, access or refresh.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let claims = self.codec.parse(token)?;

        if !self.revoke(&claims) {
            return Err(AuthError::TokenRevoked);
        }

        info!(subject = %claims.sub, jti = %claims.jti, token_type = %claims.token_type(), "token revoked on logout");
        Ok(())
    }

    fn revoke(&self, claims: &Claims) -> bool {
        let newly_revoked = self
            .revocations
            .revoke(&claims.jti, claims.expires_at(), &claims.sub);
        if newly_revoked {
            metrics::inc_tokens_revoked();
            metrics::set_revoked_tokens_active(self.revocations.len());
        }
        newly_revoked
    }
}
