/// JWT authentication middleware
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use crypto_core::TokenType;

use crate::error::{AuthError, Result};
use crate::security::rate_limit::RateLimitScope;
use crate::services::Authenticated;
use crate::AppState;

/// Principal attached to requests that passed [`require_access_token`].
pub type AuthUser = Authenticated;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Guard for access-token protected routes.
///
/// Resolves the principal, applies the per-user rate limit and stores the
/// [`AuthUser`] in request extensions for the handler.
pub async fn require_access_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(req.headers())?.to_string();
    let principal = state.auth.authenticate(&token, TokenType::Access).await?;

    state
        .rate_limiter
        .check(
            RateLimitScope::User,
            &principal.user.id.to_string(),
            state.rate_limits.user_rule(),
        )
        .await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
