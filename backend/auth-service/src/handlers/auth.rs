/// Authentication handlers
use axum::{extract::State, http::HeaderMap, Extension, Json};
use chrono::{DateTime, Utc};
use crypto_core::{TokenResponse, TrustLevel};
use serde::Serialize;

use crate::{
    error::{AuthError, Result},
    middleware::{bearer_token, AuthUser},
    models::{LoginRequest, RevocationEntry, UserProfile},
    AppState,
};

pub const CLIENT_TYPE_HEADER: &str = "x-client-type";

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub logged_in_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BlacklistResponse {
    pub count: usize,
    pub entries: Vec<RevocationEntry>,
}

/// Trust level requested via `X-Client-Type`; unknown values fall back to web.
pub fn client_trust(headers: &HeaderMap) -> TrustLevel {
    headers
        .get(CLIENT_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let pair = state
        .auth
        .login(&payload.email, &payload.password, client_trust(&headers))
        .await?;

    Ok(Json(pair.into()))
}

/// Exchange a refresh token for a new pair. The presented token is spent.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>> {
    let token = bearer_token(&headers)?;
    let pair = state.auth.refresh(token, client_trust(&headers)).await?;

    Ok(Json(pair.into()))
}

/// Logout endpoint handler
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<LogoutResponse>> {
    let token = bearer_token(&headers)?;
    state.auth.logout(token).await?;

    Ok(Json(LogoutResponse {
        detail: "Successfully logged out".to_string(),
    }))
}

pub async fn check(Extension(principal): Extension<AuthUser>) -> Json<CheckResponse> {
    Json(CheckResponse {
        user: principal.user.profile(),
        logged_in_at: principal.claims.issued_at(),
    })
}

/// Admin-only view of the revocation store.
pub async fn blacklist(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthUser>,
) -> Result<Json<BlacklistResponse>> {
    if !principal.user.email.eq_ignore_ascii_case(&state.admin_email) {
        tracing::warn!(user_id = principal.user.id, "non-admin requested blacklist");
        return Err(AuthError::Forbidden);
    }

    let entries = state.auth.revocations().entries();
    Ok(Json(BlacklistResponse {
        count: entries.len(),
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_trust_from_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_trust(&headers), TrustLevel::Web);

        headers.insert(CLIENT_TYPE_HEADER, HeaderValue::from_static("Mobile"));
        assert_eq!(client_trust(&headers), TrustLevel::Mobile);

        headers.insert(CLIENT_TYPE_HEADER, HeaderValue::from_static("toaster"));
        assert_eq!(client_trust(&headers), TrustLevel::Web);
    }
}
