use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};
use thiserror::Error;

use fable_types::api::Claims;

use crate::auth::{AUTH_COOKIE, AppState};
use crate::error::{ApiError, db_call};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("log in first")]
    Missing,
    #[error("malformed authorization credentials")]
    Malformed,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("account no longer exists")]
    UnknownUser,
}

/// Check a token's signature and expiry and return its claims.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

/// The bearer token from the `authorization` cookie, or failing that the
/// Authorization header.
fn bearer_token(jar: &CookieJar, headers: &HeaderMap) -> Result<String, AuthError> {
    let raw = match jar.get(AUTH_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Missing)?
            .to_string(),
    };

    // CookieJar has already percent-decoded cookie values
    let token = raw.strip_prefix("Bearer ").ok_or(AuthError::Malformed)?;
    if token.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(token.to_string())
}

/// Verify the caller's token and make sure the account still exists.
/// On success the [`Claims`] are available to handlers as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&jar, req.headers())?;
    let claims = verify_token(&state.jwt_secret, &token)?;

    let user_id = claims.sub;
    if db_call(&state, move |db| db.get_user_by_id(user_id)).await?.is_none() {
        return Err(AuthError::UnknownUser.into());
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_tokens_verify() {
        let token = create_token(SECRET, 12, "alice").unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, 12);
        assert_eq!(claims.nickname, "alice");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(SECRET, 12, "alice").unwrap();
        assert_eq!(verify_token("other", &token).unwrap_err(), AuthError::InvalidToken);
        assert_eq!(verify_token(SECRET, "garbage").unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn token_from_cookie_or_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("authorization=Bearer%20abc"));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(bearer_token(&jar, &headers).unwrap(), "abc");

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(bearer_token(&jar, &headers).unwrap(), "xyz");
    }

    #[test]
    fn missing_or_malformed_credentials() {
        let headers = HeaderMap::new();
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(bearer_token(&jar, &headers).unwrap_err(), AuthError::Missing);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(bearer_token(&jar, &headers).unwrap_err(), AuthError::Malformed);
    }
}
