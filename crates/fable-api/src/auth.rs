use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use thiserror::Error;
use tracing::{error, info};

use fable_db::models::Actor;
use fable_db::{Database, StoreError};
use fable_types::api::{Claims, MessageResponse, SigninRequest, SignupRequest, TokenResponse};
use fable_types::models::UserId;

use crate::error::{ApiError, db_call};
use crate::extract::JsonBody;

/// Name of the cookie carrying `Bearer <jwt>`.
pub const AUTH_COOKIE: &str = "authorization";

/// Lifetime of both the JWT and its cookie.
pub const TOKEN_TTL_SECS: i64 = 60 * 60;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Nickname of the account allowed to moderate every story.
    pub admin_nickname: Option<String>,
}

impl AppStateInner {
    pub fn is_admin(&self, claims: &Claims) -> bool {
        self.admin_nickname.as_deref() == Some(claims.nickname.as_str())
    }

    pub fn actor(&self, claims: &Claims) -> Actor {
        Actor {
            user_id: claims.sub,
            is_admin: self.is_admin(claims),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignupError {
    #[error("nickname must be at least 3 letters or digits")]
    InvalidNickname,
    #[error("password must be at least 4 characters")]
    InvalidPassword,
    #[error("password must not contain the nickname")]
    PasswordContainsNickname,
}

impl From<SignupError> for ApiError {
    fn from(err: SignupError) -> Self {
        ApiError::new(StatusCode::PRECONDITION_FAILED, err.to_string())
    }
}

pub fn validate_signup(nickname: &str, password: &str) -> Result<(), SignupError> {
    if nickname.len() < 3 || !nickname.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SignupError::InvalidNickname);
    }
    if password.chars().count() < 4 {
        return Err(SignupError::InvalidPassword);
    }
    if password.contains(nickname) {
        return Err(SignupError::PasswordContainsNickname);
    }
    Ok(())
}

pub async fn signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_signup(&req.nickname, &req.password)?;

    // Check if nickname is taken
    let nickname = req.nickname.clone();
    if db_call(&state, move |db| db.get_user_by_nickname(&nickname))
        .await?
        .is_some()
    {
        return Err(StoreError::NicknameTaken.into());
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::internal()
        })?
        .to_string();

    let nickname = req.nickname;
    let user_id = db_call(&state, move |db| db.create_user(&nickname, &password_hash, Utc::now())).await?;
    info!(user_id, "User signed up");

    Ok((StatusCode::CREATED, Json(MessageResponse::new("signed up"))))
}

pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): JsonBody<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bad_credentials = || ApiError::new(StatusCode::UNAUTHORIZED, "check your nickname or password");

    let nickname = req.nickname.clone();
    let user = db_call(&state, move |db| db.get_user_by_nickname(&nickname))
        .await?
        .ok_or_else(bad_credentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!("Stored password hash for user {} is unreadable: {}", user.id, e);
        ApiError::internal()
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| bad_credentials())?;

    let token = create_token(&state.jwt_secret, user.id, &user.nickname).map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::internal()
    })?;

    let bearer = format!("Bearer {token}");
    let cookie = Cookie::build((AUTH_COOKIE, bearer.clone()))
        .max_age(time::Duration::seconds(TOKEN_TTL_SECS))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict);
    info!(user_id = user.id, "User signed in");

    Ok((
        jar.add(cookie),
        [(header::AUTHORIZATION, bearer)],
        Json(TokenResponse { token }),
    ))
}

pub fn create_token(secret: &str, user_id: UserId, nickname: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        nickname: nickname.to_string(),
        exp: (Utc::now() + chrono::Duration::seconds(TOKEN_TTL_SECS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
