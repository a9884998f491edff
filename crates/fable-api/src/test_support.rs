use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use fable_db::Database;
use fable_types::models::{StoryId, UserId};

use crate::auth::{AppState, AppStateInner, create_token};

pub const SECRET: &str = "test-secret";
pub const ADMIN: &str = "keeper";

pub fn state() -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.to_string(),
        admin_nickname: Some(ADMIN.to_string()),
    })
}

pub fn seed_user(state: &AppState, nickname: &str) -> UserId {
    state.db.create_user(nickname, "unused-hash", Utc::now()).unwrap()
}

pub fn seed_story(state: &AppState, author: UserId) -> StoryId {
    state
        .db
        .create_story(author, "The fox", "A fox walked into town.", None, Utc::now())
        .unwrap()
}

/// Cookie header value for a signed-in user.
pub fn cookie_for(user_id: UserId, nickname: &str) -> String {
    let token = create_token(SECRET, user_id, nickname).unwrap();
    format!("authorization=Bearer%20{token}")
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
