use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{reactions, relays, stories};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route("/stories", get(stories::list_stories))
        .route("/stories/{story_id}", get(stories::get_story))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/stories", post(stories::create_story))
        .route("/stories/{story_id}", put(stories::update_story).delete(stories::delete_story))
        .route("/stories/{story_id}/isWriting", post(relays::start_writing))
        .route("/stories/{story_id}/relay/isWriting", post(relays::start_writing))
        .route("/stories/{story_id}/relay", post(relays::append_relay))
        .route(
            "/stories/{story_id}/relay/{relay_id}",
            get(relays::get_relay).put(relays::edit_relay).delete(relays::delete_relay),
        )
        .route("/stories/{story_id}/like", put(reactions::like_story))
        .route("/stories/{story_id}/relay/{relay_id}/like", put(reactions::like_relay))
        .route("/stories/{story_id}/relay/{relay_id}/dislike", put(reactions::dislike_relay))
        .route("/admin/like-counts/reconcile", post(reactions::reconcile_like_counts))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
