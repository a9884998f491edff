use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use tracing::info;

use fable_types::api::{Claims, ReactionResponse, ReconcileResponse};
use fable_types::models::{Polarity, ReactionTarget, RelayId, StoryId};

use crate::auth::AppState;
use crate::error::{ApiError, db_call};
use crate::extract::PathParams;

async fn toggle(
    state: &AppState,
    claims: &Claims,
    target: ReactionTarget,
    polarity: Polarity,
) -> Result<Json<ReactionResponse>, ApiError> {
    let user_id = claims.sub;
    let outcome = db_call(state, move |db| db.toggle_reaction(user_id, target, polarity, Utc::now())).await?;

    Ok(Json(ReactionResponse {
        reaction: outcome.reaction,
        like_count: outcome.like_count,
    }))
}

pub async fn like_story(
    State(state): State<AppState>,
    WithRejection(Path(story_id), _): PathParams<StoryId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(&state, &claims, ReactionTarget::Story(story_id), Polarity::Like).await
}

pub async fn like_relay(
    State(state): State<AppState>,
    WithRejection(Path((story_id, relay_id)), _): PathParams<(StoryId, RelayId)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(&state, &claims, ReactionTarget::Relay { story_id, relay_id }, Polarity::Like).await
}

pub async fn dislike_relay(
    State(state): State<AppState>,
    WithRejection(Path((story_id, relay_id)), _): PathParams<(StoryId, RelayId)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(&state, &claims, ReactionTarget::Relay { story_id, relay_id }, Polarity::Dislike).await
}

/// Admin-only repair: rebuild every cached like counter from reaction rows.
pub async fn reconcile_like_counts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.is_admin(&claims) {
        return Err(ApiError::forbidden("admin only"));
    }

    let corrected = db_call(&state, |db| db.reconcile_like_counts()).await?;
    info!(corrected, admin = %claims.nickname, "Like count reconciliation requested");
    Ok(Json(ReconcileResponse { corrected }))
}
