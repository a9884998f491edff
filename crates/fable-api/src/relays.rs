use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;

use fable_db::StoreError;
use fable_db::models::RelayRow;
use fable_db::turns::TurnGrant;
use fable_types::api::{
    AppendRelayResponse, Claims, MessageResponse, RelayContentRequest, RelayDetail, RelayDetailResponse, RelayView,
};
use fable_types::models::{ReactionTarget, RelayId, StoryId};

use crate::auth::AppState;
use crate::error::{ApiError, db_call};
use crate::extract::{JsonBody, PathParams};

pub(crate) fn relay_view(row: RelayRow) -> RelayView {
    RelayView {
        relay_id: row.id,
        story_id: row.story_id,
        author_id: row.author_id,
        nickname: row.author_nickname,
        content: row.content,
        like_count: row.like_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Claim the turn to write the next relay. Asking again while already
/// holding it succeeds without extending the turn.
pub async fn start_writing(
    State(state): State<AppState>,
    WithRejection(Path(story_id), _): PathParams<StoryId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let grant = db_call(&state, move |db| db.acquire_turn(story_id, user_id, Utc::now())).await?;

    let message = match grant {
        TurnGrant::Acquired => "started writing",
        TurnGrant::AlreadyHeld => "already writing",
    };
    Ok(Json(MessageResponse::new(message)))
}

pub async fn append_relay(
    State(state): State<AppState>,
    WithRejection(Path(story_id), _): PathParams<StoryId>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<RelayContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let content = req.into_content();
    let relay_id = db_call(&state, move |db| db.append_relay(story_id, user_id, &content, Utc::now())).await?;

    Ok((StatusCode::CREATED, Json(AppendRelayResponse { relay_id })))
}

/// A single relay with its author and the caller's own reaction to it.
pub async fn get_relay(
    State(state): State<AppState>,
    WithRejection(Path((story_id, relay_id)), _): PathParams<(StoryId, RelayId)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (row, my_reaction) = db_call(&state, move |db| {
        db.get_story(story_id)?.ok_or(StoreError::StoryNotFound)?;
        let row = db.get_relay(story_id, relay_id)?.ok_or(StoreError::RelayNotFound)?;
        let reaction = db.reaction_of(user_id, ReactionTarget::Relay { story_id, relay_id })?;
        Ok((row, reaction))
    })
    .await?;

    Ok(Json(RelayDetailResponse {
        relay: RelayDetail {
            relay: relay_view(row),
            my_reaction,
        },
    }))
}

pub async fn edit_relay(
    State(state): State<AppState>,
    WithRejection(Path((story_id, relay_id)), _): PathParams<(StoryId, RelayId)>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<RelayContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let content = req.into_content();
    db_call(&state, move |db| db.edit_relay(story_id, relay_id, user_id, &content, Utc::now())).await?;
    Ok(Json(MessageResponse::new("relay updated")))
}

pub async fn delete_relay(
    State(state): State<AppState>,
    WithRejection(Path((story_id, relay_id)), _): PathParams<(StoryId, RelayId)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    db_call(&state, move |db| db.delete_relay(story_id, relay_id, user_id)).await?;
    Ok(Json(MessageResponse::new("relay deleted")))
}
