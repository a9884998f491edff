use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;

use fable_db::StoreError;
use fable_db::models::{StoryPatch, StoryRow};
use fable_types::api::{
    Claims, CreateStoryRequest, CreateStoryResponse, MessageResponse, StoryDetail, StoryDetailResponse,
    StoryListResponse, StorySummary, UpdateStoryRequest,
};
use fable_types::models::StoryId;

use crate::auth::AppState;
use crate::error::{ApiError, db_call};
use crate::extract::{JsonBody, PathParams};
use crate::relays::relay_view;

pub(crate) fn story_summary(row: StoryRow) -> StorySummary {
    StorySummary {
        story_id: row.id,
        author_id: row.author_id,
        nickname: row.author_nickname,
        title: row.title,
        content: row.content,
        image_url: row.image_url,
        is_finished: row.is_finished,
        like_count: row.like_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub async fn list_stories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = db_call(&state, |db| db.list_stories()).await?;
    Ok(Json(StoryListResponse {
        stories: rows.into_iter().map(story_summary).collect(),
    }))
}

/// Story with its relays in reading order and whoever is writing next.
pub async fn get_story(
    State(state): State<AppState>,
    WithRejection(Path(story_id), _): PathParams<StoryId>,
) -> Result<impl IntoResponse, ApiError> {
    let (story, relays) = db_call(&state, move |db| {
        let story = db.get_story(story_id)?.ok_or(StoreError::StoryNotFound)?;
        let relays = db.list_relays(story_id)?;
        Ok((story, relays))
    })
    .await?;

    let writing = story.lock;
    Ok(Json(StoryDetailResponse {
        story: StoryDetail {
            story: story_summary(story),
            writing,
            relays: relays.into_iter().map(relay_view).collect(),
        },
    }))
}

pub async fn create_story(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author_id = claims.sub;
    let story_id = db_call(&state, move |db| {
        db.create_story(author_id, &req.title, &req.content, req.image_url.as_deref(), Utc::now())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CreateStoryResponse { story_id })))
}

pub async fn update_story(
    State(state): State<AppState>,
    WithRejection(Path(story_id), _): PathParams<StoryId>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UpdateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = state.actor(&claims);
    let patch = StoryPatch {
        title: req.title,
        content: req.content,
        image_url: req.image_url,
        is_finished: req.is_finished,
    };

    db_call(&state, move |db| db.update_story(story_id, actor, &patch, Utc::now())).await?;
    Ok(Json(MessageResponse::new("story updated")))
}

pub async fn delete_story(
    State(state): State<AppState>,
    WithRejection(Path(story_id), _): PathParams<StoryId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = state.actor(&claims);
    db_call(&state, move |db| db.delete_story(story_id, actor)).await?;
    Ok(Json(MessageResponse::new("story deleted")))
}
