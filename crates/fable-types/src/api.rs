use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Polarity, RelayId, StoryId, TurnLock, UserId};

// -- JWT Claims --

/// JWT claims issued at signin and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub nickname: String,
    pub exp: usize,
}

// -- Accounts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigninRequest {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

// -- Stories --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateStoryRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryResponse {
    pub story_id: StoryId,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateStoryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    pub is_finished: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySummary {
    pub story_id: StoryId,
    pub author_id: UserId,
    pub nickname: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    pub is_finished: bool,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoryListResponse {
    pub stories: Vec<StorySummary>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDetail {
    #[serde(flatten)]
    pub story: StorySummary,
    pub writing: Option<TurnLock>,
    pub relays: Vec<RelayView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoryDetailResponse {
    pub story: StoryDetail,
}

// -- Relays --

/// `null` or a missing `content` reads as empty text.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayContentRequest {
    #[serde(default)]
    pub content: Option<String>,
}

impl RelayContentRequest {
    pub fn into_content(self) -> String {
        self.content.unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendRelayResponse {
    pub relay_id: RelayId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayView {
    pub relay_id: RelayId,
    pub story_id: StoryId,
    pub author_id: UserId,
    pub nickname: String,
    pub content: String,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayDetail {
    #[serde(flatten)]
    pub relay: RelayView,
    /// The caller's own reaction to this relay, if any.
    pub my_reaction: Option<Polarity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayDetailResponse {
    pub relay: RelayDetail,
}

// -- Reactions --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionResponse {
    /// State after the toggle; `None` means the reaction was withdrawn.
    pub reaction: Option<Polarity>,
    pub like_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub corrected: usize,
}
