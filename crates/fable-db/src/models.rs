//! Database row types. These map directly to SQLite rows and stay
//! independent of the HTTP DTOs in fable-types.

use chrono::{DateTime, Utc};
use fable_types::models::{RelayId, StoryId, TurnLock, UserId};

pub struct UserRow {
    pub id: UserId,
    pub nickname: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoryRow {
    pub id: StoryId,
    pub author_id: UserId,
    pub author_nickname: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub is_finished: bool,
    pub lock: Option<TurnLock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RelayRow {
    pub id: RelayId,
    pub story_id: StoryId,
    pub author_id: UserId,
    pub author_nickname: String,
    pub content: String,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who is asking to change a story. Admins may moderate any story.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn may_moderate(&self, story: &StoryRow) -> bool {
        self.is_admin || story.author_id == self.user_id
    }
}

/// Fields an author or admin may change on a story. `None` leaves a field as is.
#[derive(Debug, Default, Clone)]
pub struct StoryPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub is_finished: Option<bool>,
}
