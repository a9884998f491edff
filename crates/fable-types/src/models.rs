use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type StoryId = i64;
pub type RelayId = i64;

/// Direction of a reaction. A missing reaction row is the neutral state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn is_like(self) -> bool {
        matches!(self, Self::Like)
    }

    pub fn from_is_like(is_like: bool) -> Self {
        if is_like { Self::Like } else { Self::Dislike }
    }

    /// Contribution of one reaction with this polarity to a `likeCount`.
    pub fn weight(self) -> i64 {
        match self {
            Self::Like => 1,
            Self::Dislike => -1,
        }
    }
}

/// What a reaction points at: the story itself, or one of its relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Story(StoryId),
    Relay { story_id: StoryId, relay_id: RelayId },
}

impl ReactionTarget {
    pub fn story_id(self) -> StoryId {
        match self {
            Self::Story(id) => id,
            Self::Relay { story_id, .. } => story_id,
        }
    }

    pub fn relay_id(self) -> Option<RelayId> {
        match self {
            Self::Story(_) => None,
            Self::Relay { relay_id, .. } => Some(relay_id),
        }
    }
}

impl fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Story(id) => write!(f, "story {}", id),
            Self::Relay { story_id, relay_id } => write!(f, "relay {} of story {}", relay_id, story_id),
        }
    }
}

/// The exclusive right of one user to append the next relay to a story.
///
/// Holder and acquisition time only ever exist together, so a story carries
/// `Option<TurnLock>` rather than two independently nullable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnLock {
    pub holder_id: UserId,
    pub acquired_at: DateTime<Utc>,
}

impl TurnLock {
    pub fn is_held_by(&self, user_id: UserId) -> bool {
        self.holder_id == user_id
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.acquired_at + timeout <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polarity_weights() {
        assert_eq!(Polarity::Like.weight(), 1);
        assert_eq!(Polarity::Dislike.weight(), -1);
        assert_eq!(Polarity::from_is_like(false), Polarity::Dislike);
        assert!(Polarity::from_is_like(true).is_like());
    }

    #[test]
    fn lock_expiry_is_inclusive() {
        let acquired_at = DateTime::from_timestamp(1_000, 0).unwrap();
        let lock = TurnLock { holder_id: 7, acquired_at };
        let timeout = chrono::Duration::minutes(10);

        assert!(!lock.is_expired(acquired_at + chrono::Duration::seconds(599), timeout));
        assert!(lock.is_expired(acquired_at + timeout, timeout));
        assert!(lock.is_held_by(7));
        assert!(!lock.is_held_by(8));
    }

    #[test]
    fn polarity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Polarity::Dislike).unwrap(), "\"dislike\"");
    }
}
