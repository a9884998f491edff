//! Like/dislike ledger.
//!
//! Each `(user, target)` pair is in one of three states: no row, a liked row,
//! or a disliked row. Every toggle goes through [`transition`], which is the
//! single definition of how a target's `like_count` moves.

use chrono::{DateTime, Utc};
use fable_types::models::{Polarity, ReactionTarget, UserId};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::queries::query_story;
use crate::relays::query_relay;
use crate::{Database, Result, StoreError};

/// Result of applying a requested polarity to the current reaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: Option<Polarity>,
    pub delta: i64,
}

/// Repeating the current polarity withdraws it; anything else switches to
/// the requested polarity. The counter moves by the difference in weight,
/// so a flip between like and dislike is worth two.
pub fn transition(current: Option<Polarity>, requested: Polarity) -> Transition {
    let next = if current == Some(requested) { None } else { Some(requested) };
    let delta = next.map_or(0, Polarity::weight) - current.map_or(0, Polarity::weight);
    Transition { next, delta }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionOutcome {
    pub reaction: Option<Polarity>,
    pub like_count: i64,
}

impl Database {
    pub fn toggle_reaction(
        &self,
        user_id: UserId,
        target: ReactionTarget,
        requested: Polarity,
        now: DateTime<Utc>,
    ) -> Result<ReactionOutcome> {
        if matches!(target, ReactionTarget::Story(_)) && requested == Polarity::Dislike {
            return Err(StoreError::UnsupportedReaction);
        }

        let outcome = self.with_tx(|tx| {
            ensure_target(tx, target)?;

            let existing = query_reaction(tx, user_id, target)?;
            let step = transition(existing.map(|(_, polarity)| polarity), requested);

            match (existing, step.next) {
                (None, Some(polarity)) => {
                    tx.execute(
                        "INSERT INTO reactions (user_id, story_id, relay_id, is_like, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        params![user_id, target.story_id(), target.relay_id(), polarity.is_like(), now],
                    )?;
                }
                (Some((id, _)), Some(polarity)) => {
                    tx.execute(
                        "UPDATE reactions SET is_like = ?1, updated_at = ?2 WHERE id = ?3",
                        params![polarity.is_like(), now, id],
                    )?;
                }
                (Some((id, _)), None) => {
                    tx.execute("DELETE FROM reactions WHERE id = ?1", [id])?;
                }
                (None, None) => {}
            }

            let like_count = apply_delta(tx, target, step.delta)?;
            Ok(ReactionOutcome {
                reaction: step.next,
                like_count,
            })
        })?;

        debug!(user_id, %target, reaction = ?outcome.reaction, like_count = outcome.like_count, "Reaction toggled");
        Ok(outcome)
    }

    /// The user's current reaction to `target`, if any.
    pub fn reaction_of(&self, user_id: UserId, target: ReactionTarget) -> Result<Option<Polarity>> {
        self.with_conn(|conn| Ok(query_reaction(conn, user_id, target)?.map(|(_, polarity)| polarity)))
    }

    /// Recompute every cached `like_count` from the reaction rows.
    /// Returns how many stories and relays had drifted.
    pub fn reconcile_like_counts(&self) -> Result<usize> {
        let corrected = self.with_tx(|tx| {
            let stories = tx.execute(
                &format!(
                    "UPDATE stories SET like_count = {net}
                     WHERE like_count <> {net}",
                    net = net_reactions("r.story_id = stories.id AND r.relay_id IS NULL"),
                ),
                [],
            )?;
            let relays = tx.execute(
                &format!(
                    "UPDATE relays SET like_count = {net}
                     WHERE like_count <> {net}",
                    net = net_reactions("r.relay_id = relays.id"),
                ),
                [],
            )?;
            Ok(stories + relays)
        })?;

        info!(corrected, "Like counts reconciled");
        Ok(corrected)
    }
}

fn net_reactions(filter: &str) -> String {
    format!(
        "(SELECT COALESCE(SUM(CASE WHEN r.is_like THEN 1 ELSE -1 END), 0) FROM reactions r WHERE {filter})"
    )
}

fn ensure_target(conn: &Connection, target: ReactionTarget) -> Result<()> {
    query_story(conn, target.story_id())?.ok_or(StoreError::StoryNotFound)?;
    if let ReactionTarget::Relay { story_id, relay_id } = target {
        query_relay(conn, story_id, relay_id)?.ok_or(StoreError::RelayNotFound)?;
    }
    Ok(())
}

fn query_reaction(conn: &Connection, user_id: UserId, target: ReactionTarget) -> Result<Option<(i64, Polarity)>> {
    // `IS` compares NULL relay ids as equal
    let row = conn
        .query_row(
            "SELECT id, is_like FROM reactions
             WHERE user_id = ?1 AND story_id = ?2 AND relay_id IS ?3",
            params![user_id, target.story_id(), target.relay_id()],
            |row| Ok((row.get::<_, i64>(0)?, Polarity::from_is_like(row.get(1)?))),
        )
        .optional()?;
    Ok(row)
}

fn apply_delta(conn: &Connection, target: ReactionTarget, delta: i64) -> Result<i64> {
    let like_count = match target {
        ReactionTarget::Story(story_id) => {
            conn.execute(
                "UPDATE stories SET like_count = like_count + ?1 WHERE id = ?2",
                [delta, story_id],
            )?;
            conn.query_row("SELECT like_count FROM stories WHERE id = ?1", [story_id], |row| row.get(0))?
        }
        ReactionTarget::Relay { relay_id, .. } => {
            conn.execute(
                "UPDATE relays SET like_count = like_count + ?1 WHERE id = ?2",
                [delta, relay_id],
            )?;
            conn.query_row("SELECT like_count FROM relays WHERE id = ?1", [relay_id], |row| row.get(0))?
        }
    };
    Ok(like_count)
}
