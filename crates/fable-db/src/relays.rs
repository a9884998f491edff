//! Relay append engine and last-relay mutation guard.

use chrono::{DateTime, Utc};
use fable_types::models::{RelayId, StoryId, UserId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::models::RelayRow;
use crate::queries::query_story;
use crate::{Database, Result, StoreError, turns};

const RELAY_SELECT: &str = "SELECT r.id, r.story_id, r.author_id, u.nickname, r.content, r.like_count,
            r.created_at, r.updated_at
     FROM relays r
     LEFT JOIN users u ON u.id = r.author_id";

impl Database {
    /// Append the next relay. The caller must already hold the story's turn
    /// lock; the insert and the lock release commit together.
    pub fn append_relay(
        &self,
        story_id: StoryId,
        user_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<RelayId> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let relay_id = self.with_tx(|tx| {
            let story = query_story(tx, story_id)?.ok_or(StoreError::StoryNotFound)?;
            if story.is_finished {
                return Err(StoreError::StoryFinished);
            }
            if !turns::is_held_by(&story, user_id) {
                return Err(StoreError::NotLockHolder);
            }

            tx.execute(
                "INSERT INTO relays (story_id, author_id, content, like_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)",
                params![story_id, user_id, content, now],
            )?;
            let relay_id = tx.last_insert_rowid();

            turns::clear_lock(tx, story_id)?;
            Ok(relay_id)
        })?;

        info!(story_id, relay_id, user_id, "Relay appended, turn released");
        Ok(relay_id)
    }

    pub fn edit_relay(
        &self,
        story_id: StoryId,
        relay_id: RelayId,
        user_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        self.with_tx(|tx| {
            guard_last_relay(tx, story_id, relay_id, user_id)?;
            tx.execute(
                "UPDATE relays SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![content, now, relay_id],
            )?;
            Ok(())
        })?;

        info!(story_id, relay_id, user_id, "Relay edited");
        Ok(())
    }

    pub fn delete_relay(&self, story_id: StoryId, relay_id: RelayId, user_id: UserId) -> Result<()> {
        self.with_tx(|tx| {
            guard_last_relay(tx, story_id, relay_id, user_id)?;
            tx.execute("DELETE FROM relays WHERE id = ?1", [relay_id])?;
            Ok(())
        })?;

        info!(story_id, relay_id, user_id, "Relay deleted");
        Ok(())
    }

    /// A relay of `story_id`; relays of other stories are not found.
    pub fn get_relay(&self, story_id: StoryId, relay_id: RelayId) -> Result<Option<RelayRow>> {
        self.with_conn(|conn| query_relay(conn, story_id, relay_id))
    }

    /// All relays of a story in reading order.
    pub fn list_relays(&self, story_id: StoryId) -> Result<Vec<RelayRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{RELAY_SELECT} WHERE r.story_id = ?1 ORDER BY r.id"))?;
            let rows = stmt
                .query_map([story_id], relay_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Only the newest relay of an unfinished story may change, and only by its
/// author. Runs inside the caller's transaction so no append can slip in
/// between the check and the write.
fn guard_last_relay(conn: &Connection, story_id: StoryId, relay_id: RelayId, user_id: UserId) -> Result<()> {
    let story = query_story(conn, story_id)?.ok_or(StoreError::StoryNotFound)?;
    let relay = query_relay(conn, story_id, relay_id)?.ok_or(StoreError::RelayNotFound)?;

    if story.is_finished {
        return Err(StoreError::StoryFinished);
    }

    let last: Option<RelayId> = conn.query_row(
        "SELECT MAX(id) FROM relays WHERE story_id = ?1",
        [story_id],
        |row| row.get(0),
    )?;
    if last != Some(relay.id) {
        return Err(StoreError::NotLastRelay);
    }

    if relay.author_id != user_id {
        return Err(StoreError::NotAuthor);
    }
    Ok(())
}

pub(crate) fn query_relay(conn: &Connection, story_id: StoryId, relay_id: RelayId) -> Result<Option<RelayRow>> {
    let mut stmt = conn.prepare(&format!("{RELAY_SELECT} WHERE r.id = ?1 AND r.story_id = ?2"))?;
    let row = stmt.query_row([relay_id, story_id], relay_from_row).optional()?;
    Ok(row)
}

fn relay_from_row(row: &Row<'_>) -> rusqlite::Result<RelayRow> {
    Ok(RelayRow {
        id: row.get(0)?,
        story_id: row.get(1)?,
        author_id: row.get(2)?,
        author_nickname: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        like_count: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
