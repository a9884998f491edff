use chrono::{DateTime, Utc};
use fable_types::models::{StoryId, TurnLock, UserId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use crate::error::is_unique_violation;
use crate::models::{Actor, StoryPatch, StoryRow, UserRow};
use crate::{Database, Result, StoreError, turns};

const STORY_SELECT: &str = "SELECT s.id, s.author_id, u.nickname, s.title, s.content, s.image_url,
            s.like_count, s.is_finished, s.lock_holder_id, s.lock_acquired_at,
            s.created_at, s.updated_at
     FROM stories s
     LEFT JOIN users u ON u.id = s.author_id";

impl Database {
    // -- Users --

    pub fn create_user(&self, nickname: &str, password_hash: &str, now: DateTime<Utc>) -> Result<UserId> {
        self.with_tx(|tx| {
            match tx.execute(
                "INSERT INTO users (nickname, password, created_at) VALUES (?1, ?2, ?3)",
                params![nickname, password_hash, now],
            ) {
                Ok(_) => Ok(tx.last_insert_rowid()),
                // Lost a race with a concurrent signup for the same nickname
                Err(e) if is_unique_violation(&e) => Err(StoreError::NicknameTaken),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_nickname(&self, nickname: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "nickname = ?1", &nickname))
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    // -- Stories --

    pub fn create_story(
        &self,
        author_id: UserId,
        title: &str,
        content: &str,
        image_url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StoryId> {
        validate_text(title, "title must not be empty")?;
        validate_text(content, "content must not be empty")?;

        let story_id = self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO stories (author_id, title, content, image_url, like_count, is_finished, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)",
                params![author_id, title, content, image_url, now],
            )?;
            Ok(tx.last_insert_rowid())
        })?;

        info!(story_id, author_id, "Story created");
        Ok(story_id)
    }

    /// All stories, newest first.
    pub fn list_stories(&self) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{STORY_SELECT} ORDER BY s.created_at DESC, s.id DESC"))?;
            let rows = stmt
                .query_map([], story_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_story(&self, id: StoryId) -> Result<Option<StoryRow>> {
        self.with_conn(|conn| query_story(conn, id))
    }

    pub fn update_story(
        &self,
        id: StoryId,
        actor: Actor,
        patch: &StoryPatch,
        now: DateTime<Utc>,
    ) -> Result<StoryRow> {
        if let Some(title) = &patch.title {
            validate_text(title, "title must not be empty")?;
        }
        if let Some(content) = &patch.content {
            validate_text(content, "content must not be empty")?;
        }

        let updated = self.with_tx(|tx| {
            let story = query_story(tx, id)?.ok_or(StoreError::StoryNotFound)?;
            if !actor.may_moderate(&story) {
                return Err(StoreError::NotAuthor);
            }

            tx.execute(
                "UPDATE stories SET
                    title = COALESCE(?1, title),
                    content = COALESCE(?2, content),
                    image_url = COALESCE(?3, image_url),
                    is_finished = COALESCE(?4, is_finished),
                    updated_at = ?5
                 WHERE id = ?6",
                params![patch.title, patch.content, patch.image_url, patch.is_finished, now, id],
            )?;

            // A finished story takes no more relays, so nobody keeps the turn
            if patch.is_finished == Some(true) {
                turns::clear_lock(tx, id)?;
            }

            query_story(tx, id)?.ok_or(StoreError::StoryNotFound)
        })?;

        info!(story_id = id, actor = actor.user_id, "Story updated");
        Ok(updated)
    }

    pub fn delete_story(&self, id: StoryId, actor: Actor) -> Result<()> {
        self.with_tx(|tx| {
            let story = query_story(tx, id)?.ok_or(StoreError::StoryNotFound)?;
            if !actor.may_moderate(&story) {
                return Err(StoreError::NotAuthor);
            }
            tx.execute("DELETE FROM stories WHERE id = ?1", [id])?;
            Ok(())
        })?;

        info!(story_id = id, actor = actor.user_id, "Story deleted");
        Ok(())
    }
}

fn validate_text(value: &str, message: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(message));
    }
    Ok(())
}

fn query_user(conn: &Connection, predicate: &str, key: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, nickname, password, created_at FROM users WHERE {predicate}"
    ))?;

    let row = stmt
        .query_row([key], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                nickname: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_story(conn: &Connection, id: StoryId) -> Result<Option<StoryRow>> {
    let mut stmt = conn.prepare(&format!("{STORY_SELECT} WHERE s.id = ?1"))?;
    let row = stmt.query_row([id], story_from_row).optional()?;
    Ok(row)
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<StoryRow> {
    Ok(StoryRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_nickname: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "unknown".to_string()),
        title: row.get(3)?,
        content: row.get(4)?,
        image_url: row.get(5)?,
        like_count: row.get(6)?,
        is_finished: row.get(7)?,
        lock: turn_lock(row.get(8)?, row.get(9)?),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Lock time is stored as unix milliseconds so the sweep can compare it in SQL.
fn turn_lock(holder_id: Option<UserId>, acquired_ms: Option<i64>) -> Option<TurnLock> {
    let (holder_id, acquired_ms) = holder_id.zip(acquired_ms)?;
    let acquired_at = DateTime::from_timestamp_millis(acquired_ms)?;
    Some(TurnLock { holder_id, acquired_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, story, user};

    #[test]
    fn duplicate_nickname_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "alice");

        let err = db.create_user("alice", "hash", at(1)).unwrap_err();
        assert!(matches!(err, StoreError::NicknameTaken));
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn users_are_found_by_nickname_and_id() {
        let db = Database::open_in_memory().unwrap();
        let id = user(&db, "alice");

        let by_name = db.get_user_by_nickname("alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().nickname, "alice");
        assert!(db.get_user_by_nickname("bob").unwrap().is_none());
    }

    #[test]
    fn new_story_starts_unlocked_and_unliked() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "alice");
        let id = story(&db, author);

        let row = db.get_story(id).unwrap().unwrap();
        assert_eq!(row.author_nickname, "alice");
        assert_eq!(row.like_count, 0);
        assert!(!row.is_finished);
        assert!(row.lock.is_none());
        assert_eq!(row.created_at, at(0));
    }

    #[test]
    fn blank_title_is_invalid() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "alice");

        let err = db.create_story(author, "  ", "body", None, at(0)).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn stories_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "alice");
        let older = db.create_story(author, "One", "first", None, at(1)).unwrap();
        let newer = db.create_story(author, "Two", "second", Some("http://img"), at(2)).unwrap();

        let ids: Vec<_> = db.list_stories().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[test]
    fn only_author_or_admin_may_update() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "alice");
        let other = user(&db, "bobby");
        let id = story(&db, author);
        let patch = StoryPatch {
            title: Some("Renamed".into()),
            ..StoryPatch::default()
        };

        let err = db
            .update_story(id, Actor { user_id: other, is_admin: false }, &patch, at(5))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAuthor));

        let row = db
            .update_story(id, Actor { user_id: other, is_admin: true }, &patch, at(5))
            .unwrap();
        assert_eq!(row.title, "Renamed");
        assert_eq!(row.content, "A fox walked into town.");
        assert_eq!(row.updated_at, at(5));
    }

    #[test]
    fn finishing_a_story_releases_its_turn() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "alice");
        let writer = user(&db, "bobby");
        let id = story(&db, author);
        db.acquire_turn(id, writer, at(1)).unwrap();

        let patch = StoryPatch {
            is_finished: Some(true),
            ..StoryPatch::default()
        };
        let row = db
            .update_story(id, Actor { user_id: author, is_admin: false }, &patch, at(2))
            .unwrap();

        assert!(row.is_finished);
        assert!(row.lock.is_none());
    }

    #[test]
    fn deleting_a_story_cascades() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "alice");
        let id = story(&db, author);
        db.acquire_turn(id, author, at(1)).unwrap();
        db.append_relay(id, author, "And then it rained.", at(2)).unwrap();

        db.delete_story(id, Actor { user_id: author, is_admin: false }).unwrap();

        assert!(db.get_story(id).unwrap().is_none());
        assert!(db.list_relays(id).unwrap().is_empty());
        let err = db.delete_story(id, Actor { user_id: author, is_admin: false }).unwrap_err();
        assert!(matches!(err, StoreError::StoryNotFound));
    }
}
