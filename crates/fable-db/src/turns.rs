//! Turn lock manager: who may append the next relay to a story.
//!
//! A story's lock lives in `stories.lock_holder_id` / `stories.lock_acquired_at`.
//! Granting is a compare-and-set on `lock_holder_id IS NULL`, so two racing
//! writers can never both be told they hold the turn.

use chrono::{DateTime, Utc};
use fable_types::models::{StoryId, UserId};
use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::models::StoryRow;
use crate::queries::query_story;
use crate::{Database, Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnGrant {
    /// The lock was free and now belongs to the caller.
    Acquired,
    /// The caller already held it; nothing changed.
    AlreadyHeld,
}

/// Whether `user_id` currently holds the writing turn on `story`.
pub fn is_held_by(story: &StoryRow, user_id: UserId) -> bool {
    story.lock.is_some_and(|lock| lock.is_held_by(user_id))
}

impl Database {
    pub fn acquire_turn(&self, story_id: StoryId, user_id: UserId, now: DateTime<Utc>) -> Result<TurnGrant> {
        let grant = self.with_tx(|tx| {
            let claimed = tx.execute(
                "UPDATE stories SET lock_holder_id = ?1, lock_acquired_at = ?2
                 WHERE id = ?3 AND is_finished = 0 AND lock_holder_id IS NULL",
                params![user_id, now.timestamp_millis(), story_id],
            )?;
            if claimed == 1 {
                return Ok(TurnGrant::Acquired);
            }

            // CAS missed: work out why
            let story = query_story(tx, story_id)?.ok_or(StoreError::StoryNotFound)?;
            if story.is_finished {
                return Err(StoreError::StoryFinished);
            }
            match story.lock {
                Some(lock) if lock.is_held_by(user_id) => Ok(TurnGrant::AlreadyHeld),
                Some(_) => Err(StoreError::LockHeldByOther),
                None => {
                    warn!(story_id, "Turn lock columns unreadable, refusing grant");
                    Err(StoreError::LockHeldByOther)
                }
            }
        })?;

        if grant == TurnGrant::Acquired {
            info!(story_id, user_id, "Turn lock granted");
        }
        Ok(grant)
    }

    /// Clear the lock unconditionally. Returns whether a lock was held.
    ///
    /// This is the standalone release for callers outside a transaction.
    /// Append and finishing a story release through [`clear_lock`] inside
    /// their own transaction instead.
    pub fn release_turn(&self, story_id: StoryId) -> Result<bool> {
        let released = self.with_tx(|tx| clear_lock(tx, story_id))? == 1;
        if released {
            info!(story_id, "Turn lock released");
        }
        Ok(released)
    }

    /// Release every lock acquired at or before `now - timeout`.
    /// Returns the ids of the stories that were unlocked.
    pub fn release_expired_turns(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> Result<Vec<StoryId>> {
        let cutoff = (now - timeout).timestamp_millis();

        self.with_tx(|tx| {
            let mut stmt = tx.prepare(
                "SELECT id FROM stories
                 WHERE lock_holder_id IS NOT NULL AND lock_acquired_at <= ?1
                 ORDER BY id",
            )?;
            let expired = stmt
                .query_map([cutoff], |row| row.get::<_, StoryId>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            tx.execute(
                "UPDATE stories SET lock_holder_id = NULL, lock_acquired_at = NULL
                 WHERE lock_holder_id IS NOT NULL AND lock_acquired_at <= ?1",
                [cutoff],
            )?;

            Ok(expired)
        })
    }
}

pub(crate) fn clear_lock(conn: &Connection, story_id: StoryId) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE stories SET lock_holder_id = NULL, lock_acquired_at = NULL
         WHERE id = ?1 AND lock_holder_id IS NOT NULL",
        [story_id],
    )?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, story, user};

    fn lock_columns(db: &Database, story_id: StoryId) -> (Option<i64>, Option<i64>) {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT lock_holder_id, lock_acquired_at FROM stories WHERE id = ?1",
                [story_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn second_writer_conflicts_and_holder_reacquires() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "alice");
        let u2 = user(&db, "bobby");
        let s = story(&db, u1);

        assert_eq!(db.acquire_turn(s, u1, at(10)).unwrap(), TurnGrant::Acquired);

        let err = db.acquire_turn(s, u2, at(11)).unwrap_err();
        assert!(matches!(err, StoreError::LockHeldByOther));
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);

        assert_eq!(db.acquire_turn(s, u1, at(12)).unwrap(), TurnGrant::AlreadyHeld);

        // Re-acquiring does not extend the turn
        let lock = db.get_story(s).unwrap().unwrap().lock.unwrap();
        assert_eq!(lock.holder_id, u1);
        assert_eq!(lock.acquired_at, at(10));
    }

    #[test]
    fn finished_and_missing_stories_cannot_be_locked() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "alice");
        let s = story(&db, u1);
        db.with_conn(|conn| Ok(conn.execute("UPDATE stories SET is_finished = 1 WHERE id = ?1", [s])?))
            .unwrap();

        assert!(matches!(db.acquire_turn(s, u1, at(1)), Err(StoreError::StoryFinished)));
        assert!(matches!(db.acquire_turn(s + 100, u1, at(1)), Err(StoreError::StoryNotFound)));
        assert_eq!(lock_columns(&db, s), (None, None));
    }

    #[test]
    fn lock_columns_move_together() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "alice");
        let s = story(&db, u1);
        assert_eq!(lock_columns(&db, s), (None, None));

        db.acquire_turn(s, u1, at(3)).unwrap();
        assert_eq!(lock_columns(&db, s), (Some(u1), Some(at(3).timestamp_millis())));

        assert!(db.release_turn(s).unwrap());
        assert_eq!(lock_columns(&db, s), (None, None));
        assert!(!db.release_turn(s).unwrap());
    }

    #[test]
    fn schema_rejects_half_set_lock() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "alice");
        let s = story(&db, u1);

        let result = db.with_conn(|conn| {
            Ok(conn.execute("UPDATE stories SET lock_holder_id = ?1 WHERE id = ?2", [u1, s])?)
        });
        assert!(result.is_err());
    }

    #[test]
    fn expired_turns_are_swept_and_fresh_ones_kept() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "alice");
        let u2 = user(&db, "bobby");
        let stale = story(&db, u1);
        let fresh = story(&db, u1);
        let timeout = chrono::Duration::minutes(10);

        db.acquire_turn(stale, u1, at(0)).unwrap();
        db.acquire_turn(fresh, u1, at(300)).unwrap();

        let released = db.release_expired_turns(at(600), timeout).unwrap();
        assert_eq!(released, vec![stale]);
        assert!(db.get_story(stale).unwrap().unwrap().lock.is_none());
        assert!(db.get_story(fresh).unwrap().unwrap().lock.is_some());

        // The freed story is open to the next writer
        assert_eq!(db.acquire_turn(stale, u2, at(601)).unwrap(), TurnGrant::Acquired);
    }

    #[test]
    fn racing_writers_on_separate_connections_get_one_turn() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let first = Database::open(&path).unwrap();
        let second = Database::open(&path).unwrap();
        let u1 = user(&first, "alice");
        let u2 = user(&first, "bobby");

        for round in 0..20 {
            let s = story(&first, u1);
            let barrier = Arc::new(Barrier::new(2));

            let outcomes = std::thread::scope(|scope| {
                let handles = [(&first, u1), (&second, u2)].map(|(db, user_id)| {
                    let barrier = Arc::clone(&barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        db.acquire_turn(s, user_id, at(round))
                    })
                });
                handles.map(|h| h.join().unwrap())
            });

            let granted = outcomes.iter().filter(|o| matches!(o, Ok(TurnGrant::Acquired))).count();
            let refused = outcomes.iter().filter(|o| matches!(o, Err(StoreError::LockHeldByOther))).count();
            assert_eq!((granted, refused), (1, 1), "round {round}: {outcomes:?}");

            let holder = first.get_story(s).unwrap().unwrap().lock.unwrap().holder_id;
            let winner = if matches!(outcomes[0], Ok(_)) { u1 } else { u2 };
            assert_eq!(holder, winner);
        }
    }

    #[test]
    fn holder_predicate() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "alice");
        let u2 = user(&db, "bobby");
        let s = story(&db, u1);

        db.acquire_turn(s, u2, at(1)).unwrap();
        let row = db.get_story(s).unwrap().unwrap();
        assert!(is_held_by(&row, u2));
        assert!(!is_held_by(&row, u1));
    }
}
