use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            nickname    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stories (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title             TEXT NOT NULL,
            content           TEXT NOT NULL,
            image_url         TEXT,
            like_count        INTEGER NOT NULL DEFAULT 0,
            is_finished       INTEGER NOT NULL DEFAULT 0,
            lock_holder_id    INTEGER,
            lock_acquired_at  INTEGER,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            CHECK ((lock_holder_id IS NULL) = (lock_acquired_at IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_stories_active_lock
            ON stories(lock_acquired_at) WHERE lock_holder_id IS NOT NULL;

        -- AUTOINCREMENT: relay ids are never reused, so id order is write order
        CREATE TABLE IF NOT EXISTS relays (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            story_id    INTEGER NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
            author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            like_count  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_relays_story
            ON relays(story_id, id);

        CREATE TABLE IF NOT EXISTS reactions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            story_id    INTEGER NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
            relay_id    INTEGER REFERENCES relays(id) ON DELETE CASCADE,
            is_like     INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        -- NULLs are distinct in a plain UNIQUE, so story-level and relay-level
        -- reactions each get their own partial index.
        CREATE UNIQUE INDEX IF NOT EXISTS uq_reactions_story
            ON reactions(user_id, story_id) WHERE relay_id IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS uq_reactions_relay
            ON reactions(user_id, relay_id) WHERE relay_id IS NOT NULL;
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
