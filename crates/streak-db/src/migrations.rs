use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version > LATEST_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{} is newer than this build (v{})",
            version, LATEST_VERSION
        )));
    }

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE accounts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL UNIQUE,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                points      INTEGER NOT NULL DEFAULT 0,
                first_name  TEXT,
                last_name   TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_accounts_points ON accounts(points DESC, id);

            CREATE TABLE challenges (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL UNIQUE,
                points      INTEGER NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_challenges_points ON challenges(points);

            CREATE TABLE challenge_statuses (
                account_id   INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                challenge_id INTEGER NOT NULL REFERENCES challenges(id) ON DELETE CASCADE,
                state        TEXT NOT NULL DEFAULT 'accepted'
                             CHECK (state IN ('accepted', 'completed', 'failed')),
                accepted_at  TEXT NOT NULL DEFAULT (datetime('now')),
                resolved_at  TEXT,
                PRIMARY KEY (account_id, challenge_id)
            );

            CREATE TABLE friend_requests (
                sender_id   INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                receiver_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (sender_id, receiver_id),
                CHECK (sender_id != receiver_id)
            );

            CREATE INDEX idx_friend_requests_receiver ON friend_requests(receiver_id);

            CREATE TABLE friendships (
                account_id  INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                friend_id   INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (account_id, friend_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
