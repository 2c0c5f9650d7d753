use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               TEXT PRIMARY KEY,
            username         TEXT NOT NULL,
            full_name        TEXT NOT NULL,
            profile_picture  TEXT,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            from_user_id  TEXT NOT NULL REFERENCES users(id),
            to_user_id    TEXT NOT NULL REFERENCES users(id),
            message_type  TEXT NOT NULL CHECK (message_type IN ('text', 'image')),
            text          TEXT,
            media_url     TEXT,
            seen          INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_from_to
            ON messages(from_user_id, to_user_id);

        CREATE INDEX IF NOT EXISTS idx_messages_to_created
            ON messages(to_user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
