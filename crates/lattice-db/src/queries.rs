use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

fn read_message_row(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        from_user_id: row.get(1)?,
        to_user_id: row.get(2)?,
        message_type: row.get(3)?,
        text: row.get(4)?,
        media_url: row.get(5)?,
        seen: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, from_user_id, to_user_id, message_type, text, media_url, seen, created_at";

impl Database {
    // -- Users --

    pub fn upsert_user(
        &self,
        id: &str,
        username: &str,
        full_name: &str,
        profile_picture: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, full_name, profile_picture)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    full_name = excluded.full_name,
                    profile_picture = excluded.profile_picture",
                rusqlite::params![id, username, full_name, profile_picture],
            )?;
            Ok(())
        })
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row("SELECT id FROM users WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, full_name, profile_picture, created_at
                     FROM users WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            full_name: row.get(2)?,
                            profile_picture: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
    }

    // -- Messages --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_message(
        &self,
        id: &str,
        from_user_id: &str,
        to_user_id: &str,
        message_type: &str,
        text: Option<&str>,
        media_url: Option<&str>,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, from_user_id, to_user_id, message_type, text, media_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, from_user_id, to_user_id, message_type, text, media_url, created_at],
            )?;
            Ok(())
        })
    }

    /// All messages between two users, in either direction.
    /// Deliberately unordered — chronological ordering is a client concern.
    pub fn messages_between(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (from_user_id = ?1 AND to_user_id = ?2)
                    OR (from_user_id = ?2 AND to_user_id = ?1)"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_a, user_b], read_message_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Read receipt: mark everything `from_user_id` sent to `to_user_id`
    /// as seen. Returns the number of rows updated.
    pub fn mark_seen(&self, from_user_id: &str, to_user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET seen = 1
                 WHERE from_user_id = ?1 AND to_user_id = ?2 AND seen = 0",
                [from_user_id, to_user_id],
            )?;
            Ok(updated)
        })
    }

    /// Latest messages addressed to `user_id`, newest first. Feeds the
    /// recent-messages sidebar.
    pub fn recent_for(&self, user_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE to_user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], read_message_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
