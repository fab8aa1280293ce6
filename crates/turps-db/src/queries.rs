use crate::models::{MessageRow, SessionRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, password, external_id, created_at";

impl Database {
    // -- Users --

    /// Inserts a local account. Fails with a unique violation (see
    /// [`crate::is_unique_violation`]) when the username is taken; there is no
    /// separate existence check.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            query_user_by_id(conn, id)?.ok_or_else(|| anyhow!("User vanished after insert: {}", id))
        })
    }

    /// Returns the user linked to `external_id`, creating it with `id` if none
    /// exists. The bool is true when a row was inserted.
    pub fn find_or_create_external_user(
        &self,
        id: &str,
        external_id: &str,
    ) -> Result<(UserRow, bool)> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, external_id) VALUES (?1, ?2)
                 ON CONFLICT(external_id) DO NOTHING",
                (id, external_id),
            )?;
            let user = query_user_by_external_id(conn, external_id)?
                .ok_or_else(|| anyhow!("No user for external id after upsert"))?;
            Ok((user, inserted == 1))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Deletes every user. Sessions go with them through the foreign key.
    pub fn delete_all_users(&self) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM users", [])?))
    }

    // -- Messages --

    pub fn insert_message(&self, author_name: &str, body: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (author_name, body) VALUES (?1, ?2)",
                (author_name, body),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// All messages, oldest first.
    pub fn get_messages(&self) -> Result<Vec<MessageRow>> {
        self.with_conn(query_messages)
    }

    pub fn delete_all_messages(&self) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM messages", [])?))
    }

    // -- Sessions --

    pub fn insert_session(&self, id: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (id, user_id, expires_at),
            )?;
            Ok(())
        })
    }

    /// Session plus its user, regardless of expiry. Callers compare
    /// `expires_at` themselves.
    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.expires_at,
                        u.id, u.username, u.password, u.external_id, u.created_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.id = ?1",
            )?;

            let row = stmt
                .query_row([id], |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        expires_at: row.get(1)?,
                        user: UserRow {
                            id: row.get(2)?,
                            username: row.get(3)?,
                            password: row.get(4)?,
                            external_id: row.get(5)?,
                            created_at: row.get(6)?,
                        },
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    /// Returns true if a row was removed.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])? > 0))
    }

    pub fn delete_expired_sessions(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?)
        })
    }

    // -- OAuth states --

    pub fn insert_oauth_state(&self, state: &str, pkce_verifier: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO oauth_states (state, pkce_verifier, expires_at) VALUES (?1, ?2, ?3)",
                (state, pkce_verifier, expires_at),
            )?;
            Ok(())
        })
    }

    /// Consumes a pending OAuth state, returning its PKCE verifier. A state
    /// can be taken once; expired states are never returned.
    pub fn take_oauth_state(&self, state: &str, now: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let verifier = conn
                .query_row(
                    "DELETE FROM oauth_states WHERE state = ?1 AND expires_at > ?2
                     RETURNING pkce_verifier",
                    (state, now),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(verifier)
        })
    }

    pub fn delete_expired_oauth_states(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM oauth_states WHERE expires_at <= ?1", [now])?)
        })
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        external_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"))?;
    Ok(stmt.query_row([username], map_user).optional()?)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    Ok(stmt.query_row([id], map_user).optional()?)
}

fn query_user_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = ?1"))?;
    Ok(stmt.query_row([external_id], map_user).optional()?)
}

fn query_messages(conn: &Connection) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, author_name, body, created_at FROM messages ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                author_name: row.get(1)?,
                body: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
