use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id           TEXT PRIMARY KEY,
                username     TEXT UNIQUE,
                password     TEXT,
                external_id  TEXT UNIQUE,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (password IS NOT NULL OR external_id IS NOT NULL)
            );

            CREATE TABLE messages (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                author_name  TEXT NOT NULL,
                body         TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE sessions (
                id           TEXT PRIMARY KEY,
                user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                expires_at   TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_expiry ON sessions(expires_at);

            CREATE TABLE oauth_states (
                state          TEXT PRIMARY KEY,
                pkce_verifier  TEXT NOT NULL,
                expires_at     TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
