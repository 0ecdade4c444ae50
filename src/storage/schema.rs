//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Price-Watch database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per (email, url) subscription; uniqueness is checked at admission
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL,
    url TEXT NOT NULL,
    price INTEGER NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_email ON subscriptions(email);
CREATE INDEX IF NOT EXISTS idx_subscriptions_url ON subscriptions(url);

-- At most one live confirmation per email
CREATE TABLE IF NOT EXISTS confirmations (
    email TEXT PRIMARY KEY,
    hash TEXT NOT NULL UNIQUE,
    deadline TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
