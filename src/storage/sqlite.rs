//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of both store traits.
//! A single connection is shared behind a mutex, which serializes writes
//! coming from admission requests and rescan workers.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ConfirmationStore, StorageError, StorageResult, SubscriptionStore};
use crate::storage::{ConfirmationRecord, PricePollTask, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

/// Row counts reported by the CLI `--stats` mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub subscriptions: u64,
    pub verified_subscriptions: u64,
    pub tracked_urls: u64,
    pub pending_confirmations: u64,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` against the shared connection
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> StorageResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))?;
        Ok(f(&conn)?)
    }

    /// Collects row counts for reporting
    pub fn stats(&self) -> StorageResult<StorageStats> {
        self.with_conn(|conn| {
            let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));
            Ok(StorageStats {
                subscriptions: count("SELECT COUNT(*) FROM subscriptions")? as u64,
                verified_subscriptions: count(
                    "SELECT COUNT(*) FROM subscriptions WHERE verified = 1",
                )? as u64,
                tracked_urls: count(
                    "SELECT COUNT(DISTINCT url) FROM subscriptions WHERE verified = 1",
                )? as u64,
                pending_confirmations: count("SELECT COUNT(*) FROM confirmations")? as u64,
            })
        })
    }

    /// Gets the confirmation record of an email, if any
    pub fn confirmation_for(&self, email: &str) -> StorageResult<Option<ConfirmationRecord>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, hash, deadline FROM confirmations WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
        })?;
        row.map(record_from_row).transpose()
    }

    /// Gets every subscription of an email, verified or not
    pub fn subscriptions_of_email(&self, email: &str) -> StorageResult<Vec<Subscription>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT email, url, price, verified FROM subscriptions
                 WHERE email = ?1 ORDER BY id",
            )?;
            let subs = stmt
                .query_map(params![email], subscription_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(subs)
        })
    }
}

fn subscription_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        email: row.get(0)?,
        url: row.get(1)?,
        price: row.get(2)?,
        verified: row.get(3)?,
    })
}

fn record_from_row(
    (email, hash, deadline): (String, String, String),
) -> StorageResult<ConfirmationRecord> {
    let deadline = DateTime::parse_from_rfc3339(&deadline)
        .map_err(|e| StorageError::Serialization(format!("bad deadline '{}': {}", deadline, e)))?
        .with_timezone(&Utc);
    Ok(ConfirmationRecord {
        email,
        hash,
        deadline,
    })
}

#[async_trait]
impl SubscriptionStore for SqliteStorage {
    async fn save(&self, subscription: &Subscription) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subscriptions (email, url, price, verified, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    subscription.email,
                    subscription.url,
                    subscription.price,
                    subscription.verified,
                    now
                ],
            )
        })?;
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE subscriptions SET price = ?1, verified = ?2 WHERE email = ?3 AND url = ?4",
                params![
                    subscription.price,
                    subscription.verified,
                    subscription.email,
                    subscription.url
                ],
            )
        })?;
        Ok(())
    }

    async fn find_duplicate(&self, email: &str, url: &str) -> StorageResult<bool> {
        let found = self.with_conn(|conn| {
            conn.query_row(
                "SELECT 1 FROM subscriptions WHERE email = ?1 AND url = ?2 LIMIT 1",
                params![email, url],
                |_| Ok(()),
            )
            .optional()
        })?;
        Ok(found.is_some())
    }

    async fn is_verified(&self, email: &str) -> StorageResult<bool> {
        let found = self.with_conn(|conn| {
            conn.query_row(
                "SELECT 1 FROM subscriptions WHERE email = ?1 AND verified = 1 LIMIT 1",
                params![email],
                |_| Ok(()),
            )
            .optional()
        })?;
        Ok(found.is_some())
    }

    async fn stream_url_price_pairs(
        &self,
        sink: mpsc::Sender<PricePollTask>,
    ) -> StorageResult<usize> {
        // Snapshot first so the connection is not held while the queue is full
        let pairs = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT url, price FROM subscriptions WHERE verified = 1",
            )?;
            let pairs = stmt
                .query_map([], |row| {
                    Ok(PricePollTask {
                        url: row.get(0)?,
                        last_known_price: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(pairs)
        })?;

        let mut delivered = 0;
        for pair in pairs {
            if sink.send(pair).await.is_err() {
                tracing::debug!("Task queue closed after {} pairs", delivered);
                break;
            }
            delivered += 1;
        }
        Ok(delivered)
    }

    async fn subscribers_of(&self, url: &str) -> StorageResult<Vec<Subscription>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT email, url, price, verified FROM subscriptions
                 WHERE url = ?1 AND verified = 1 ORDER BY id",
            )?;
            let subs = stmt
                .query_map(params![url], subscription_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(subs)
        })
    }
}

#[async_trait]
impl ConfirmationStore for SqliteStorage {
    async fn insert(&self, record: &ConfirmationRecord) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO confirmations (email, hash, deadline) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET hash = excluded.hash, deadline = excluded.deadline",
                params![record.email, record.hash, record.deadline.to_rfc3339()],
            )
        })?;
        Ok(())
    }

    async fn find_by_hash(&self, hash: &str) -> StorageResult<Option<ConfirmationRecord>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, hash, deadline FROM confirmations WHERE hash = ?1",
                params![hash],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
        })?;
        row.map(record_from_row).transpose()
    }

    async fn update_hash_and_deadline(
        &self,
        email: &str,
        hash: &str,
        deadline: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE confirmations SET hash = ?1, deadline = ?2 WHERE email = ?3",
                params![hash, deadline.to_rfc3339(), email],
            )
        })?;
        if changed == 0 {
            return Err(StorageError::ConstraintViolation(format!(
                "no confirmation record for {}",
                email
            )));
        }
        Ok(())
    }

    async fn delete_by_hash(&self, hash: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM confirmations WHERE hash = ?1", params![hash])
        })?;
        Ok(())
    }

    async fn mark_verified(&self, email: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE subscriptions SET verified = 1 WHERE email = ?1",
                params![email],
            )
        })?;
        Ok(())
    }
}
