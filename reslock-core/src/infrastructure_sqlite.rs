//! SQLite-backed OrderedStore implementation.
//! Lock state survives process restarts until its deadlines pass.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! reslock-core = { path = "../reslock-core", features = ["sqlite"] }
//! ```

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::infrastructure::OrderedStore;
use crate::types::Timestamp;

/// A persistent ordered store backed by SQLite.
///
/// Each call runs in its own transaction behind a connection mutex, which
/// gives the per-call atomicity the registry relies on.
pub struct SqliteOrderedStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteOrderedStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent read performance
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn)
    }

    /// A private database that disappears with the store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sorted_members (
                collection  TEXT NOT NULL,
                member      TEXT NOT NULL,
                score       INTEGER NOT NULL,
                PRIMARY KEY (collection, member)
            );
            CREATE INDEX IF NOT EXISTS idx_sorted_members_score
                ON sorted_members(collection, score, member);

            CREATE TABLE IF NOT EXISTS collection_deadlines (
                collection  TEXT PRIMARY KEY,
                expires_at  INTEGER NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    /// The auto-removal deadline of a live collection, if one is set.
    pub fn deadline_of(&self, collection: &str) -> StoreResult<Option<Timestamp>> {
        self.in_transaction(collection, |tx| {
            let deadline: Option<i64> = tx
                .query_row(
                    "SELECT expires_at FROM collection_deadlines WHERE collection = ?1",
                    params![collection],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(deadline.map(from_sql))
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Runs `f` in a transaction after purging `collection` if its deadline
    /// has fired.
    fn in_transaction<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let now = to_sql(self.clock.now_ms());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let expired: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM collection_deadlines
                            WHERE collection = ?1 AND expires_at <= ?2)",
            params![collection, now],
            |row| row.get(0),
        )?;
        if expired {
            tx.execute(
                "DELETE FROM sorted_members WHERE collection = ?1",
                params![collection],
            )?;
            tx.execute(
                "DELETE FROM collection_deadlines WHERE collection = ?1",
                params![collection],
            )?;
        }

        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Drops the deadline of a collection that no longer has members.
fn forget_if_empty(tx: &Transaction<'_>, collection: &str) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM collection_deadlines WHERE collection = ?1
           AND NOT EXISTS (SELECT 1 FROM sorted_members WHERE collection = ?1)",
        params![collection],
    )?;
    Ok(())
}

// SQLite integers are signed; scores beyond i64::MAX saturate.
fn to_sql(score: Timestamp) -> i64 {
    i64::try_from(score).unwrap_or(i64::MAX)
}

fn from_sql(score: i64) -> Timestamp {
    u64::try_from(score).unwrap_or(0)
}

impl OrderedStore for SqliteOrderedStore {
    fn upsert(&self, collection: &str, member: &str, score: Timestamp) -> StoreResult<()> {
        self.in_transaction(collection, |tx| {
            tx.execute(
                "INSERT INTO sorted_members (collection, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, member) DO UPDATE SET score = excluded.score",
                params![collection, member, to_sql(score)],
            )?;
            Ok(())
        })
    }

    fn range_by_score(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<Vec<String>> {
        Ok(self
            .range_with_scores(collection, min, max)?
            .into_iter()
            .map(|(member, _)| member)
            .collect())
    }

    fn range_with_scores(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<Vec<(String, Timestamp)>> {
        self.in_transaction(collection, |tx| {
            let mut stmt = tx.prepare(
                "SELECT member, score FROM sorted_members
                 WHERE collection = ?1 AND score BETWEEN ?2 AND ?3
                 ORDER BY score, member",
            )?;
            let rows = stmt.query_map(params![collection, to_sql(min), to_sql(max)], |row| {
                Ok((row.get::<_, String>(0)?, from_sql(row.get::<_, i64>(1)?)))
            })?;
            rows.collect()
        })
    }

    fn remove(&self, collection: &str, member: &str) -> StoreResult<bool> {
        self.in_transaction(collection, |tx| {
            let rows = tx.execute(
                "DELETE FROM sorted_members WHERE collection = ?1 AND member = ?2",
                params![collection, member],
            )?;
            forget_if_empty(tx, collection)?;
            Ok(rows > 0)
        })
    }

    fn remove_range_by_score(
        &self,
        collection: &str,
        min: Timestamp,
        max: Timestamp,
    ) -> StoreResult<usize> {
        self.in_transaction(collection, |tx| {
            let rows = tx.execute(
                "DELETE FROM sorted_members
                 WHERE collection = ?1 AND score BETWEEN ?2 AND ?3",
                params![collection, to_sql(min), to_sql(max)],
            )?;
            forget_if_empty(tx, collection)?;
            Ok(rows)
        })
    }

    fn score_of(&self, collection: &str, member: &str) -> StoreResult<Option<Timestamp>> {
        self.in_transaction(collection, |tx| {
            let score: Option<i64> = tx
                .query_row(
                    "SELECT score FROM sorted_members WHERE collection = ?1 AND member = ?2",
                    params![collection, member],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(score.map(from_sql))
        })
    }

    fn set_expiration(&self, collection: &str, at: Timestamp) -> StoreResult<()> {
        self.in_transaction(collection, |tx| {
            tx.execute(
                "INSERT INTO collection_deadlines (collection, expires_at)
                 SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM sorted_members WHERE collection = ?1)
                 ON CONFLICT(collection) DO UPDATE SET expires_at = MAX(expires_at, excluded.expires_at)",
                params![collection, to_sql(at)],
            )?;
            Ok(())
        })
    }
}
