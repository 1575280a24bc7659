//! # Ledger Primitives
//!
//! The four statement primitives every repository is built on, the unit of
//! work that scopes a transaction, and the debounced save trigger.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  repository op                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ledger.begin() ──► UnitOfWork (owns sqlx::Transaction)                │
//! │       │                 │                                               │
//! │       │                 ├── query / get_one / execute_raw  (no flush)  │
//! │       │                 │                                               │
//! │       │                 ├── finish(Ok)  → COMMIT  → trigger_save() x1  │
//! │       │                 ├── finish(Err) → ROLLBACK, error re-raised    │
//! │       │                 └── dropped     → ROLLBACK (early return/panic)│
//! │       ▼                                                                 │
//! │  SaveTrigger ──► Notify ──► debounce ──► PRAGMA wal_checkpoint         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let mut uow = ledger.begin().await?;
//! let result = apply_changes(&mut uow).await;
//! uow.finish(result).await?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteArguments, SqliteQueryResult, SqliteRow};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// A prepared statement with bound arguments.
pub type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A prepared statement that decodes rows into `T`.
pub type QueryAs<'q, T> = sqlx::query::QueryAs<'q, Sqlite, T, SqliteArguments<'q>>;

/// A prepared statement that decodes the first column into `T`.
pub type QueryScalar<'q, T> = sqlx::query::QueryScalar<'q, Sqlite, T, SqliteArguments<'q>>;

// =============================================================================
// Save Trigger
// =============================================================================

/// Best-effort, coalescing flush request.
///
/// Any number of `trigger()` calls inside one debounce window produce a
/// single WAL checkpoint. Flush failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct SaveTrigger {
    requested: Arc<AtomicU64>,
    notify: Option<Arc<Notify>>,
    stopped: Arc<AtomicBool>,
}

impl SaveTrigger {
    /// A trigger that only counts requests. Used for in-memory databases.
    pub fn counting() -> Self {
        SaveTrigger {
            requested: Arc::new(AtomicU64::new(0)),
            notify: None,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the flush task on the current tokio runtime.
    pub fn spawn(pool: SqlitePool, debounce: Duration) -> Self {
        let notify = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));

        let task_notify = Arc::clone(&notify);
        let task_stopped = Arc::clone(&stopped);
        tokio::spawn(async move {
            loop {
                task_notify.notified().await;
                if task_stopped.load(Ordering::Acquire) {
                    break;
                }

                tokio::time::sleep(debounce).await;

                match sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
                    .execute(&pool)
                    .await
                {
                    Ok(_) => debug!("Database flushed"),
                    Err(e) => warn!(error = %e, "Database flush failed"),
                }
            }
            debug!("Save trigger stopped");
        });

        SaveTrigger {
            requested: Arc::new(AtomicU64::new(0)),
            notify: Some(notify),
            stopped,
        }
    }

    /// Requests a flush. Never blocks, never fails.
    pub fn trigger(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
        if let Some(notify) = &self.notify {
            notify.notify_one();
        }
    }

    /// Total number of save requests so far.
    pub fn requests(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }

    /// Stops the flush task after any pending flush.
    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(notify) = &self.notify {
            notify.notify_one();
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Statement primitives over the shared pool.
///
/// Cloning is cheap; every repository holds its own clone.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
    saves: SaveTrigger,
}

impl Ledger {
    pub fn new(pool: SqlitePool, saves: SaveTrigger) -> Self {
        Ledger { pool, saves }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs a read and returns every row.
    pub async fn query<'q, T>(&self, query: QueryAs<'q, T>) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Runs a read and returns the first row, if any.
    pub async fn get_one<'q, T>(&self, query: QueryAs<'q, T>) -> DbResult<Option<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        Ok(query.fetch_optional(&self.pool).await?)
    }

    /// Runs a single-value read such as `COUNT(*)`.
    pub async fn scalar<'q, T>(&self, query: QueryScalar<'q, T>) -> DbResult<T>
    where
        T: Send + Unpin,
        (T,): for<'r> FromRow<'r, SqliteRow>,
    {
        Ok(query.fetch_one(&self.pool).await?)
    }

    /// Runs a standalone write and requests a save.
    pub async fn execute<'q>(&self, query: Query<'q>) -> DbResult<SqliteQueryResult> {
        let result = query.execute(&self.pool).await?;
        self.saves.trigger();
        Ok(result)
    }

    /// Runs a write without requesting a save.
    pub async fn execute_raw<'q>(&self, query: Query<'q>) -> DbResult<SqliteQueryResult> {
        Ok(query.execute(&self.pool).await?)
    }

    /// Opens a unit of work.
    pub async fn begin(&self) -> DbResult<UnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(UnitOfWork {
            tx,
            saves: self.saves.clone(),
        })
    }

    pub fn trigger_save(&self) {
        self.saves.trigger();
    }

    /// Number of save requests issued through this ledger's trigger.
    pub fn save_requests(&self) -> u64 {
        self.saves.requests()
    }

    pub(crate) fn save_trigger(&self) -> &SaveTrigger {
        &self.saves
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// One open transaction.
///
/// Dropping it without `commit` rolls the transaction back, so an early
/// return, a `?` or a panic between statements never leaves it open.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    saves: SaveTrigger,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork").finish_non_exhaustive()
    }
}

impl UnitOfWork {
    pub async fn query<'q, T>(&mut self, query: QueryAs<'q, T>) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    pub async fn get_one<'q, T>(&mut self, query: QueryAs<'q, T>) -> DbResult<Option<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        Ok(query.fetch_optional(&mut *self.tx).await?)
    }

    pub async fn scalar<'q, T>(&mut self, query: QueryScalar<'q, T>) -> DbResult<T>
    where
        T: Send + Unpin,
        (T,): for<'r> FromRow<'r, SqliteRow>,
    {
        Ok(query.fetch_one(&mut *self.tx).await?)
    }

    /// Runs a write inside the transaction. Saves wait for `commit`.
    pub async fn execute_raw<'q>(&mut self, query: Query<'q>) -> DbResult<SqliteQueryResult> {
        Ok(query.execute(&mut *self.tx).await?)
    }

    /// Commits and requests exactly one save.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        self.saves.trigger();
        debug!("Unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work rolled back");
        Ok(())
    }

    /// Commits on `Ok`, rolls back on `Err` and returns the original error.
    pub async fn finish<T>(self, result: DbResult<T>) -> DbResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "Rolling back unit of work");
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn ledger() -> Ledger {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger().clone();
        sqlx::query("CREATE TABLE scratch (n INTEGER NOT NULL)")
            .execute(ledger.pool())
            .await
            .unwrap();
        ledger
    }

    async fn count(ledger: &Ledger) -> i64 {
        ledger
            .scalar(sqlx::query_scalar("SELECT COUNT(*) FROM scratch"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_triggers_one_save() {
        let ledger = ledger().await;
        let before = ledger.save_requests();

        let mut uow = ledger.begin().await.unwrap();
        uow.execute_raw(sqlx::query("INSERT INTO scratch (n) VALUES (1)"))
            .await
            .unwrap();
        uow.execute_raw(sqlx::query("INSERT INTO scratch (n) VALUES (2)"))
            .await
            .unwrap();
        assert_eq!(ledger.save_requests(), before);

        uow.commit().await.unwrap();
        assert_eq!(ledger.save_requests(), before + 1);
        assert_eq!(count(&ledger).await, 2);
    }

    #[tokio::test]
    async fn test_finish_err_rolls_back_and_returns_error() {
        let ledger = ledger().await;
        let before = ledger.save_requests();

        let mut uow = ledger.begin().await.unwrap();
        uow.execute_raw(sqlx::query("INSERT INTO scratch (n) VALUES (1)"))
            .await
            .unwrap();

        let result: DbResult<()> = Err(DbError::not_found("Product", "p-1"));
        let err = uow.finish(result).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(count(&ledger).await, 0);
        assert_eq!(ledger.save_requests(), before);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let ledger = ledger().await;

        {
            let mut uow = ledger.begin().await.unwrap();
            uow.execute_raw(sqlx::query("INSERT INTO scratch (n) VALUES (1)"))
                .await
                .unwrap();
        }

        assert_eq!(count(&ledger).await, 0);
    }

    #[tokio::test]
    async fn test_execute_triggers_save() {
        let ledger = ledger().await;
        let before = ledger.save_requests();

        ledger
            .execute(sqlx::query("INSERT INTO scratch (n) VALUES (7)"))
            .await
            .unwrap();
        ledger
            .execute_raw(sqlx::query("INSERT INTO scratch (n) VALUES (8)"))
            .await
            .unwrap();

        assert_eq!(ledger.save_requests(), before + 1);
        assert_eq!(count(&ledger).await, 2);
    }
}
