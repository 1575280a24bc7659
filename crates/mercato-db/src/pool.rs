//! # Database Handle
//!
//! Opens the SQLite pool, applies migrations and hands out repositories.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  DbConfig::new(path)          pool size, debounce, audit, walk-in name │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await  pool, migrations, background tasks       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │  SqlitePool (1 connection by default)   │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── Ledger (query/get_one/execute/execute_raw/begin)             │
//! │       ├── SaveTrigger task (debounced WAL checkpoint)                  │
//! │       └── AuditLogWriter task (audit_logs inserts)                     │
//! │                                                                         │
//! │  db.stock() / db.sales() / ... hand out repository instances that      │
//! │  each hold a clone of the Ledger and the AuditLog.                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single Writer
//! The pool defaults to one connection. Every `BEGIN…COMMIT` block then runs
//! as an indivisible unit relative to every other block, which is what the
//! read-then-write sequences in the ledgers rely on.

use mercato_core::WALK_IN_CUSTOMER;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::audit::{AuditLog, AuditLogWriter};
use crate::error::{DbError, DbResult};
use crate::ledger::{Ledger, SaveTrigger};
use crate::migrations;
use crate::repository::customer::CustomerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::promotion::PromotionRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockRepository;
use crate::repository::supplier::SupplierRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/mercato.db")
///     .save_debounce(Duration::from_millis(500))
///     .audit_log(true);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 1 (all writes serialize on one connection)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps it forever.
    pub idle_timeout: Option<Duration>,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Delay between a save request and the WAL checkpoint.
    /// Default: 250 ms
    pub save_debounce: Duration,

    /// Whether to spawn the audit writer.
    /// Default: true
    pub audit_log: bool,

    /// Customer name stored on sales without one.
    /// Default: "Walk-in Customer"
    pub walk_in_customer_name: String,
}

impl DbConfig {
    /// Defaults for a store database at `path`. The file is created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
            save_debounce: Duration::from_millis(250),
            audit_log: true,
            walk_in_customer_name: WALK_IN_CUSTOMER.to_string(),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the save debounce window.
    pub fn save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce = debounce;
        self
    }

    /// Sets whether audit events are written to `audit_logs`.
    pub fn audit_log(mut self, enabled: bool) -> Self {
        self.audit_log = enabled;
        self
    }

    /// Sets the default customer name for sales.
    pub fn walk_in_customer_name(mut self, name: impl Into<String>) -> Self {
        self.walk_in_customer_name = name.into();
        self
    }

    /// A private in-memory database that lives as long as its single connection.
    ///
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1, // The database lives and dies with this connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
            save_debounce: Duration::ZERO,
            audit_log: true,
            walk_in_customer_name: WALK_IN_CUSTOMER.to_string(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
        };

        Ok(options
            // WAL: readers don't block the writer
            .journal_mode(SqliteJournalMode::Wal)
            // May lose the last transaction on power loss, never corrupts
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./mercato.db")).await?;
/// let sale = db.sales().create_from_cart(&lines, &payment, None, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    ledger: Ledger,
    audit: AuditLog,
    walk_in_customer_name: String,
}

impl Database {
    /// Opens the database.
    ///
    /// ## Steps
    /// 1. Connect with WAL, NORMAL synchronous and foreign keys on
    /// 2. Apply embedded migrations unless disabled
    /// 3. Start the save trigger (file databases only)
    /// 4. Start the audit writer when enabled
    ///
    /// Must be called from inside a tokio runtime.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening store database"
        );

        let connect_options = config.connect_options()?;
        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);

        if config.is_in_memory() {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        if config.run_migrations {
            migrations::run_migrations(&pool).await?;
        }

        let saves = if config.is_in_memory() {
            SaveTrigger::counting()
        } else {
            SaveTrigger::spawn(pool.clone(), config.save_debounce)
        };

        let audit = if config.audit_log {
            let (audit, writer) = AuditLogWriter::new(pool.clone());
            tokio::spawn(writer.run());
            audit
        } else {
            AuditLog::disabled()
        };

        Ok(Database {
            ledger: Ledger::new(pool, saves),
            audit,
            walk_in_customer_name: config.walk_in_customer_name,
        })
    }

    /// Replaces the audit sink, e.g. with [`AuditLog::channel`] in tests.
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(self.pool()).await
    }

    /// The raw pool. Writes should go through the repositories.
    pub fn pool(&self) -> &SqlitePool {
        self.ledger.pool()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.ledger.clone(), self.audit.clone())
    }

    /// Returns the stock ledger.
    pub fn stock(&self) -> StockRepository {
        StockRepository::new(self.ledger.clone(), self.audit.clone())
    }

    /// Returns the customer repository and debt ledger.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.ledger.clone(), self.audit.clone())
    }

    /// Returns the sale engine.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.ledger.clone(), self.audit.clone())
            .with_walk_in_name(&self.walk_in_customer_name)
    }

    /// Returns the purchase engine.
    pub fn purchases(&self) -> PurchaseRepository {
        PurchaseRepository::new(self.ledger.clone(), self.audit.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.ledger.clone(), self.audit.clone())
    }

    pub fn promotions(&self) -> PromotionRepository {
        PromotionRepository::new(self.ledger.clone(), self.audit.clone())
    }

    /// Closes the pool and stops the save trigger.
    ///
    /// Repositories handed out earlier fail from here on.
    pub async fn close(&self) {
        info!("Closing store database");
        self.ledger.save_trigger().stop();
        self.pool().close().await;
    }

    /// True when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(self.pool()).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
