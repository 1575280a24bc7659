//! # mercato-db: Transactional Layer for Mercato POS
//!
//! Every write that moves stock, money or customer debt goes through this
//! crate. It uses SQLite through sqlx, on a single connection.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercato POS Data Flow                            │
//! │                                                                         │
//! │  UI store (checkout, receiving, customer screen)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    mercato-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   Sale / Purchase engines   (sale.rs, purchase.rs)              │   │
//! │  │          │                                                      │   │
//! │  │          ▼                                                      │   │
//! │  │   Stock / Customer ledgers  (stock.rs, customer.rs)             │   │
//! │  │          │                                                      │   │
//! │  │          ▼                                                      │   │
//! │  │   Ledger + UnitOfWork       (ledger.rs)                         │   │
//! │  │          │          └──────► AuditLog ──► AuditLogWriter        │   │
//! │  └──────────┼──────────────────────────────────────────────────────┘   │
//! │             ▼                                                           │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite (WAL)   mercato.db                                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and the [`Database`] handle
//! - [`ledger`] - Query primitives, unit of work, debounced save
//! - [`audit`] - Post-commit audit events and their writer task
//! - [`config`] - `mercato.toml` loading
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ledgers, engines and repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mercato_db::{Database, PosConfig};
//! use mercato_core::{CartLine, PaymentDetails};
//!
//! let config = PosConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let payment = PaymentDetails::cash().with_tax_rate(config.tax_rate());
//! let sale = db.sales().create_from_cart(&lines, &payment, None, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEvent, AuditLog, AuditLogWriter};
pub use config::PosConfig;
pub use error::{DbError, DbResult};
pub use ledger::{Ledger, SaveTrigger, UnitOfWork};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::promotion::{PromotionFilter, PromotionRepository};
pub use repository::purchase::{PurchaseFilter, PurchaseRepository};
pub use repository::sale::{SaleFilter, SaleRepository};
pub use repository::stock::{MovementFilter, StockRepository};
pub use repository::supplier::SupplierRepository;
