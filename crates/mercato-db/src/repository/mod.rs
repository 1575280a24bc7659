//! # Repository Module
//!
//! Ledgers, engines and repositories for Mercato POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UI store                                                               │
//! │       │  db.sales().create_from_cart(&lines, &payment, user, session)  │
//! │       ▼                                                                 │
//! │  SaleRepository { ledger, audit }   ← an instance, not a namespace     │
//! │       │                                                                 │
//! │       ├── validation (mercato-core), before BEGIN                      │
//! │       ├── UnitOfWork: sale row, items, stock, movements, debt          │
//! │       ├── COMMIT → one save request                                    │
//! │       └── AuditLog::record (after commit only)                         │
//! │                                                                         │
//! │  Every repository is built from an injected Ledger and AuditLog,       │
//! │  so tests can swap either one.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`StockRepository`](stock::StockRepository) - Stock ledger (add, remove, adjust)
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and the debt ledger
//! - [`SaleRepository`](sale::SaleRepository) - Sale engine (checkout, refund, void)
//! - [`PurchaseRepository`](purchase::PurchaseRepository) - Purchase engine (create, receive)
//! - [`PromotionRepository`](promotion::PromotionRepository) - Promotions for the pricing engine
//! - [`ProductRepository`](product::ProductRepository) - Product catalog
//! - [`SupplierRepository`](supplier::SupplierRepository) - Suppliers

pub mod customer;
pub mod product;
pub mod promotion;
pub mod purchase;
pub mod sale;
pub mod stock;
pub mod supplier;

/// Shared fixtures for repository tests.
#[cfg(test)]
pub(crate) mod testing {
    use mercato_core::{Customer, NewCustomer, NewProduct, NewSupplier, Product, Supplier};

    use crate::pool::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory().audit_log(false))
            .await
            .unwrap()
    }

    pub async fn product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        db.products()
            .insert(&NewProduct {
                name: name.to_string(),
                cost_price_cents: price_cents / 2,
                selling_price_cents: price_cents,
                stock_quantity: stock,
                reorder_level: 5,
                ..NewProduct::default()
            })
            .await
            .unwrap()
    }

    pub async fn customer(db: &Database, name: &str) -> Customer {
        db.customers()
            .create(&NewCustomer {
                name: name.to_string(),
                ..NewCustomer::default()
            })
            .await
            .unwrap()
    }

    pub async fn supplier(db: &Database, name: &str) -> Supplier {
        db.suppliers()
            .create(&NewSupplier {
                name: name.to_string(),
                ..NewSupplier::default()
            })
            .await
            .unwrap()
    }

    pub async fn stock_of(db: &Database, product_id: &str) -> i64 {
        db.stock().current_stock(product_id).await.unwrap()
    }
}
