//! # Product Repository
//!
//! Catalog reads and inserts. Stock and cost are only changed by the
//! stock ledger and the sale and purchase engines.

use chrono::Utc;
use mercato_core::validation::validate_new_product;
use mercato_core::{NewProduct, Product};
use tracing::debug;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::DbResult;
use crate::ledger::Ledger;

const PRODUCT_COLUMNS: &str = "id, barcode, name, cost_price_cents, selling_price_cents, \
     stock_quantity, reorder_level, is_active, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let product = db.products().insert(&NewProduct {
///     name: "Coca-Cola 330ml".into(),
///     selling_price_cents: 150,
///     ..NewProduct::default()
/// }).await?;
///
/// let scanned = db.products().get_by_barcode("5449000000996").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    ledger: Ledger,
    audit: AuditLog,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(ledger: Ledger, audit: AuditLog) -> Self {
        ProductRepository { ledger, audit }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with generated fields
    /// * `Err(DbError::UniqueViolation)` - Barcode already exists
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        validate_new_product(new)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            barcode: new
                .barcode
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string),
            name: new.name.trim().to_string(),
            cost_price_cents: new.cost_price_cents,
            selling_price_cents: new.selling_price_cents,
            stock_quantity: new.stock_quantity,
            reorder_level: new.reorder_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        self.ledger
            .execute(
                sqlx::query(
                    r#"
                    INSERT INTO products (
                        id, barcode, name, cost_price_cents, selling_price_cents,
                        stock_quantity, reorder_level, is_active, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                )
                .bind(&product.id)
                .bind(&product.barcode)
                .bind(&product.name)
                .bind(product.cost_price_cents)
                .bind(product.selling_price_cents)
                .bind(product.stock_quantity)
                .bind(product.reorder_level)
                .bind(product.is_active)
                .bind(product.created_at)
                .bind(product.updated_at),
            )
            .await?;

        self.audit
            .record(AuditEvent::new("create", "product", &product.id).new_value(&product));
        Ok(product)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        self.ledger
            .get_one(sqlx::query_as::<_, Product>(&sql).bind(id))
            .await
    }

    /// Barcode scanner lookup.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE barcode = ?1", PRODUCT_COLUMNS);
        self.ledger
            .get_one(sqlx::query_as::<_, Product>(&sql).bind(barcode.trim()))
            .await
    }

    /// Active products sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name",
            PRODUCT_COLUMNS
        );
        self.ledger.query(sqlx::query_as::<_, Product>(&sql)).await
    }

    /// Active products at or below their reorder level, emptiest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            r#"
            SELECT {} FROM products
            WHERE is_active = 1 AND stock_quantity <= reorder_level
            ORDER BY stock_quantity, name
            "#,
            PRODUCT_COLUMNS
        );
        self.ledger.query(sqlx::query_as::<_, Product>(&sql)).await
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        self.ledger
            .scalar(sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1"))
            .await
    }
}
