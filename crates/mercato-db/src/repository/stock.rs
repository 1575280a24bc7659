//! # Stock Ledger
//!
//! Manual stock mutations and the append-only `stock_movements` log.
//!
//! ## Movement Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  operation      stock change                 movement row               │
//! │  ─────────────  ───────────────────────────  ─────────────────────────  │
//! │  add_stock      stock + qty                  in,  quantity = qty       │
//! │  remove_stock   MAX(0, stock - qty)          out, quantity = qty       │
//! │                 (qty > stock is rejected)                               │
//! │  adjust_stock   stock = new                  adjustment,               │
//! │                                              quantity = |new - prev|   │
//! │                                                                         │
//! │  Each call is one unit of work: read, write, append, COMMIT, save.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sale and purchase engines append movements through
//! [`insert_movement`] inside their own units of work.

use chrono::Utc;
use mercato_core::validation::validate_stock_quantity;
use mercato_core::{CoreError, MovementType, ReferenceType, StockMovement, ValidationError};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::{DbError, DbResult};
use crate::ledger::{Ledger, UnitOfWork};

const DEFAULT_MOVEMENT_LIMIT: u32 = 100;

/// Filter for [`StockRepository::movements`].
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub movement_type: Option<MovementType>,
    /// Defaults to 100.
    pub limit: Option<u32>,
}

/// Name and on-hand quantity, read inside a unit of work.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct StockLevel {
    pub name: String,
    pub stock_quantity: i64,
}

/// A movement about to be appended.
pub(crate) struct NewMovement<'a> {
    pub product_id: &'a str,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: &'a str,
    pub reference_id: Option<&'a str>,
    pub reference_type: Option<ReferenceType>,
}

pub(crate) async fn read_stock(
    uow: &mut UnitOfWork,
    product_id: &str,
) -> DbResult<Option<StockLevel>> {
    uow.get_one(
        sqlx::query_as::<_, StockLevel>("SELECT name, stock_quantity FROM products WHERE id = ?1")
            .bind(product_id),
    )
    .await
}

pub(crate) async fn insert_movement(
    uow: &mut UnitOfWork,
    new: NewMovement<'_>,
) -> DbResult<StockMovement> {
    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: new.product_id.to_string(),
        movement_type: new.movement_type,
        quantity: new.quantity,
        previous_stock: new.previous_stock,
        new_stock: new.new_stock,
        reason: new.reason.to_string(),
        reference_id: new.reference_id.map(str::to_string),
        reference_type: new.reference_type,
        created_at: Utc::now(),
    };

    uow.execute_raw(
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, movement_type, quantity,
                previous_stock, new_stock, reason,
                reference_id, reference_type, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(&movement.reason)
        .bind(&movement.reference_id)
        .bind(movement.reference_type)
        .bind(movement.created_at),
    )
    .await?;

    Ok(movement)
}

/// Adds `delta` to a product's stock with an atomic column expression.
pub(crate) async fn shift_stock(uow: &mut UnitOfWork, product_id: &str, delta: i64) -> DbResult<()> {
    uow.execute_raw(
        sqlx::query(
            "UPDATE products SET stock_quantity = MAX(0, stock_quantity + ?1), updated_at = ?2 WHERE id = ?3",
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(product_id),
    )
    .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// The stock ledger.
#[derive(Debug, Clone)]
pub struct StockRepository {
    ledger: Ledger,
    audit: AuditLog,
}

impl StockRepository {
    pub fn new(ledger: Ledger, audit: AuditLog) -> Self {
        StockRepository { ledger, audit }
    }

    /// Receives `quantity` units into stock.
    ///
    /// ## Errors
    /// - `quantity <= 0` → validation error, nothing opened
    /// - Product missing → `NotFound`
    pub async fn add_stock(
        &self,
        product_id: &str,
        quantity: i64,
        reason: &str,
        reference_id: Option<&str>,
        reference_type: Option<ReferenceType>,
    ) -> DbResult<StockMovement> {
        validate_stock_quantity(quantity)?;
        debug!(product_id = %product_id, quantity, "Adding stock");

        let mut uow = self.ledger.begin().await?;
        let result: DbResult<StockMovement> = async {
            let level = read_stock(&mut uow, product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?;

            shift_stock(&mut uow, product_id, quantity).await?;

            insert_movement(
                &mut uow,
                NewMovement {
                    product_id,
                    movement_type: MovementType::In,
                    quantity,
                    previous_stock: level.stock_quantity,
                    new_stock: level.stock_quantity + quantity,
                    reason,
                    reference_id,
                    reference_type,
                },
            )
            .await
        }
        .await;
        let movement = uow.finish(result).await?;

        info!(product_id = %product_id, new_stock = movement.new_stock, "Stock added");
        self.record("stock_add", &movement);
        Ok(movement)
    }

    /// Takes `quantity` units out of stock. Never removes partially.
    ///
    /// ## Errors
    /// - Product missing → `NotFound`
    /// - `quantity` above the current stock → `InsufficientStock`
    pub async fn remove_stock(
        &self,
        product_id: &str,
        quantity: i64,
        reason: &str,
    ) -> DbResult<StockMovement> {
        validate_stock_quantity(quantity)?;
        debug!(product_id = %product_id, quantity, "Removing stock");

        let mut uow = self.ledger.begin().await?;
        let result: DbResult<StockMovement> = async {
            let level = read_stock(&mut uow, product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?;

            if quantity > level.stock_quantity {
                return Err(CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    product_name: level.name,
                    requested: quantity,
                    available: level.stock_quantity,
                }
                .into());
            }

            shift_stock(&mut uow, product_id, -quantity).await?;

            insert_movement(
                &mut uow,
                NewMovement {
                    product_id,
                    movement_type: MovementType::Out,
                    quantity,
                    previous_stock: level.stock_quantity,
                    new_stock: level.stock_quantity - quantity,
                    reason,
                    reference_id: None,
                    reference_type: Some(ReferenceType::Manual),
                },
            )
            .await
        }
        .await;
        let movement = uow.finish(result).await?;

        info!(product_id = %product_id, new_stock = movement.new_stock, "Stock removed");
        self.record("stock_remove", &movement);
        Ok(movement)
    }

    /// Sets stock to exactly `new_quantity` (stock count correction).
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        new_quantity: i64,
        reason: &str,
    ) -> DbResult<StockMovement> {
        if new_quantity < 0 {
            return Err(ValidationError::OutOfRange {
                field: "new_quantity".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        debug!(product_id = %product_id, new_quantity, "Adjusting stock");

        let mut uow = self.ledger.begin().await?;
        let result: DbResult<StockMovement> = async {
            let level = read_stock(&mut uow, product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?;

            uow.execute_raw(
                sqlx::query("UPDATE products SET stock_quantity = ?1, updated_at = ?2 WHERE id = ?3")
                    .bind(new_quantity)
                    .bind(Utc::now())
                    .bind(product_id),
            )
            .await?;

            insert_movement(
                &mut uow,
                NewMovement {
                    product_id,
                    movement_type: MovementType::Adjustment,
                    quantity: (new_quantity - level.stock_quantity).abs(),
                    previous_stock: level.stock_quantity,
                    new_stock: new_quantity,
                    reason,
                    reference_id: None,
                    reference_type: Some(ReferenceType::Manual),
                },
            )
            .await
        }
        .await;
        let movement = uow.finish(result).await?;

        info!(product_id = %product_id, new_stock = new_quantity, "Stock adjusted");
        self.record("stock_adjust", &movement);
        Ok(movement)
    }

    /// Newest movements first.
    pub async fn movements(&self, filter: &MovementFilter) -> DbResult<Vec<StockMovement>> {
        let limit = filter.limit.unwrap_or(DEFAULT_MOVEMENT_LIMIT);

        self.ledger
            .query(
                sqlx::query_as::<_, StockMovement>(
                    r#"
                    SELECT id, product_id, movement_type, quantity, previous_stock,
                           new_stock, reason, reference_id, reference_type, created_at
                    FROM stock_movements
                    WHERE (?1 IS NULL OR product_id = ?1)
                      AND (?2 IS NULL OR movement_type = ?2)
                    ORDER BY rowid DESC
                    LIMIT ?3
                    "#,
                )
                .bind(&filter.product_id)
                .bind(filter.movement_type)
                .bind(limit),
            )
            .await
    }

    pub async fn current_stock(&self, product_id: &str) -> DbResult<i64> {
        self.ledger
            .get_one(
                sqlx::query_as::<_, (i64,)>("SELECT stock_quantity FROM products WHERE id = ?1")
                    .bind(product_id),
            )
            .await?
            .map(|(stock,)| stock)
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }

    fn record(&self, action: &str, movement: &StockMovement) {
        self.audit.record(
            AuditEvent::new(action, "product", &movement.product_id)
                .details(&movement.reason)
                .old_value(&json!({ "stock_quantity": movement.previous_stock }))
                .new_value(&json!({ "stock_quantity": movement.new_stock })),
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing;

    #[tokio::test]
    async fn test_add_stock_appends_in_movement() {
        let db = testing::db().await;
        let product = testing::product(&db, "Widget", 1_000, 10).await;

        let movement = db
            .stock()
            .add_stock(&product.id, 5, "Restock", None, None)
            .await
            .unwrap();

        assert_eq!(movement.movement_type, MovementType::In);
        assert_eq!(movement.previous_stock, 10);
        assert_eq!(movement.new_stock, 15);
        assert_eq!(testing::stock_of(&db, &product.id).await, 15);
    }

    #[tokio::test]
    async fn test_add_stock_missing_product() {
        let db = testing::db().await;
        let err = db
            .stock()
            .add_stock("missing", 5, "Restock", None, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_add_stock_rejects_non_positive_quantity() {
        let db = testing::db().await;
        let product = testing::product(&db, "Widget", 1_000, 10).await;

        let err = db
            .stock()
            .add_stock(&product.id, 0, "Restock", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_remove_stock_rejects_more_than_on_hand() {
        let db = testing::db().await;
        let product = testing::product(&db, "Widget", 1_000, 3).await;

        let err = db
            .stock()
            .remove_stock(&product.id, 10, "Damaged")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Insufficient stock for \"Widget\": requested 10, available 3"
        );
        assert_eq!(testing::stock_of(&db, &product.id).await, 3);
        assert!(db
            .stock()
            .movements(&MovementFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_remove_stock_to_zero() {
        let db = testing::db().await;
        let product = testing::product(&db, "Widget", 1_000, 3).await;

        let movement = db
            .stock()
            .remove_stock(&product.id, 3, "Damaged")
            .await
            .unwrap();

        assert_eq!(movement.new_stock, 0);
        assert_eq!(movement.movement_type, MovementType::Out);
        assert_eq!(testing::stock_of(&db, &product.id).await, 0);
    }

    #[tokio::test]
    async fn test_adjust_records_absolute_delta() {
        let db = testing::db().await;
        let product = testing::product(&db, "Widget", 1_000, 10).await;

        let down = db
            .stock()
            .adjust_stock(&product.id, 4, "Count")
            .await
            .unwrap();
        assert_eq!(down.quantity, 6);
        assert_eq!(down.delta(), -6);

        let up = db
            .stock()
            .adjust_stock(&product.id, 12, "Count")
            .await
            .unwrap();
        assert_eq!(up.quantity, 8);
        assert_eq!(testing::stock_of(&db, &product.id).await, 12);
    }

    #[tokio::test]
    async fn test_each_operation_saves_once() {
        let db = testing::db().await;
        let product = testing::product(&db, "Widget", 1_000, 10).await;
        let before = db.ledger().save_requests();

        db.stock()
            .add_stock(&product.id, 1, "Restock", None, None)
            .await
            .unwrap();
        db.stock()
            .remove_stock(&product.id, 1, "Damaged")
            .await
            .unwrap();
        db.stock()
            .remove_stock(&product.id, 100, "Damaged")
            .await
            .unwrap_err();

        assert_eq!(db.ledger().save_requests(), before + 2);
    }

    #[tokio::test]
    async fn test_movements_filter_and_order() {
        let db = testing::db().await;
        let a = testing::product(&db, "A", 1_000, 10).await;
        let b = testing::product(&db, "B", 1_000, 10).await;
        let stock = db.stock();

        stock.add_stock(&a.id, 1, "first", None, None).await.unwrap();
        stock.remove_stock(&a.id, 2, "second").await.unwrap();
        stock.add_stock(&b.id, 3, "other", None, None).await.unwrap();

        let for_a = stock
            .movements(&MovementFilter {
                product_id: Some(a.id.clone()),
                ..MovementFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].reason, "second");

        let ins = stock
            .movements(&MovementFilter {
                movement_type: Some(MovementType::In),
                limit: Some(1),
                ..MovementFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(ins.len(), 1);
        assert_eq!(ins[0].product_id, b.id);
    }

    #[tokio::test]
    async fn test_audit_event_after_commit_only() {
        let db = testing::db().await;
        let product = testing::product(&db, "Widget", 1_000, 2).await;
        let (audit, mut events) = AuditLog::channel();
        let db = db.with_audit_log(audit);

        db.stock()
            .remove_stock(&product.id, 5, "Damaged")
            .await
            .unwrap_err();
        db.stock()
            .add_stock(&product.id, 5, "Restock", None, None)
            .await
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.action, "stock_add");
        assert_eq!(event.new_value, Some(json!({ "stock_quantity": 7 })));
        assert!(events.try_recv().is_err());
    }
}
