//! # Purchase Repository
//!
//! Purchase orders and receiving.
//!
//! ## Receive Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receive(po_id)                                                         │
//! │     ├── PO missing or already received → return Ok, nothing opened     │
//! │     └── one unit of work, per line:                                     │
//! │           stock + qty, cost_price = unit_cost                          │
//! │           'in' movement referencing the PO                             │
//! │           received_quantity = quantity                                 │
//! │         then status = received, received_at = now                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use mercato_core::validation::validate_new_purchase_order;
use mercato_core::{
    Money, MovementType, NewPurchaseOrder, PurchaseOrder, PurchaseOrderItem, PurchaseStatus,
    ReferenceType,
};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::{DbError, DbResult};
use crate::ledger::{Ledger, UnitOfWork};
use crate::repository::stock::{insert_movement, read_stock, shift_stock, NewMovement};

const PO_COLUMNS: &str = "id, supplier_id, status, total_amount_cents, paid_amount_cents, \
     notes, order_date, received_at";

const ITEM_COLUMNS: &str = "id, purchase_order_id, product_id, quantity, unit_cost_cents, \
     total_cost_cents, received_quantity";

/// Filter for [`PurchaseRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct PurchaseFilter {
    pub status: Option<PurchaseStatus>,
    pub supplier_id: Option<String>,
}

/// Repository for purchase orders.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    ledger: Ledger,
    audit: AuditLog,
}

impl PurchaseRepository {
    pub fn new(ledger: Ledger, audit: AuditLog) -> Self {
        PurchaseRepository { ledger, audit }
    }

    /// Creates a purchase order and returns its id.
    ///
    /// The header total is summed from the lines; callers cannot set it.
    pub async fn create(&self, order: &NewPurchaseOrder) -> DbResult<String> {
        validate_new_purchase_order(order)?;

        let id = Uuid::new_v4().to_string();
        debug!(po_id = %id, supplier_id = %order.supplier_id, lines = order.items.len(), "Creating purchase order");

        let mut uow = self.ledger.begin().await?;
        let result = Self::write_order(&mut uow, &id, order).await;
        let total = uow.finish(result).await?;

        info!(po_id = %id, total = total.cents(), "Purchase order created");
        self.audit.record(
            AuditEvent::new("create", "purchase_order", &id).new_value(&json!({
                "supplier_id": order.supplier_id,
                "status": order.status,
                "total_amount_cents": total.cents(),
                "items": order.items.len(),
            })),
        );
        Ok(id)
    }

    async fn write_order(
        uow: &mut UnitOfWork,
        id: &str,
        order: &NewPurchaseOrder,
    ) -> DbResult<Money> {
        uow.execute_raw(
            sqlx::query(
                r#"
                INSERT INTO purchase_orders (
                    id, supplier_id, status, total_amount_cents, paid_amount_cents,
                    notes, order_date
                ) VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)
                "#,
            )
            .bind(id)
            .bind(&order.supplier_id)
            .bind(order.status)
            .bind(order.paid_amount_cents)
            .bind(&order.notes)
            .bind(Utc::now()),
        )
        .await?;

        let mut total = Money::zero();
        for item in &order.items {
            let line_total = item.total_cost();
            uow.execute_raw(
                sqlx::query(
                    r#"
                    INSERT INTO purchase_order_items (
                        id, purchase_order_id, product_id, quantity,
                        unit_cost_cents, total_cost_cents, received_quantity
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(id)
                .bind(&item.product_id)
                .bind(item.quantity)
                .bind(item.unit_cost_cents)
                .bind(line_total.cents()),
            )
            .await?;
            total += line_total;
        }

        uow.execute_raw(
            sqlx::query("UPDATE purchase_orders SET total_amount_cents = ?1 WHERE id = ?2")
                .bind(total.cents())
                .bind(id),
        )
        .await?;

        Ok(total)
    }

    /// Receives every line of a purchase order into stock.
    ///
    /// Missing or already received orders are left alone, so calling this
    /// twice moves stock once.
    pub async fn receive(&self, po_id: &str) -> DbResult<()> {
        let Some(order) = self.get_by_id(po_id).await? else {
            debug!(po_id = %po_id, "Purchase order not found, nothing to receive");
            return Ok(());
        };
        if order.status == PurchaseStatus::Received {
            debug!(po_id = %po_id, "Purchase order already received");
            return Ok(());
        }

        let mut uow = self.ledger.begin().await?;
        let result = Self::write_receipt(&mut uow, po_id).await;
        let lines = uow.finish(result).await?;

        info!(po_id = %po_id, lines, "Purchase order received");
        self.audit.record(
            AuditEvent::new("receive", "purchase_order", po_id)
                .old_value(&json!({ "status": order.status }))
                .new_value(&json!({ "status": PurchaseStatus::Received })),
        );
        Ok(())
    }

    /// Returns the number of lines received.
    async fn write_receipt(uow: &mut UnitOfWork, po_id: &str) -> DbResult<usize> {
        let sql = format!(
            "SELECT {} FROM purchase_order_items WHERE purchase_order_id = ?1 ORDER BY rowid",
            ITEM_COLUMNS
        );
        let items = uow
            .query(sqlx::query_as::<_, PurchaseOrderItem>(&sql).bind(po_id))
            .await?;
        let now = Utc::now();

        for item in &items {
            let level = read_stock(uow, &item.product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &item.product_id))?;

            shift_stock(uow, &item.product_id, item.quantity).await?;

            uow.execute_raw(
                sqlx::query("UPDATE products SET cost_price_cents = ?1 WHERE id = ?2")
                    .bind(item.unit_cost_cents)
                    .bind(&item.product_id),
            )
            .await?;

            insert_movement(
                uow,
                NewMovement {
                    product_id: &item.product_id,
                    movement_type: MovementType::In,
                    quantity: item.quantity,
                    previous_stock: level.stock_quantity,
                    new_stock: level.stock_quantity + item.quantity,
                    reason: "Purchase Order Received",
                    reference_id: Some(po_id),
                    reference_type: Some(ReferenceType::PurchaseOrder),
                },
            )
            .await?;

            uow.execute_raw(
                sqlx::query(
                    "UPDATE purchase_order_items SET received_quantity = quantity WHERE id = ?1",
                )
                .bind(&item.id),
            )
            .await?;
        }

        uow.execute_raw(
            sqlx::query("UPDATE purchase_orders SET status = ?1, received_at = ?2 WHERE id = ?3")
                .bind(PurchaseStatus::Received)
                .bind(now)
                .bind(po_id),
        )
        .await?;

        Ok(items.len())
    }

    /// Moves an order between pending and cancelled.
    ///
    /// A received order keeps its status for good; reopening it would let
    /// [`receive`](Self::receive) move its stock a second time.
    ///
    /// ## Errors
    /// - `Received` → rejected, use [`receive`](Self::receive)
    /// - Order already received → rejected
    /// - Order missing → `NotFound`
    pub async fn update_status(&self, po_id: &str, status: PurchaseStatus) -> DbResult<()> {
        if status == PurchaseStatus::Received {
            return Err(DbError::rejected(
                "Purchase orders are marked received through receive",
            ));
        }

        let mut uow = self.ledger.begin().await?;
        let result: DbResult<PurchaseStatus> = async {
            let (previous,) = uow
                .get_one(
                    sqlx::query_as::<_, (PurchaseStatus,)>(
                        "SELECT status FROM purchase_orders WHERE id = ?1",
                    )
                    .bind(po_id),
                )
                .await?
                .ok_or_else(|| DbError::not_found("PurchaseOrder", po_id))?;

            if previous == PurchaseStatus::Received {
                return Err(DbError::rejected(
                    "Received purchase orders cannot change status",
                ));
            }

            uow.execute_raw(
                sqlx::query("UPDATE purchase_orders SET status = ?1 WHERE id = ?2")
                    .bind(status)
                    .bind(po_id),
            )
            .await?;
            Ok(previous)
        }
        .await;
        let previous = uow.finish(result).await?;

        info!(po_id = %po_id, from = %previous, to = %status, "Purchase order status changed");
        self.audit.record(
            AuditEvent::new("status_change", "purchase_order", po_id)
                .old_value(&json!({ "status": previous }))
                .new_value(&json!({ "status": status })),
        );
        Ok(())
    }

    pub async fn get_by_id(&self, po_id: &str) -> DbResult<Option<PurchaseOrder>> {
        let sql = format!("SELECT {} FROM purchase_orders WHERE id = ?1", PO_COLUMNS);
        self.ledger
            .get_one(sqlx::query_as::<_, PurchaseOrder>(&sql).bind(po_id))
            .await
    }

    pub async fn items(&self, po_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
        let sql = format!(
            "SELECT {} FROM purchase_order_items WHERE purchase_order_id = ?1 ORDER BY rowid",
            ITEM_COLUMNS
        );
        self.ledger
            .query(sqlx::query_as::<_, PurchaseOrderItem>(&sql).bind(po_id))
            .await
    }

    /// Newest orders first.
    pub async fn list(&self, filter: &PurchaseFilter) -> DbResult<Vec<PurchaseOrder>> {
        let sql = format!(
            r#"
            SELECT {} FROM purchase_orders
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR supplier_id = ?2)
            ORDER BY order_date DESC, rowid DESC
            "#,
            PO_COLUMNS
        );
        self.ledger
            .query(
                sqlx::query_as::<_, PurchaseOrder>(&sql)
                    .bind(filter.status)
                    .bind(&filter.supplier_id),
            )
            .await
    }
}
