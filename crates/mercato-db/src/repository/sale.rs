//! # Sale Repository
//!
//! The sale engine: checkout from a cart, refund and void.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CHECKOUT (create_from_cart)                                        │
//! │     ├── validate cart + payment (credit needs a customer)  no BEGIN    │
//! │     └── one unit of work:                                               │
//! │         ├── INSERT sale (status completed, totals computed here)       │
//! │         ├── per line, in cart order:                                   │
//! │         │     live stock read → InsufficientStock aborts everything    │
//! │         │     INSERT sale_item (name + price snapshots)                │
//! │         │     stock = MAX(0, stock - qty), 'out' movement              │
//! │         └── credit: one 'debt' ledger entry for the sale total         │
//! │                                                                         │
//! │  2. REFUND / VOID (terminal, one of them at most once)                 │
//! │     └── one unit of work:                                               │
//! │         ├── status → refunded | voided                                  │
//! │         └── per item: stock + qty, 'in' movement                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refund and void leave any credit debt posting in place.

use chrono::{DateTime, Utc};
use mercato_core::validation::validate_checkout;
use mercato_core::{
    CartLine, CoreError, MovementType, PaymentDetails, PaymentMethod, ReferenceType, Sale,
    SaleItem, SaleStatus, SaleTotals, TransactionType, WALK_IN_CUSTOMER,
};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::{DbError, DbResult};
use crate::ledger::{Ledger, UnitOfWork};
use crate::repository::customer::{post_transaction, LedgerEntry};
use crate::repository::stock::{insert_movement, read_stock, shift_stock, NewMovement};

const SALE_COLUMNS: &str = "id, user_id, session_id, customer_id, customer_name, subtotal_cents, \
     tax_cents, discount_cents, total_cents, payment_method, status, sale_date";

const DEFAULT_REFUND_REASON: &str = "Customer Return";
const DEFAULT_VOID_REASON: &str = "Transaction Voided";
const DEFAULT_LIST_LIMIT: u32 = 100;

/// Filter for [`SaleRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    /// Inclusive lower bound on `sale_date`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `sale_date`.
    pub to: Option<DateTime<Utc>>,
    pub status: Option<SaleStatus>,
    pub customer_id: Option<String>,
    /// Defaults to 100.
    pub limit: Option<u32>,
}

/// Repository for sale database operations.
///
/// ## Usage
/// ```rust,ignore
/// let lines = vec![CartLine::new(product, 2)];
/// let sale = db.sales()
///     .create_from_cart(&lines, &PaymentDetails::cash(), Some(user_id), None)
///     .await?;
/// db.sales().refund_sale(&sale.id, Some("Damaged box")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleRepository {
    ledger: Ledger,
    audit: AuditLog,
    walk_in_name: String,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(ledger: Ledger, audit: AuditLog) -> Self {
        SaleRepository {
            ledger,
            audit,
            walk_in_name: WALK_IN_CUSTOMER.to_string(),
        }
    }

    /// Name stored on sales whose payment carries no customer name.
    pub fn with_walk_in_name(mut self, name: impl Into<String>) -> Self {
        self.walk_in_name = name.into();
        self
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Turns a cart into a completed sale.
    ///
    /// Line discounts are taken as given; resolve them with
    /// `mercato_core::compute_cart_promotions` beforehand.
    ///
    /// ## Errors
    /// - Empty cart, bad quantity, credit without customer → validation, no BEGIN
    /// - Product missing → `NotFound`, everything rolled back
    /// - Line above live stock → `InsufficientStock`, everything rolled back
    /// - Credit customer missing → `NotFound`, everything rolled back
    pub async fn create_from_cart(
        &self,
        lines: &[CartLine],
        payment: &PaymentDetails,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> DbResult<Sale> {
        validate_checkout(lines, payment)?;

        let totals = SaleTotals::compute(lines, payment);
        let customer_name = payment
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.walk_in_name);

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            session_id: session_id.map(str::to_string),
            customer_id: payment.customer_id.clone(),
            customer_name: customer_name.to_string(),
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            payment_method: payment.method,
            status: SaleStatus::Completed,
            sale_date: Utc::now(),
        };

        debug!(
            sale_id = %sale.id,
            lines = lines.len(),
            total = sale.total_cents,
            "Creating sale"
        );

        let mut uow = self.ledger.begin().await?;
        let result = Self::write_sale(&mut uow, &sale, lines).await;
        uow.finish(result).await?;

        let sale = self
            .get_by_id(&sale.id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &sale.id))?;

        info!(
            sale_id = %sale.id,
            total = sale.total_cents,
            method = ?sale.payment_method,
            "Sale completed"
        );
        self.audit.record(
            AuditEvent::new("create", "sale", &sale.id)
                .user(sale.user_id.clone())
                .new_value(&sale),
        );
        Ok(sale)
    }

    async fn write_sale(uow: &mut UnitOfWork, sale: &Sale, lines: &[CartLine]) -> DbResult<()> {
        uow.execute_raw(
            sqlx::query(
                r#"
                INSERT INTO sales (
                    id, user_id, session_id, customer_id, customer_name,
                    subtotal_cents, tax_cents, discount_cents, total_cents,
                    payment_method, status, sale_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&sale.id)
            .bind(&sale.user_id)
            .bind(&sale.session_id)
            .bind(&sale.customer_id)
            .bind(&sale.customer_name)
            .bind(sale.subtotal_cents)
            .bind(sale.tax_cents)
            .bind(sale.discount_cents)
            .bind(sale.total_cents)
            .bind(sale.payment_method)
            .bind(sale.status)
            .bind(sale.sale_date),
        )
        .await?;

        for line in lines {
            let product_id = line.product.id.as_str();
            let level = read_stock(uow, product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?;

            if line.quantity > level.stock_quantity {
                return Err(CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    product_name: level.name,
                    requested: line.quantity,
                    available: level.stock_quantity,
                }
                .into());
            }

            uow.execute_raw(
                sqlx::query(
                    r#"
                    INSERT INTO sale_items (
                        id, sale_id, product_id, product_name, quantity,
                        unit_price_cents, discount_cents, total_cents
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&sale.id)
                .bind(product_id)
                .bind(&line.product.name)
                .bind(line.quantity)
                .bind(line.unit_price().cents())
                .bind(line.discount_cents)
                .bind(line.line_total().cents()),
            )
            .await?;

            shift_stock(uow, product_id, -line.quantity).await?;

            insert_movement(
                uow,
                NewMovement {
                    product_id,
                    movement_type: MovementType::Out,
                    quantity: line.quantity,
                    previous_stock: level.stock_quantity,
                    new_stock: level.stock_quantity - line.quantity,
                    reason: "Sale",
                    reference_id: Some(&sale.id),
                    reference_type: Some(ReferenceType::Sale),
                },
            )
            .await?;
        }

        if sale.payment_method == PaymentMethod::Credit && sale.total_cents > 0 {
            if let Some(customer_id) = sale.customer_id.as_deref() {
                post_transaction(
                    uow,
                    LedgerEntry {
                        customer_id,
                        transaction_type: TransactionType::Debt,
                        amount: sale.total(),
                        reference_type: Some(ReferenceType::Sale),
                        reference_id: Some(&sale.id),
                        description: Some("Credit sale"),
                    },
                )
                .await?;
            }
        }

        Ok(())
    }

    // =========================================================================
    // Refund / Void
    // =========================================================================

    /// Marks a completed sale refunded and puts its stock back.
    pub async fn refund_sale(&self, sale_id: &str, reason: Option<&str>) -> DbResult<()> {
        let reason = format!("Sale Refund: {}", reason.unwrap_or(DEFAULT_REFUND_REASON));
        self.reverse(sale_id, SaleStatus::Refunded, &reason, "refund")
            .await
    }

    /// Marks a completed sale voided and puts its stock back.
    pub async fn void_sale(&self, sale_id: &str, reason: Option<&str>) -> DbResult<()> {
        let reason = format!("Sale Void: {}", reason.unwrap_or(DEFAULT_VOID_REASON));
        self.reverse(sale_id, SaleStatus::Voided, &reason, "void")
            .await
    }

    async fn reverse(
        &self,
        sale_id: &str,
        status: SaleStatus,
        reason: &str,
        action: &str,
    ) -> DbResult<()> {
        debug!(sale_id = %sale_id, status = %status, "Reversing sale");

        let mut uow = self.ledger.begin().await?;
        let result = Self::write_reversal(&mut uow, sale_id, status, reason).await;
        let previous = uow.finish(result).await?;

        info!(sale_id = %sale_id, status = %status, "Sale reversed");
        self.audit.record(
            AuditEvent::new(action, "sale", sale_id)
                .details(reason)
                .old_value(&json!({ "status": previous }))
                .new_value(&json!({ "status": status })),
        );
        Ok(())
    }

    /// Returns the status the sale had before.
    async fn write_reversal(
        uow: &mut UnitOfWork,
        sale_id: &str,
        status: SaleStatus,
        reason: &str,
    ) -> DbResult<SaleStatus> {
        let (current,) = uow
            .get_one(
                sqlx::query_as::<_, (SaleStatus,)>("SELECT status FROM sales WHERE id = ?1")
                    .bind(sale_id),
            )
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        if current.is_terminal() {
            return Err(CoreError::SaleAlreadyTerminal {
                sale_id: sale_id.to_string(),
                status: current.to_string(),
            }
            .into());
        }

        uow.execute_raw(
            sqlx::query("UPDATE sales SET status = ?1 WHERE id = ?2")
                .bind(status)
                .bind(sale_id),
        )
        .await?;

        let items = uow
            .query(
                sqlx::query_as::<_, SaleItem>(
                    r#"
                    SELECT id, sale_id, product_id, product_name, quantity,
                           unit_price_cents, discount_cents, total_cents
                    FROM sale_items WHERE sale_id = ?1 ORDER BY rowid
                    "#,
                )
                .bind(sale_id),
            )
            .await?;

        for item in &items {
            let Some(level) = read_stock(uow, &item.product_id).await? else {
                warn!(
                    sale_id = %sale_id,
                    product_id = %item.product_id,
                    "Product no longer exists, stock not restored"
                );
                continue;
            };

            shift_stock(uow, &item.product_id, item.quantity).await?;

            insert_movement(
                uow,
                NewMovement {
                    product_id: &item.product_id,
                    movement_type: MovementType::In,
                    quantity: item.quantity,
                    previous_stock: level.stock_quantity,
                    new_stock: level.stock_quantity + item.quantity,
                    reason,
                    reference_id: Some(sale_id),
                    reference_type: Some(ReferenceType::Sale),
                },
            )
            .await?;
        }

        Ok(current)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        self.ledger
            .get_one(sqlx::query_as::<_, Sale>(&sql).bind(id))
            .await
    }

    /// Items of a sale in cart order.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        self.ledger
            .query(
                sqlx::query_as::<_, SaleItem>(
                    r#"
                    SELECT id, sale_id, product_id, product_name, quantity,
                           unit_price_cents, discount_cents, total_cents
                    FROM sale_items WHERE sale_id = ?1 ORDER BY rowid
                    "#,
                )
                .bind(sale_id),
            )
            .await
    }

    /// Newest sales first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let sql = format!(
            r#"
            SELECT {} FROM sales
            WHERE (?1 IS NULL OR sale_date >= ?1)
              AND (?2 IS NULL OR sale_date <= ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR customer_id = ?4)
            ORDER BY sale_date DESC, rowid DESC
            LIMIT ?5
            "#,
            SALE_COLUMNS
        );

        self.ledger
            .query(
                sqlx::query_as::<_, Sale>(&sql)
                    .bind(filter.from)
                    .bind(filter.to)
                    .bind(filter.status)
                    .bind(&filter.customer_id)
                    .bind(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)),
            )
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::stock::MovementFilter;
    use crate::repository::testing;
    use mercato_core::{Money, TaxRate, ValidationError};

    #[tokio::test]
    async fn test_cash_sale() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 50).await;
        let gadget = testing::product(&db, "Gadget", 2_500, 30).await;

        let lines = vec![
            CartLine::new(widget.clone(), 5),
            CartLine::new(gadget.clone(), 3).with_discount(Money::from_cents(500)),
        ];
        let payment = PaymentDetails::cash().with_tax_rate(TaxRate::from_bps(1_000));

        let sale = db
            .sales()
            .create_from_cart(&lines, &payment, Some("cashier-1"), Some("shift-1"))
            .await
            .unwrap();

        assert_eq!(sale.subtotal_cents, 5_000 + 7_000);
        assert_eq!(sale.tax_cents, 1_200);
        assert_eq!(sale.total_cents, 13_200);
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.customer_name, "Walk-in Customer");
        assert_eq!(sale.session_id.as_deref(), Some("shift-1"));

        assert_eq!(testing::stock_of(&db, &widget.id).await, 45);
        assert_eq!(testing::stock_of(&db, &gadget.id).await, 27);

        let items = db.sales().items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_name, "Widget");
        assert_eq!(items[1].total_cents, 7_000);

        let movements = db
            .stock()
            .movements(&MovementFilter {
                product_id: Some(widget.id.clone()),
                ..MovementFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reference_id.as_deref(), Some(sale.id.as_str()));
        assert_eq!(movements[0].reference_type, Some(ReferenceType::Sale));
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 50).await;
        let gadget = testing::product(&db, "Gadget", 2_500, 30).await;
        let before = db.ledger().save_requests();

        let lines = vec![
            CartLine::new(widget.clone(), 5),
            CartLine::new(gadget.clone(), 999),
        ];
        let err = db
            .sales()
            .create_from_cart(&lines, &PaymentDetails::cash(), None, None)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Insufficient stock for \"Gadget\": requested 999, available 30"
        );
        assert_eq!(testing::stock_of(&db, &widget.id).await, 50);
        assert_eq!(testing::stock_of(&db, &gadget.id).await, 30);
        assert!(db.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
        assert!(db
            .stock()
            .movements(&MovementFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(db.ledger().save_requests(), before);
    }

    #[tokio::test]
    async fn test_credit_sale_requires_customer() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 50).await;

        let payment = PaymentDetails {
            method: PaymentMethod::Credit,
            ..PaymentDetails::default()
        };
        let err = db
            .sales()
            .create_from_cart(&[CartLine::new(widget.clone(), 1)], &payment, None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::CreditRequiresCustomer))
        ));
        assert_eq!(testing::stock_of(&db, &widget.id).await, 50);
    }

    #[tokio::test]
    async fn test_credit_sale_posts_debt() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 50).await;
        let customer = testing::customer(&db, "Ayesha").await;

        let mut payment = PaymentDetails::credit(&customer.id);
        payment.customer_name = Some(customer.name.clone());

        let sale = db
            .sales()
            .create_from_cart(&[CartLine::new(widget, 3)], &payment, None, None)
            .await
            .unwrap();

        let rows = db.customers().transactions(&customer.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction_type, TransactionType::Debt);
        assert_eq!(rows[0].amount_cents, sale.total_cents);
        assert_eq!(rows[0].reference_id.as_deref(), Some(sale.id.as_str()));
        assert_eq!(sale.customer_name, "Ayesha");

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.total_debt_cents, 3_000);

        let err = db.customers().delete(&customer.id).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete customer with existing sales history"
        );
    }

    #[tokio::test]
    async fn test_credit_sale_for_missing_customer_rolls_back() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 50).await;

        let err = db
            .sales()
            .create_from_cart(
                &[CartLine::new(widget.clone(), 1)],
                &PaymentDetails::credit("missing"),
                None,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::NotFound { .. } | DbError::ForeignKeyViolation { .. }
        ));
        assert_eq!(testing::stock_of(&db, &widget.id).await, 50);
    }

    #[tokio::test]
    async fn test_refund_restores_stock_once() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 50).await;
        let gadget = testing::product(&db, "Gadget", 2_500, 30).await;

        let sale = db
            .sales()
            .create_from_cart(
                &[CartLine::new(widget.clone(), 5), CartLine::new(gadget.clone(), 3)],
                &PaymentDetails::cash(),
                None,
                None,
            )
            .await
            .unwrap();

        db.sales().refund_sale(&sale.id, None).await.unwrap();
        assert_eq!(testing::stock_of(&db, &widget.id).await, 50);
        assert_eq!(testing::stock_of(&db, &gadget.id).await, 30);

        let refunded = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(refunded.status, SaleStatus::Refunded);

        let err = db.sales().refund_sale(&sale.id, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Sale is already refunded");
        assert!(db.sales().void_sale(&sale.id, None).await.is_err());
        assert_eq!(testing::stock_of(&db, &widget.id).await, 50);

        let movements = db
            .stock()
            .movements(&MovementFilter {
                product_id: Some(widget.id.clone()),
                movement_type: Some(MovementType::In),
                ..MovementFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reason, "Sale Refund: Customer Return");
    }

    #[tokio::test]
    async fn test_void_keeps_credit_debt() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 10).await;
        let customer = testing::customer(&db, "Ayesha").await;

        let sale = db
            .sales()
            .create_from_cart(
                &[CartLine::new(widget.clone(), 2)],
                &PaymentDetails::credit(&customer.id),
                None,
                None,
            )
            .await
            .unwrap();

        db.sales()
            .void_sale(&sale.id, Some("Wrong item"))
            .await
            .unwrap();

        let voided = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(voided.status, SaleStatus::Voided);
        assert_eq!(testing::stock_of(&db, &widget.id).await, 10);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.total_debt_cents, 2_000);
    }

    #[tokio::test]
    async fn test_refund_missing_sale() {
        let db = testing::db().await;
        let err = db.sales().refund_sale("missing", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = testing::db().await;
        let widget = testing::product(&db, "Widget", 1_000, 50).await;
        let sales = db.sales();

        let first = sales
            .create_from_cart(&[CartLine::new(widget.clone(), 1)], &PaymentDetails::cash(), None, None)
            .await
            .unwrap();
        let second = sales
            .create_from_cart(&[CartLine::new(widget.clone(), 1)], &PaymentDetails::cash(), None, None)
            .await
            .unwrap();
        sales.void_sale(&first.id, None).await.unwrap();

        let all = sales.list(&SaleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let voided = sales
            .list(&SaleFilter {
                status: Some(SaleStatus::Voided),
                ..SaleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(voided.len(), 1);
        assert_eq!(voided[0].id, first.id);
    }
}
