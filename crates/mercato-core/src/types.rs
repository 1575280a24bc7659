//! # Domain Types
//!
//! Entities owned or mutated by the transactional core.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Product ◄──────────── StockMovement (append-only, in/out/adjustment)  │
//! │     ▲  ▲                                                                │
//! │     │  └───────────── PurchaseOrderItem ◄── PurchaseOrder ──► Supplier │
//! │     │                                                                   │
//! │  SaleItem ◄── Sale ──► Customer ◄── CustomerTransaction (debt ledger)  │
//! │                                                                         │
//! │  Snapshots: SaleItem copies product name and unit price at sale time.  │
//! │  Ledgers:   StockMovement and CustomerTransaction are never updated.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All money columns are integer cents (`*_cents`); use the accessor
//! methods to get [`Money`] values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (825 = 8.25%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog. Only `stock_quantity` and `cost_price_cents`
/// are mutated by the ledgers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub barcode: Option<String>,
    pub name: String,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    /// On-hand quantity. Never negative.
    pub stock_quantity: i64,
    pub reorder_level: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// True when stock has fallen to or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub barcode: Option<String>,
    pub name: String,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    pub stock_quantity: i64,
    pub reorder_level: i64,
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a ledger row points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Sale,
    PurchaseOrder,
    Manual,
}

/// One append-only stock ledger row.
///
/// `new_stock = previous_stock + quantity` for `in`,
/// `previous_stock - quantity` for `out`, and
/// `quantity = |new_stock - previous_stock|` for `adjustment`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: String,
    pub reference_id: Option<String>,
    pub reference_type: Option<ReferenceType>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Signed change this row applied to the product's stock.
    pub fn delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }
}

// =============================================================================
// Customers and the Debt Ledger
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Running balance. Only the debt ledger writes this column.
    pub total_debt_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn total_debt(&self) -> Money {
        Money::from_cents(self.total_debt_cents)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// One updatable customer column. `None` clears an optional column.
///
/// `total_debt_cents` is intentionally absent: only the debt ledger moves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum CustomerField {
    Name(String),
    Phone(Option<String>),
    Email(Option<String>),
    Address(Option<String>),
}

impl CustomerField {
    /// Column name this field writes.
    pub fn column(&self) -> &'static str {
        match self {
            CustomerField::Name(_) => "name",
            CustomerField::Phone(_) => "phone",
            CustomerField::Email(_) => "email",
            CustomerField::Address(_) => "address",
        }
    }
}

/// A typed partial update for a customer's contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    pub fields: Vec<CustomerField>,
}

impl CustomerUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.fields.push(CustomerField::Name(name.into()));
        self
    }

    pub fn phone(mut self, phone: Option<String>) -> Self {
        self.fields.push(CustomerField::Phone(phone));
        self
    }

    pub fn email(mut self, email: Option<String>) -> Self {
        self.fields.push(CustomerField::Email(email));
        self
    }

    pub fn address(mut self, address: Option<String>) -> Self {
        self.fields.push(CustomerField::Address(address));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Kind of customer ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Customer owes more (credit sale, manual charge).
    Debt,
    /// Customer paid down the balance.
    Payment,
}

impl TransactionType {
    /// Applies the ledger sign: `+amount` for debt, `-amount` for payment.
    pub fn signed(&self, amount: Money) -> Money {
        match self {
            TransactionType::Debt => amount,
            TransactionType::Payment => -amount,
        }
    }
}

/// One append-only customer ledger row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CustomerTransaction {
    pub id: String,
    pub customer_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Always a positive magnitude.
    pub amount_cents: i64,
    /// The customer's `total_debt` right after this row was applied.
    pub balance_after_cents: i64,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CustomerTransaction {
    pub fn signed_amount(&self) -> Money {
        self.transaction_type
            .signed(Money::from_cents(self.amount_cents))
    }
}

// =============================================================================
// Sales
// =============================================================================

/// Lifecycle of a sale. Created as `Completed`; the other two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Refunded,
    Voided,
}

impl SaleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Refunded | SaleStatus::Voided)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Refunded => "refunded",
            SaleStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Mobile,
    /// Charged to the customer's debt ledger.
    Credit,
}

/// A completed (or later reversed) sale.
///
/// `total_cents = subtotal_cents + tax_cents - discount_cents`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub user_id: Option<String>,
    /// Cash-drawer shift this sale was rung up in.
    pub session_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// A sale line. Name and unit price are snapshots taken at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    /// `unit_price * quantity - discount`
    pub total_cents: i64,
}

// =============================================================================
// Suppliers and Purchase Orders
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    #[default]
    Pending,
    Received,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Received => "received",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase order header. `total_amount_cents` is always computed from the lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub supplier_id: String,
    pub status: PurchaseStatus,
    pub total_amount_cents: i64,
    pub paid_amount_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub order_date: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    /// `quantity * unit_cost`
    pub total_cost_cents: i64,
    /// 0 until the order is received, then equal to `quantity`.
    pub received_quantity: i64,
}

/// Input for creating a purchase order. There is deliberately no total field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    pub status: PurchaseStatus,
    pub paid_amount_cents: i64,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

impl NewPurchaseItem {
    pub fn total_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(kind: MovementType, previous: i64, new: i64) -> StockMovement {
        StockMovement {
            id: "m-1".to_string(),
            product_id: "p-1".to_string(),
            movement_type: kind,
            quantity: (new - previous).abs(),
            previous_stock: previous,
            new_stock: new,
            reason: "test".to_string(),
            reference_id: None,
            reference_type: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_movement_delta() {
        assert_eq!(movement(MovementType::In, 10, 15).delta(), 5);
        assert_eq!(movement(MovementType::Out, 10, 7).delta(), -3);
        assert_eq!(movement(MovementType::Adjustment, 10, 4).delta(), -6);
    }

    #[test]
    fn test_transaction_sign() {
        let amount = Money::from_cents(500);
        assert_eq!(TransactionType::Debt.signed(amount).cents(), 500);
        assert_eq!(TransactionType::Payment.signed(amount).cents(), -500);
    }

    #[test]
    fn test_sale_status_terminal() {
        assert!(!SaleStatus::Completed.is_terminal());
        assert!(SaleStatus::Refunded.is_terminal());
        assert!(SaleStatus::Voided.is_terminal());
        assert_eq!(SaleStatus::Refunded.to_string(), "refunded");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PurchaseStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");

        let method: PaymentMethod = serde_json::from_str("\"credit\"").unwrap();
        assert_eq!(method, PaymentMethod::Credit);
    }

    #[test]
    fn test_purchase_line_total() {
        let line = NewPurchaseItem {
            product_id: "p-1".to_string(),
            quantity: 12,
            unit_cost_cents: 250,
        };
        assert_eq!(line.total_cost().cents(), 3_000);
    }

    #[test]
    fn test_customer_update_builder() {
        let update = CustomerUpdate::new()
            .name("Ayesha")
            .phone(None)
            .email(Some("a@example.com".to_string()));

        let columns: Vec<_> = update.fields.iter().map(CustomerField::column).collect();
        assert_eq!(columns, vec!["name", "phone", "email"]);
        assert!(CustomerUpdate::new().is_empty());
    }

    #[test]
    fn test_movement_serializes_type_field() {
        let json = serde_json::to_value(movement(MovementType::Out, 5, 4)).unwrap();
        assert_eq!(json["type"], "out");
    }
}
