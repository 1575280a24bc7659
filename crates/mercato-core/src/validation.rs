//! # Validation Module
//!
//! Input checks that run before any transaction is opened.
//!
//! ## Where Validation Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Caller (UI store)                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  THIS MODULE ── fail fast, nothing written, no rollback needed         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Unit of work (BEGIN)                                                   │
//! │  ├── live checks that need the database (stock sufficiency)            │
//! │  └── SQLite constraints (NOT NULL, FOREIGN KEY, CHECK)                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::cart::{CartLine, PaymentDetails};
use crate::error::ValidationError;
use crate::promotion::{NewPromotion, PriceDiscount, PromotionConfig};
use crate::types::{
    NewCustomer, NewProduct, NewPurchaseOrder, NewSupplier, PaymentMethod, PurchaseStatus,
};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Primitive Validators
// =============================================================================

/// Validates a display name (product, customer, supplier, promotion).
///
/// ## Example
/// ```rust
/// use mercato_core::validation::validate_name;
///
/// assert!(validate_name("name", "Coca-Cola 330ml").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a cart line quantity: positive and at most `MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock movement quantity (strictly positive, no upper bound).
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }
    Ok(())
}

/// Validates a non-negative amount in cents. Zero is allowed (free items).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a ledger amount, which must be strictly positive.
pub fn validate_amount_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::must_be_positive("amount"));
    }
    Ok(())
}

/// Validates a rate in basis points (0 to 100%).
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use mercato_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::invalid("id", "must be a valid UUID"))?;

    Ok(())
}

// =============================================================================
// Checkout
// =============================================================================

/// Validates a cart and its payment before the sale transaction opens.
///
/// ## Rules
/// - At least one line, at most `MAX_CART_ITEMS`
/// - Every quantity passes [`validate_quantity`]
/// - Line discounts are non-negative and do not exceed the line's gross price
/// - Credit payments carry a customer id
pub fn validate_checkout(lines: &[CartLine], payment: &PaymentDetails) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::required("cart"));
    }

    if lines.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    for line in lines {
        validate_quantity(line.quantity)?;
        validate_price_cents("discount", line.discount_cents)?;

        let gross = line.unit_price().multiply_quantity(line.quantity);
        if line.discount() > gross {
            return Err(ValidationError::invalid(
                "discount",
                format!("exceeds the line price of {}", line.product.name),
            ));
        }
    }

    validate_rate_bps("tax_rate", payment.tax_rate.bps())?;
    validate_price_cents("discount", payment.discount_cents)?;

    if payment.method == PaymentMethod::Credit
        && payment
            .customer_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
    {
        return Err(ValidationError::CreditRequiresCustomer);
    }

    Ok(())
}

// =============================================================================
// Entity Inputs
// =============================================================================

pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_name("name", &product.name)?;
    validate_price_cents("cost_price", product.cost_price_cents)?;
    validate_price_cents("selling_price", product.selling_price_cents)?;

    if product.stock_quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock_quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

pub fn validate_new_customer(customer: &NewCustomer) -> ValidationResult<()> {
    validate_name("name", &customer.name)
}

pub fn validate_new_supplier(supplier: &NewSupplier) -> ValidationResult<()> {
    validate_name("name", &supplier.name)
}

/// Purchase orders need a supplier and at least one well-formed line.
///
/// A new order cannot start out received: stock only moves through receive.
pub fn validate_new_purchase_order(order: &NewPurchaseOrder) -> ValidationResult<()> {
    if order.supplier_id.trim().is_empty() {
        return Err(ValidationError::required("supplier_id"));
    }

    if order.status == PurchaseStatus::Received {
        return Err(ValidationError::Rejected(
            "New purchase orders cannot be created as received".to_string(),
        ));
    }

    if order.items.is_empty() {
        return Err(ValidationError::required("items"));
    }

    for item in &order.items {
        validate_stock_quantity(item.quantity)?;
        validate_price_cents("unit_cost", item.unit_cost_cents)?;
    }

    validate_price_cents("paid_amount", order.paid_amount_cents)
}

/// Validates a promotion config payload on its own.
pub fn validate_promotion_config(config: &PromotionConfig) -> ValidationResult<()> {
    match config {
        PromotionConfig::PriceDiscount(PriceDiscount::Percentage {
            percent_bps,
            max_discount_cents,
        }) => {
            validate_rate_bps("percent", *percent_bps)?;
            if let Some(max) = max_discount_cents {
                validate_price_cents("max_discount", *max)?;
            }
        }
        PromotionConfig::PriceDiscount(PriceDiscount::Fixed { amount_cents }) => {
            validate_amount_cents(*amount_cents)?;
        }
        PromotionConfig::QuantityDiscount(cfg) => {
            if cfg.buy_quantity <= 0 {
                return Err(ValidationError::must_be_positive("buy_quantity"));
            }
            if cfg.free_quantity <= 0 {
                return Err(ValidationError::must_be_positive("free_quantity"));
            }
        }
        PromotionConfig::PackDiscount(cfg) => {
            validate_price_cents("bundle_price", cfg.bundle_price_cents)?;
        }
    }
    Ok(())
}

/// Validates a promotion before it is stored.
///
/// ## Rules
/// - Name present, `start_date <= end_date`
/// - Config passes [`validate_promotion_config`]
/// - Pack promotions link at least two distinct products
pub fn validate_new_promotion(promotion: &NewPromotion) -> ValidationResult<()> {
    validate_name("name", &promotion.name)?;

    if promotion.end_date < promotion.start_date {
        return Err(ValidationError::invalid(
            "end_date",
            "must not be before start_date",
        ));
    }

    validate_promotion_config(&promotion.config)?;

    if let PromotionConfig::PackDiscount(_) = promotion.config {
        let distinct: HashSet<&str> = promotion.product_ids.iter().map(String::as_str).collect();
        if distinct.len() < 2 {
            return Err(ValidationError::invalid(
                "product_ids",
                "a bundle needs at least two products",
            ));
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::promotion::{PackDiscount, PromotionStatus, QuantityDiscount};
    use crate::types::{NewPurchaseItem, Product, TaxRate};
    use chrono::{NaiveDate, Utc};

    fn line(quantity: i64) -> CartLine {
        CartLine::new(
            Product {
                id: "p-1".to_string(),
                barcode: None,
                name: "Widget".to_string(),
                cost_price_cents: 100,
                selling_price_cents: 200,
                stock_quantity: 10,
                reorder_level: 0,
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            quantity,
        )
    }

    fn new_promotion(config: PromotionConfig, products: &[&str]) -> NewPromotion {
        NewPromotion {
            name: "Promo".to_string(),
            status: PromotionStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            config,
            product_ids: products.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Widget").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }

    #[test]
    fn test_checkout_requires_lines() {
        let err = validate_checkout(&[], &PaymentDetails::cash()).unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));
    }

    #[test]
    fn test_credit_checkout_requires_customer() {
        let payment = PaymentDetails {
            method: PaymentMethod::Credit,
            ..PaymentDetails::default()
        };
        let err = validate_checkout(&[line(1)], &payment).unwrap_err();
        assert_eq!(err.to_string(), "Credit sales require a linked customer");

        assert!(validate_checkout(&[line(1)], &PaymentDetails::credit("c-1")).is_ok());
    }

    #[test]
    fn test_checkout_rejects_discount_above_line_price() {
        let lines = [line(2).with_discount(Money::from_cents(401))];
        assert!(validate_checkout(&lines, &PaymentDetails::cash()).is_err());

        let lines = [line(2).with_discount(Money::from_cents(400))];
        assert!(validate_checkout(&lines, &PaymentDetails::cash()).is_ok());
    }

    #[test]
    fn test_checkout_rejects_bad_tax_rate() {
        let payment = PaymentDetails::cash().with_tax_rate(TaxRate::from_bps(10_001));
        assert!(validate_checkout(&[line(1)], &payment).is_err());
    }

    #[test]
    fn test_purchase_order_rules() {
        let mut order = NewPurchaseOrder {
            supplier_id: "s-1".to_string(),
            items: vec![NewPurchaseItem {
                product_id: "p-1".to_string(),
                quantity: 10,
                unit_cost_cents: 150,
            }],
            ..NewPurchaseOrder::default()
        };
        assert!(validate_new_purchase_order(&order).is_ok());

        order.status = PurchaseStatus::Cancelled;
        assert!(validate_new_purchase_order(&order).is_ok());

        order.status = PurchaseStatus::Received;
        assert!(matches!(
            validate_new_purchase_order(&order),
            Err(ValidationError::Rejected(_))
        ));
        order.status = PurchaseStatus::Pending;

        order.items[0].quantity = 0;
        assert!(validate_new_purchase_order(&order).is_err());

        order.items.clear();
        assert!(validate_new_purchase_order(&order).is_err());
    }

    #[test]
    fn test_promotion_rules() {
        let bundle = PromotionConfig::PackDiscount(PackDiscount {
            bundle_price_cents: 1_000,
        });
        assert!(validate_new_promotion(&new_promotion(bundle.clone(), &["a", "b"])).is_ok());
        assert!(validate_new_promotion(&new_promotion(bundle.clone(), &["a", "a"])).is_err());

        let b0g0 = PromotionConfig::QuantityDiscount(QuantityDiscount {
            buy_quantity: 0,
            free_quantity: 1,
        });
        assert!(validate_new_promotion(&new_promotion(b0g0, &[])).is_err());

        let mut reversed = new_promotion(bundle, &["a", "b"]);
        reversed.end_date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert!(validate_new_promotion(&reversed).is_err());
    }

    #[test]
    fn test_percentage_above_hundred_rejected() {
        let cfg = PromotionConfig::PriceDiscount(PriceDiscount::Percentage {
            percent_bps: 10_001,
            max_discount_cents: None,
        });
        assert!(validate_promotion_config(&cfg).is_err());
    }
}
