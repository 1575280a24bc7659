//! # Cart Snapshot
//!
//! The cart handed to checkout and to the pricing engine. It is a plain
//! snapshot: the sale engine re-reads live stock itself and never trusts
//! `product.stock_quantity` from here.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{PaymentMethod, Product, TaxRate};

/// One cart line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i64,
    /// Per-line discount already resolved by the caller (usually from the
    /// pricing engine). Zero when no promotion applies.
    #[serde(default)]
    pub discount_cents: i64,
}

impl CartLine {
    pub fn new(product: Product, quantity: i64) -> Self {
        CartLine {
            product,
            quantity,
            discount_cents: 0,
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount_cents = discount.cents();
        self
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        self.product.selling_price()
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    /// `unit_price * quantity - discount`
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity) - self.discount()
    }
}

/// How a cart is being paid for.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    /// Required when `method` is credit.
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub tax_rate: TaxRate,
    /// Order-level discount on top of the line discounts.
    #[serde(default)]
    pub discount_cents: i64,
}

impl PaymentDetails {
    pub fn cash() -> Self {
        PaymentDetails::default()
    }

    pub fn credit(customer_id: impl Into<String>) -> Self {
        PaymentDetails {
            method: PaymentMethod::Credit,
            customer_id: Some(customer_id.into()),
            ..PaymentDetails::default()
        }
    }

    pub fn with_tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount_cents = discount.cents();
        self
    }
}

/// Totals for a cart, computed the way the sale row stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

impl SaleTotals {
    /// `subtotal = Σ line_total`, `tax = subtotal * rate`,
    /// `total = subtotal + tax - discount`.
    ///
    /// ## Example
    /// ```rust
    /// use mercato_core::cart::{PaymentDetails, SaleTotals};
    ///
    /// let totals = SaleTotals::compute(&[], &PaymentDetails::cash());
    /// assert!(totals.total.is_zero());
    /// ```
    pub fn compute(lines: &[CartLine], payment: &PaymentDetails) -> Self {
        let subtotal: Money = lines.iter().map(CartLine::line_total).sum();
        let tax = subtotal.calculate_tax(payment.tax_rate);
        let discount = Money::from_cents(payment.discount_cents);

        SaleTotals {
            subtotal,
            tax,
            discount,
            total: subtotal + tax - discount,
        }
    }
}
