//! # mercato-core: Pure Business Logic for Mercato POS
//!
//! Domain types, integer money, validation and the promotion pricing
//! engine. Nothing in this crate touches a database, a file or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   UI stores / banners                                                   │
//! │        │                      │                                         │
//! │        │ compute_cart_        │ create_from_cart, receive,             │
//! │        │ promotions           │ add_stock, add_transaction ...         │
//! │        ▼                      ▼                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐                           │
//! │  │  mercato-core    │◄──│   mercato-db     │                           │
//! │  │  (THIS CRATE)    │   │  unit of work,   │                           │
//! │  │  pricing, types, │   │  ledgers,        │                           │
//! │  │  validation      │   │  engines         │                           │
//! │  └──────────────────┘   └──────────────────┘                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Products, stock movements, customers, sales, purchase orders
//! - [`promotion`] - Promotion model and typed partial updates
//! - [`pricing`] - The cart promotion resolver
//! - [`cart`] - Cart snapshot, payment details, sale totals
//! - [`money`] - Integer-cent money
//! - [`validation`] - Fail-fast input checks
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use mercato_core::money::Money;
//! use mercato_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(1099);
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(825));
//! assert_eq!(tax.cents(), 91);
//! ```

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod promotion;
pub mod types;
pub mod validation;

pub use cart::{CartLine, PaymentDetails, SaleTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{
    compute_cart_promotions, compute_cart_promotions_on, BundleDiscount, ItemDiscount,
    PromotionApplication,
};
pub use promotion::{
    NewPromotion, PackDiscount, PriceDiscount, Promotion, PromotionConfig, PromotionField,
    PromotionStatus, PromotionType, PromotionUpdate, QuantityDiscount,
};
pub use types::*;

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on one cart line. Guards against a mistyped 10000.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Customer name stored on sales without a linked customer.
pub const WALK_IN_CUSTOMER: &str = "Walk-in Customer";
