//! # Promotion Types
//!
//! Promotions as the pricing engine sees them, plus the inputs the
//! promotion repository accepts.
//!
//! ## Config Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  type               config (stored as JSON next to the type column)    │
//! │  ─────────────────  ─────────────────────────────────────────────────  │
//! │  price_discount     {"discount_type":"percentage","percent_bps":2000,  │
//! │                      "max_discount_cents":500}                         │
//! │                     {"discount_type":"fixed","amount_cents":150}       │
//! │  quantity_discount  {"buy_quantity":2,"free_quantity":1}               │
//! │  pack_discount      {"bundle_price_cents":4500}                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    PriceDiscount,
    QuantityDiscount,
    PackDiscount,
}

impl PromotionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionType::PriceDiscount => "price_discount",
            PromotionType::QuantityDiscount => "quantity_discount",
            PromotionType::PackDiscount => "pack_discount",
        }
    }
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    #[default]
    Active,
    Inactive,
}

// =============================================================================
// Config Payloads
// =============================================================================

/// Per-unit price reduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "discount_type", rename_all = "snake_case")]
pub enum PriceDiscount {
    /// `percent_bps` of the selling price, optionally capped per unit.
    Percentage {
        percent_bps: u32,
        #[serde(default)]
        max_discount_cents: Option<i64>,
    },
    /// Flat amount off each unit regardless of price.
    Fixed { amount_cents: i64 },
}

/// Buy `buy_quantity`, get `free_quantity` free, per full cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuantityDiscount {
    pub buy_quantity: i64,
    pub free_quantity: i64,
}

impl QuantityDiscount {
    pub fn cycle_len(&self) -> i64 {
        self.buy_quantity.saturating_add(self.free_quantity)
    }
}

/// One unit of each linked product, sold together at `bundle_price_cents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PackDiscount {
    pub bundle_price_cents: i64,
}

/// Type-specific configuration. The variant decides the promotion type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum PromotionConfig {
    PriceDiscount(PriceDiscount),
    QuantityDiscount(QuantityDiscount),
    PackDiscount(PackDiscount),
}

impl PromotionConfig {
    pub fn promotion_type(&self) -> PromotionType {
        match self {
            PromotionConfig::PriceDiscount(_) => PromotionType::PriceDiscount,
            PromotionConfig::QuantityDiscount(_) => PromotionType::QuantityDiscount,
            PromotionConfig::PackDiscount(_) => PromotionType::PackDiscount,
        }
    }

    /// Serializes only the payload, for the `config` column.
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            PromotionConfig::PriceDiscount(c) => serde_json::to_string(c),
            PromotionConfig::QuantityDiscount(c) => serde_json::to_string(c),
            PromotionConfig::PackDiscount(c) => serde_json::to_string(c),
        }
    }

    /// Rebuilds a config from the `type` and `config` columns.
    ///
    /// ## Example
    /// ```rust
    /// use mercato_core::promotion::{PromotionConfig, PromotionType};
    ///
    /// let cfg = PromotionConfig::from_payload(
    ///     "promo-1",
    ///     PromotionType::QuantityDiscount,
    ///     r#"{"buy_quantity":2,"free_quantity":1}"#,
    /// ).unwrap();
    /// assert_eq!(cfg.promotion_type(), PromotionType::QuantityDiscount);
    /// ```
    pub fn from_payload(promotion_id: &str, kind: PromotionType, json: &str) -> CoreResult<Self> {
        let parsed = match kind {
            PromotionType::PriceDiscount => {
                serde_json::from_str(json).map(PromotionConfig::PriceDiscount)
            }
            PromotionType::QuantityDiscount => {
                serde_json::from_str(json).map(PromotionConfig::QuantityDiscount)
            }
            PromotionType::PackDiscount => {
                serde_json::from_str(json).map(PromotionConfig::PackDiscount)
            }
        };

        parsed.map_err(|e| CoreError::InvalidPromotion {
            promotion_id: promotion_id.to_string(),
            reason: format!("{} config: {}", kind, e),
        })
    }
}

// =============================================================================
// Promotion
// =============================================================================

/// A promotion with its linked product ids hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Promotion {
    pub id: String,
    pub name: String,
    pub status: PromotionStatus,
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    pub config: PromotionConfig,
    /// Empty means the promotion is not restricted to specific products.
    pub product_ids: Vec<String>,
}

impl Promotion {
    pub fn promotion_type(&self) -> PromotionType {
        self.config.promotion_type()
    }

    /// Active and `start_date <= today <= end_date`.
    pub fn is_effective_on(&self, today: NaiveDate) -> bool {
        self.status == PromotionStatus::Active && self.start_date <= today && today <= self.end_date
    }

    /// Whether a price or quantity promotion covers this product.
    pub fn applies_to(&self, product_id: &str) -> bool {
        self.product_ids.is_empty() || self.product_ids.iter().any(|id| id == product_id)
    }
}

/// Input for creating a promotion.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPromotion {
    pub name: String,
    pub status: PromotionStatus,
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    pub config: PromotionConfig,
    pub product_ids: Vec<String>,
}

// =============================================================================
// Partial Update
// =============================================================================

/// One updatable promotion column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PromotionField {
    Name(String),
    Status(PromotionStatus),
    StartDate(NaiveDate),
    EndDate(NaiveDate),
    /// Rewrites both the type and the config payload.
    Config(PromotionConfig),
}

/// A typed partial update. Only the listed fields change.
///
/// ## Example
/// ```rust
/// use mercato_core::promotion::{PromotionStatus, PromotionUpdate};
///
/// let update = PromotionUpdate::new()
///     .name("Weekend Deal")
///     .status(PromotionStatus::Inactive);
/// assert_eq!(update.fields.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionUpdate {
    pub fields: Vec<PromotionField>,
    /// When set, replaces the whole linked product set.
    pub product_ids: Option<Vec<String>>,
}

impl PromotionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.fields.push(PromotionField::Name(name.into()));
        self
    }

    pub fn status(mut self, status: PromotionStatus) -> Self {
        self.fields.push(PromotionField::Status(status));
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.fields.push(PromotionField::StartDate(date));
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.fields.push(PromotionField::EndDate(date));
        self
    }

    pub fn config(mut self, config: PromotionConfig) -> Self {
        self.fields.push(PromotionField::Config(config));
        self
    }

    pub fn products(mut self, product_ids: Vec<String>) -> Self {
        self.product_ids = Some(product_ids);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.product_ids.is_none()
    }

    /// Applies the update to an in-memory promotion.
    pub fn apply_to(&self, promotion: &mut Promotion) {
        for field in &self.fields {
            match field {
                PromotionField::Name(name) => promotion.name = name.clone(),
                PromotionField::Status(status) => promotion.status = *status,
                PromotionField::StartDate(date) => promotion.start_date = *date,
                PromotionField::EndDate(date) => promotion.end_date = *date,
                PromotionField::Config(config) => promotion.config = config.clone(),
            }
        }
        if let Some(ids) = &self.product_ids {
            promotion.product_ids = ids.clone();
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn promo(status: PromotionStatus, start: &str, end: &str) -> Promotion {
        Promotion {
            id: "promo-1".to_string(),
            name: "Spring".to_string(),
            status,
            start_date: date(start),
            end_date: date(end),
            config: PromotionConfig::PackDiscount(PackDiscount {
                bundle_price_cents: 100,
            }),
            product_ids: vec![],
        }
    }

    #[test]
    fn test_effective_window_is_inclusive() {
        let p = promo(PromotionStatus::Active, "2024-03-01", "2024-03-31");
        assert!(p.is_effective_on(date("2024-03-01")));
        assert!(p.is_effective_on(date("2024-03-31")));
        assert!(!p.is_effective_on(date("2024-02-29")));
        assert!(!p.is_effective_on(date("2024-04-01")));
    }

    #[test]
    fn test_inactive_is_never_effective() {
        let p = promo(PromotionStatus::Inactive, "2024-01-01", "2024-12-31");
        assert!(!p.is_effective_on(date("2024-06-15")));
    }

    #[test]
    fn test_payload_round_trip_through_columns() {
        let cfg = PromotionConfig::PriceDiscount(PriceDiscount::Percentage {
            percent_bps: 2_000,
            max_discount_cents: Some(500),
        });
        let json = cfg.payload_json().unwrap();
        assert!(json.contains("\"discount_type\":\"percentage\""));

        let back = PromotionConfig::from_payload("p", PromotionType::PriceDiscount, &json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_mismatched_payload_is_rejected() {
        let err = PromotionConfig::from_payload(
            "promo-9",
            PromotionType::PackDiscount,
            r#"{"buy_quantity":2,"free_quantity":1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPromotion { .. }));
        assert!(err.to_string().contains("promo-9"));
    }

    #[test]
    fn test_update_apply() {
        let mut p = promo(PromotionStatus::Active, "2024-01-01", "2024-01-31");
        PromotionUpdate::new()
            .name("Renamed")
            .end_date(date("2024-02-28"))
            .products(vec!["a".to_string()])
            .apply_to(&mut p);

        assert_eq!(p.name, "Renamed");
        assert_eq!(p.end_date, date("2024-02-28"));
        assert_eq!(p.product_ids, vec!["a".to_string()]);
        assert!(PromotionUpdate::new().is_empty());
    }
}
