//! # Promotion Pricing Engine
//!
//! Decides which discounts a cart earns. Pure: no I/O, no clock reads
//! except in [`compute_cart_promotions`], which only asks for today's date.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  promotions ──► effective on `today`? ──► split by type                │
//! │                                             │                           │
//! │          ┌──────────────────────────────────┼───────────────┐           │
//! │          ▼                                  ▼               ▼           │
//! │   pack_discount                       price_discount  quantity_discount │
//! │   (evaluated first)                         │               │           │
//! │          │                                  └──────┬────────┘           │
//! │          │ BundleDiscount (always kept)            ▼                    │
//! │          │ + per-product share ─────────► best candidate per line      │
//! │          │                                (strictly greatest wins)      │
//! │          │                                        │                     │
//! │          │                          kept only if >= bundle share        │
//! │          ▼                                        ▼                     │
//! │   bundle_discounts                         item_discounts               │
//! │                                                                         │
//! │   total_savings = Σ item discounts + Σ bundle savings                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let promos = db.promotions().active_for_checkout(today).await?;
//! let result = compute_cart_promotions_on(&cart, &promos, today);
//! for line in &mut cart {
//!     line.discount_cents = result.discount_for_product(&line.product.id).cents();
//! }
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::cart::CartLine;
use crate::money::Money;
use crate::promotion::{
    PackDiscount, PriceDiscount, Promotion, PromotionConfig, PromotionType, QuantityDiscount,
};

// =============================================================================
// Results
// =============================================================================

/// Best per-line discount chosen for one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemDiscount {
    pub product_id: String,
    pub promotion_id: String,
    pub promotion_name: String,
    pub promotion_type: PromotionType,
    pub discount_cents: i64,
    /// Units given away, for buy-X-get-Y promotions.
    pub free_quantity: Option<i64>,
    pub description: String,
}

impl ItemDiscount {
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }
}

/// A pack promotion the cart fully qualifies for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BundleDiscount {
    pub promotion_id: String,
    pub promotion_name: String,
    pub product_ids: Vec<String>,
    /// Number of complete bundles in the cart.
    pub sets: i64,
    /// `bundle_price * sets`
    pub bundle_price_cents: i64,
    /// What the same units cost without the bundle.
    pub original_total_cents: i64,
    pub savings_cents: i64,
    pub description: String,
}

impl BundleDiscount {
    pub fn savings(&self) -> Money {
        Money::from_cents(self.savings_cents)
    }
}

/// Output of [`compute_cart_promotions_on`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PromotionApplication {
    pub item_discounts: Vec<ItemDiscount>,
    pub bundle_discounts: Vec<BundleDiscount>,
    pub total_savings_cents: i64,
}

impl PromotionApplication {
    pub fn total_savings(&self) -> Money {
        Money::from_cents(self.total_savings_cents)
    }

    /// Discount attributable to one product: its item discount if one was
    /// kept, otherwise its even share of the first bundle containing it.
    pub fn discount_for_product(&self, product_id: &str) -> Money {
        if let Some(item) = self.item_discounts.iter().find(|d| d.product_id == product_id) {
            return item.discount();
        }

        self.bundle_discounts
            .iter()
            .find(|b| b.product_ids.iter().any(|id| id == product_id))
            .map(|b| b.savings().split_even(b.product_ids.len()))
            .unwrap_or_default()
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Computes cart promotions using today's UTC date.
pub fn compute_cart_promotions(cart: &[CartLine], promotions: &[Promotion]) -> PromotionApplication {
    compute_cart_promotions_on(cart, promotions, Utc::now().date_naive())
}

/// Computes the discounts `cart` earns from `promotions` on `today`.
///
/// Deterministic: identical inputs always give identical output.
pub fn compute_cart_promotions_on(
    cart: &[CartLine],
    promotions: &[Promotion],
    today: NaiveDate,
) -> PromotionApplication {
    let effective: Vec<&Promotion> = promotions
        .iter()
        .filter(|p| p.is_effective_on(today))
        .collect();

    let mut per_line: Vec<&Promotion> = Vec::new();
    let mut packs: Vec<(&Promotion, &PackDiscount)> = Vec::new();

    // Price promotions are offered before quantity promotions so that on
    // equal discounts the price promotion is the one kept.
    for promo in effective.iter().copied() {
        if let PromotionConfig::PriceDiscount(_) = promo.config {
            per_line.push(promo);
        }
    }
    for promo in effective.iter().copied() {
        match &promo.config {
            PromotionConfig::QuantityDiscount(_) => per_line.push(promo),
            PromotionConfig::PackDiscount(cfg) => packs.push((promo, cfg)),
            PromotionConfig::PriceDiscount(_) => {}
        }
    }

    // Bundles first: their savings compete with per-line offers.
    let mut bundle_discounts = Vec::new();
    let mut bundle_share: HashMap<&str, Money> = HashMap::new();

    for (promo, cfg) in packs {
        let Some(bundle) = pack_discount(cart, promo, cfg) else {
            continue;
        };

        let share = bundle.savings().split_even(bundle.product_ids.len());
        for id in &promo.product_ids {
            *bundle_share.entry(id.as_str()).or_default() += share;
        }
        bundle_discounts.push(bundle);
    }

    let mut item_discounts = Vec::new();

    for line in cart {
        if line.quantity <= 0 {
            continue;
        }

        let mut best: Option<ItemDiscount> = None;
        for promo in per_line.iter().filter(|p| p.applies_to(&line.product.id)) {
            let candidate = match &promo.config {
                PromotionConfig::PriceDiscount(cfg) => price_discount(line, promo, cfg),
                PromotionConfig::QuantityDiscount(cfg) => quantity_discount(line, promo, cfg),
                PromotionConfig::PackDiscount(_) => None,
            };

            if let Some(candidate) = candidate {
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.discount_cents > b.discount_cents);
                if better {
                    best = Some(candidate);
                }
            }
        }

        if let Some(best) = best {
            let share = bundle_share
                .get(line.product.id.as_str())
                .copied()
                .unwrap_or_default();
            // The share is floored to whole cents, so a line discount equal
            // to the floored share is kept even when the exact share is a
            // fraction of a cent higher.
            if best.discount() >= share {
                item_discounts.push(best);
            }
        }
    }

    let total: Money = item_discounts.iter().map(ItemDiscount::discount).sum::<Money>()
        + bundle_discounts.iter().map(BundleDiscount::savings).sum::<Money>();

    PromotionApplication {
        item_discounts,
        bundle_discounts,
        total_savings_cents: total.cents(),
    }
}

// =============================================================================
// Candidates
// =============================================================================

fn price_discount(line: &CartLine, promo: &Promotion, cfg: &PriceDiscount) -> Option<ItemDiscount> {
    let price = line.unit_price();

    let (per_unit, description) = match cfg {
        PriceDiscount::Percentage {
            percent_bps,
            max_discount_cents,
        } => {
            let raw = price.percent_of(*percent_bps);
            let mut description = format!("{} off", format_percent(*percent_bps));
            let per_unit = match max_discount_cents {
                Some(max) => {
                    description.push_str(&format!(" (max {})", Money::from_cents(*max)));
                    raw.min(Money::from_cents(*max))
                }
                None => raw,
            };
            (per_unit, description)
        }
        PriceDiscount::Fixed { amount_cents } => {
            let amount = Money::from_cents(*amount_cents);
            (amount, format!("{} off", amount))
        }
    };

    // Never discount below a zero line price. Clamping per unit first keeps
    // the multiplication within the line gross.
    let discount = per_unit.min(price).multiply_quantity(line.quantity);
    if !discount.is_positive() {
        return None;
    }

    Some(ItemDiscount {
        product_id: line.product.id.clone(),
        promotion_id: promo.id.clone(),
        promotion_name: promo.name.clone(),
        promotion_type: PromotionType::PriceDiscount,
        discount_cents: discount.cents(),
        free_quantity: None,
        description,
    })
}

fn quantity_discount(
    line: &CartLine,
    promo: &Promotion,
    cfg: &QuantityDiscount,
) -> Option<ItemDiscount> {
    let cycle = cfg.cycle_len();
    if cycle <= 0 || cfg.free_quantity <= 0 {
        return None;
    }

    let free_units = (line.quantity / cycle).saturating_mul(cfg.free_quantity);
    let discount = line.unit_price().multiply_quantity(free_units);
    if !discount.is_positive() {
        return None;
    }

    Some(ItemDiscount {
        product_id: line.product.id.clone(),
        promotion_id: promo.id.clone(),
        promotion_name: promo.name.clone(),
        promotion_type: PromotionType::QuantityDiscount,
        discount_cents: discount.cents(),
        free_quantity: Some(free_units),
        description: format!("Buy {} Get {} Free", cfg.buy_quantity, cfg.free_quantity),
    })
}

fn pack_discount(cart: &[CartLine], promo: &Promotion, cfg: &PackDiscount) -> Option<BundleDiscount> {
    if promo.product_ids.is_empty() {
        return None;
    }

    let mut sets = i64::MAX;
    let mut price_per_set = Money::zero();

    for product_id in &promo.product_ids {
        let mut lines = cart.iter().filter(|l| &l.product.id == product_id);
        // Every member must be in the cart; no partial bundle credit.
        let first = lines.next()?;
        let quantity = lines.fold(first.quantity, |acc, l| acc.saturating_add(l.quantity));

        sets = sets.min(quantity);
        price_per_set += first.unit_price();
    }

    if sets < 1 {
        return None;
    }

    let bundle_price = Money::from_cents(cfg.bundle_price_cents);
    let savings_per_set = price_per_set - bundle_price;
    if !savings_per_set.is_positive() {
        return None;
    }

    Some(BundleDiscount {
        promotion_id: promo.id.clone(),
        promotion_name: promo.name.clone(),
        product_ids: promo.product_ids.clone(),
        sets,
        bundle_price_cents: bundle_price.multiply_quantity(sets).cents(),
        original_total_cents: price_per_set.multiply_quantity(sets).cents(),
        savings_cents: savings_per_set.multiply_quantity(sets).cents(),
        description: format!("Bundle {}× {} @ {}", sets, promo.name, bundle_price),
    })
}

/// 2000 → "20%", 1250 → "12.5%"
fn format_percent(bps: u32) -> String {
    let whole = bps / 100;
    let frac = bps % 100;
    if frac == 0 {
        format!("{}%", whole)
    } else {
        let frac = format!("{:02}", frac);
        format!("{}.{}%", whole, frac.trim_end_matches('0'))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::PromotionStatus;
    use crate::types::Product;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            barcode: None,
            name: format!("Product {}", id),
            cost_price_cents: price / 2,
            selling_price_cents: price,
            stock_quantity: 100,
            reorder_level: 5,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(id: &str, price: i64, quantity: i64) -> CartLine {
        CartLine::new(product(id, price), quantity)
    }

    fn promo(id: &str, config: PromotionConfig, products: &[&str]) -> Promotion {
        Promotion {
            id: id.to_string(),
            name: format!("Promo {}", id),
            status: PromotionStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
            config,
            product_ids: products.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn percent(bps: u32, max: Option<i64>) -> PromotionConfig {
        PromotionConfig::PriceDiscount(PriceDiscount::Percentage {
            percent_bps: bps,
            max_discount_cents: max,
        })
    }

    fn fixed(cents: i64) -> PromotionConfig {
        PromotionConfig::PriceDiscount(PriceDiscount::Fixed { amount_cents: cents })
    }

    fn buy_get(buy: i64, free: i64) -> PromotionConfig {
        PromotionConfig::QuantityDiscount(QuantityDiscount {
            buy_quantity: buy,
            free_quantity: free,
        })
    }

    fn bundle(price: i64) -> PromotionConfig {
        PromotionConfig::PackDiscount(PackDiscount {
            bundle_price_cents: price,
        })
    }

    fn assert_total_consistent(result: &PromotionApplication) {
        let items: i64 = result.item_discounts.iter().map(|d| d.discount_cents).sum();
        let bundles: i64 = result.bundle_discounts.iter().map(|b| b.savings_cents).sum();
        assert_eq!(result.total_savings_cents, items + bundles);
    }

    // -------------------------------------------------------------------------
    // Price discounts
    // -------------------------------------------------------------------------

    #[test]
    fn test_percentage_discount() {
        let cart = [line("1", 10_000, 2)];
        let result = compute_cart_promotions_on(&cart, &[promo("a", percent(2_000, None), &["1"])], today());

        assert_eq!(result.item_discounts.len(), 1);
        assert_eq!(result.item_discounts[0].discount_cents, 4_000);
        assert_eq!(result.item_discounts[0].description, "20% off");
        assert_eq!(result.total_savings_cents, 4_000);
    }

    #[test]
    fn test_fixed_discount_is_per_unit() {
        let cart = [line("1", 10_000, 3)];
        let result = compute_cart_promotions_on(&cart, &[promo("a", fixed(1_500), &["1"])], today());

        assert_eq!(result.item_discounts[0].discount_cents, 4_500);
        assert_eq!(result.item_discounts[0].description, "15.00 off");
    }

    #[test]
    fn test_percentage_capped_per_unit() {
        let cart = [line("1", 10_000, 2)];
        let result =
            compute_cart_promotions_on(&cart, &[promo("a", percent(5_000, Some(2_000)), &["1"])], today());

        assert_eq!(result.item_discounts[0].discount_cents, 4_000);
        assert_eq!(result.item_discounts[0].description, "50% off (max 20.00)");
    }

    #[test]
    fn test_fixed_discount_clamped_to_line_total() {
        let cart = [line("1", 1_000, 1)];
        let result = compute_cart_promotions_on(&cart, &[promo("a", fixed(5_000), &["1"])], today());

        assert_eq!(result.item_discounts[0].discount_cents, 1_000);
    }

    #[test]
    fn test_extreme_amounts_clamp_instead_of_overflowing() {
        let cart = [line("1", 1_000, 3), line("2", i64::MAX / 2, 3)];
        let promos = [
            promo("f", fixed(4_000_000_000_000_000_000), &["1", "2"]),
            promo("q", buy_get(1, i64::MAX), &["1"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.item_discounts.len(), 2);
        assert_eq!(result.item_discounts[0].discount_cents, 3_000);
        assert_eq!(result.item_discounts[1].discount_cents, i64::MAX);
        assert_eq!(result.total_savings_cents, i64::MAX);
    }

    #[test]
    fn test_fractional_percentage_description() {
        let cart = [line("1", 10_000, 1)];
        let result = compute_cart_promotions_on(&cart, &[promo("a", percent(1_250, None), &["1"])], today());

        assert_eq!(result.item_discounts[0].discount_cents, 1_250);
        assert_eq!(result.item_discounts[0].description, "12.5% off");
    }

    #[test]
    fn test_ineffective_promotions_are_ignored() {
        let cart = [line("1", 10_000, 1)];

        let mut inactive = promo("a", percent(2_000, None), &["1"]);
        inactive.status = PromotionStatus::Inactive;

        let mut expired = promo("b", percent(2_000, None), &["1"]);
        expired.end_date = NaiveDate::from_ymd_opt(2026, 6, 14).unwrap();

        let mut not_started = promo("c", percent(2_000, None), &["1"]);
        not_started.start_date = NaiveDate::from_ymd_opt(2026, 6, 16).unwrap();

        let result = compute_cart_promotions_on(&cart, &[inactive, expired, not_started], today());
        assert!(result.item_discounts.is_empty());
        assert_eq!(result.total_savings_cents, 0);
    }

    #[test]
    fn test_non_matching_product_gets_nothing() {
        let cart = [line("99", 10_000, 1)];
        let result = compute_cart_promotions_on(&cart, &[promo("a", percent(2_000, None), &["1"])], today());

        assert!(result.item_discounts.is_empty());
    }

    #[test]
    fn test_unrestricted_promotion_applies_to_every_line() {
        let cart = [line("1", 1_000, 1), line("2", 2_000, 1)];
        let result = compute_cart_promotions_on(&cart, &[promo("a", percent(1_000, None), &[])], today());

        assert_eq!(result.item_discounts.len(), 2);
        assert_eq!(result.total_savings_cents, 300);
    }

    // -------------------------------------------------------------------------
    // Quantity discounts
    // -------------------------------------------------------------------------

    #[test]
    fn test_buy_two_get_one_single_cycle() {
        let cart = [line("1", 5_000, 3)];
        let result = compute_cart_promotions_on(&cart, &[promo("q", buy_get(2, 1), &["1"])], today());

        assert_eq!(result.item_discounts[0].discount_cents, 5_000);
        assert_eq!(result.item_discounts[0].free_quantity, Some(1));
        assert_eq!(result.item_discounts[0].description, "Buy 2 Get 1 Free");
    }

    #[test]
    fn test_buy_two_get_one_multiple_cycles() {
        let cart = [line("1", 5_000, 6)];
        let result = compute_cart_promotions_on(&cart, &[promo("q", buy_get(2, 1), &["1"])], today());

        assert_eq!(result.item_discounts[0].discount_cents, 10_000);
        assert_eq!(result.item_discounts[0].free_quantity, Some(2));
    }

    #[test]
    fn test_quantity_below_one_cycle_gets_nothing() {
        let cart = [line("1", 5_000, 2)];
        let result = compute_cart_promotions_on(&cart, &[promo("q", buy_get(3, 1), &["1"])], today());

        assert!(result.item_discounts.is_empty());
        assert_eq!(result.total_savings_cents, 0);
    }

    #[test]
    fn test_buy_one_get_one_odd_quantity() {
        let cart = [line("1", 3_000, 5)];
        let result = compute_cart_promotions_on(&cart, &[promo("q", buy_get(1, 1), &["1"])], today());

        assert_eq!(result.item_discounts[0].discount_cents, 6_000);
        assert_eq!(result.item_discounts[0].free_quantity, Some(2));
    }

    #[test]
    fn test_degenerate_quantity_config_is_ignored() {
        let cart = [line("1", 3_000, 5)];
        let result = compute_cart_promotions_on(&cart, &[promo("q", buy_get(0, 0), &["1"])], today());

        assert!(result.item_discounts.is_empty());
    }

    // -------------------------------------------------------------------------
    // Bundles
    // -------------------------------------------------------------------------

    #[test]
    fn test_bundle_single_set() {
        let cart = [line("1", 5_000, 1), line("2", 8_000, 1)];
        let result = compute_cart_promotions_on(&cart, &[promo("b", bundle(10_000), &["1", "2"])], today());

        assert_eq!(result.bundle_discounts.len(), 1);
        let b = &result.bundle_discounts[0];
        assert_eq!(b.savings_cents, 3_000);
        assert_eq!(b.sets, 1);
        assert_eq!(b.original_total_cents, 13_000);
        assert_eq!(b.description, "Bundle 1× Promo b @ 100.00");
        assert_eq!(result.total_savings_cents, 3_000);
    }

    #[test]
    fn test_bundle_scales_to_min_quantity() {
        let cart = [line("1", 5_000, 5), line("2", 8_000, 2)];
        let result = compute_cart_promotions_on(&cart, &[promo("b", bundle(10_000), &["1", "2"])], today());

        let b = &result.bundle_discounts[0];
        assert_eq!(b.sets, 2);
        assert_eq!(b.savings_cents, 6_000);
        assert_eq!(b.bundle_price_cents, 20_000);
    }

    #[test]
    fn test_bundle_requires_every_member() {
        let cart = [line("1", 5_000, 1)];
        let result = compute_cart_promotions_on(&cart, &[promo("b", bundle(10_000), &["1", "2"])], today());

        assert!(result.bundle_discounts.is_empty());
        assert!(result.item_discounts.is_empty());
        assert_eq!(result.total_savings_cents, 0);
    }

    #[test]
    fn test_bundle_not_cheaper_is_ignored() {
        let cart = [line("1", 5_000, 1), line("2", 5_000, 1)];
        let result = compute_cart_promotions_on(&cart, &[promo("b", bundle(10_000), &["1", "2"])], today());

        assert!(result.bundle_discounts.is_empty());
    }

    #[test]
    fn test_bundle_suppresses_smaller_item_discount() {
        // Bundle saves 60.00 over two products → 30.00 share each.
        // A 10% discount on product 1 is only 10.00, so it is suppressed.
        let cart = [line("1", 10_000, 1), line("2", 8_000, 1)];
        let promos = [
            promo("b", bundle(12_000), &["1", "2"]),
            promo("p", percent(1_000, None), &["1"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.bundle_discounts.len(), 1);
        assert!(result.item_discounts.is_empty());
        assert_eq!(result.total_savings_cents, 6_000);
    }

    #[test]
    fn test_item_discount_equal_to_floored_share_is_kept() {
        // Bundle saves 10.01 → share floors to 5.00 each; a 5.00 fixed discount ties it.
        let cart = [line("1", 5_000, 1), line("2", 5_001, 1)];
        let promos = [
            promo("b", bundle(9_000), &["1", "2"]),
            promo("f", fixed(500), &["1"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.bundle_discounts[0].savings_cents, 1_001);
        assert_eq!(result.item_discounts.len(), 1);
        assert_eq!(result.item_discounts[0].discount_cents, 500);
        assert_eq!(result.total_savings_cents, 1_501);
    }

    #[test]
    fn test_item_discount_kept_when_it_beats_bundle_share() {
        // Bundle saves 10.00 → 5.00 share each. 50% of product 1 is 50.00.
        let cart = [line("1", 10_000, 1), line("2", 8_000, 1)];
        let promos = [
            promo("b", bundle(17_000), &["1", "2"]),
            promo("p", percent(5_000, None), &["1"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.bundle_discounts.len(), 1);
        assert_eq!(result.item_discounts.len(), 1);
        assert_eq!(result.total_savings_cents, 1_000 + 5_000);
        assert_total_consistent(&result);
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    #[test]
    fn test_selects_strictly_greatest_percentage() {
        let cart = [line("1", 10_000, 1)];
        let promos = [
            promo("ten", percent(1_000, None), &["1"]),
            promo("thirty", percent(3_000, None), &["1"]),
        ];

        for _ in 0..3 {
            let result = compute_cart_promotions_on(&cart, &promos, today());
            assert_eq!(result.item_discounts.len(), 1);
            assert_eq!(result.item_discounts[0].promotion_id, "thirty");
            assert_eq!(result.item_discounts[0].discount_cents, 3_000);
        }
    }

    #[test]
    fn test_fixed_beats_lower_percentage() {
        let cart = [line("1", 10_000, 1)];
        let promos = [
            promo("pct", percent(2_000, None), &["1"]),
            promo("fix", fixed(2_500), &["1"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.item_discounts[0].promotion_id, "fix");
        assert_eq!(result.item_discounts[0].discount_cents, 2_500);
    }

    #[test]
    fn test_first_seen_wins_on_tie() {
        let cart = [line("1", 10_000, 1)];
        let promos = [
            promo("first", fixed(1_000), &["1"]),
            promo("second", percent(1_000, None), &["1"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.item_discounts[0].promotion_id, "first");
    }

    #[test]
    fn test_price_offered_before_quantity_on_tie() {
        // B1G1 on 2 units frees one unit (100.00); 50% off 2 units is also 100.00.
        let cart = [line("1", 10_000, 2)];
        let promos = [
            promo("qty", buy_get(1, 1), &["1"]),
            promo("price", percent(5_000, None), &["1"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.item_discounts[0].promotion_id, "price");
    }

    // -------------------------------------------------------------------------
    // Edge cases
    // -------------------------------------------------------------------------

    #[test]
    fn test_empty_cart() {
        let result = compute_cart_promotions_on(&[], &[promo("a", percent(2_000, None), &[])], today());
        assert_eq!(result, PromotionApplication::default());
    }

    #[test]
    fn test_no_promotions() {
        let result = compute_cart_promotions_on(&[line("1", 10_000, 1)], &[], today());
        assert!(result.item_discounts.is_empty());
        assert_eq!(result.total_savings_cents, 0);
    }

    #[test]
    fn test_total_is_sum_of_parts_across_mixed_carts() {
        let carts: Vec<Vec<CartLine>> = vec![
            vec![],
            vec![line("1", 10_000, 1), line("2", 8_000, 1)],
            vec![line("1", 999, 7), line("2", 1_234, 3), line("3", 50, 11)],
            vec![line("3", 50, 0)],
        ];
        let promos = [
            promo("p1", percent(1_000, None), &["1"]),
            promo("p2", fixed(300), &["2", "3"]),
            promo("q1", buy_get(2, 1), &["3"]),
            promo("b1", bundle(1_500), &["1", "2"]),
        ];

        for cart in &carts {
            assert_total_consistent(&compute_cart_promotions_on(cart, &promos, today()));
            assert_total_consistent(&compute_cart_promotions_on(cart, &[], today()));
        }
    }

    #[test]
    fn test_discount_for_product() {
        let cart = [line("1", 10_000, 1), line("2", 8_000, 1), line("3", 1_000, 1)];
        let promos = [
            promo("b", bundle(12_000), &["1", "2"]),
            promo("p", fixed(100), &["3"]),
        ];
        let result = compute_cart_promotions_on(&cart, &promos, today());

        assert_eq!(result.discount_for_product("3").cents(), 100);
        assert_eq!(result.discount_for_product("1").cents(), 3_000);
        assert_eq!(result.discount_for_product("404").cents(), 0);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(2_000), "20%");
        assert_eq!(format_percent(1_250), "12.5%");
        assert_eq!(format_percent(5), "0.05%");
    }
}
