//! # Promotion Repository
//!
//! Stores promotions and hands the effective ones to the pricing engine.
//!
//! ## Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  promotions            one row per promotion                            │
//! │    promotion_type      price_discount | quantity_discount | pack_...   │
//! │    config              JSON payload for that type                      │
//! │    deleted_at          soft delete, hidden from every read             │
//! │                                                                         │
//! │  promotion_products    (promotion_id, product_id, position)            │
//! │                        position keeps the order the caller gave        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Checkout
//! ```rust,ignore
//! let promotions = db.promotions().active_for_checkout(today).await?;
//! let applied = compute_cart_promotions_on(&lines, &promotions, today);
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use mercato_core::validation::validate_new_promotion;
use mercato_core::{
    NewPromotion, Promotion, PromotionConfig, PromotionField, PromotionStatus, PromotionType,
    PromotionUpdate,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::{DbError, DbResult};
use crate::ledger::{Ledger, UnitOfWork};

const PROMOTION_COLUMNS: &str = "id, name, promotion_type, status, start_date, end_date, config";

/// Filter for [`PromotionRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct PromotionFilter {
    pub status: Option<PromotionStatus>,
    pub promotion_type: Option<PromotionType>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PromotionRow {
    id: String,
    name: String,
    promotion_type: PromotionType,
    status: PromotionStatus,
    start_date: NaiveDate,
    end_date: NaiveDate,
    config: String,
}

impl PromotionRow {
    fn into_promotion(self, product_ids: Vec<String>) -> DbResult<Promotion> {
        let config = PromotionConfig::from_payload(&self.id, self.promotion_type, &self.config)?;
        Ok(Promotion {
            id: self.id,
            name: self.name,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            config,
            product_ids,
        })
    }
}

/// First occurrence wins.
fn distinct_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Promotions and their product links.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    ledger: Ledger,
    audit: AuditLog,
}

impl PromotionRepository {
    pub fn new(ledger: Ledger, audit: AuditLog) -> Self {
        PromotionRepository { ledger, audit }
    }

    /// Creates a promotion with its product links.
    ///
    /// ## Errors
    /// - Blank name, `end_date < start_date`, bad config → validation error
    /// - Pack with fewer than two distinct products → validation error
    /// - Unknown product id → `ForeignKeyViolation`
    pub async fn create(&self, new: &NewPromotion) -> DbResult<Promotion> {
        let new = NewPromotion {
            name: new.name.trim().to_string(),
            product_ids: distinct_ids(&new.product_ids),
            ..new.clone()
        };
        validate_new_promotion(&new)?;

        let promotion = Promotion {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            status: new.status,
            start_date: new.start_date,
            end_date: new.end_date,
            config: new.config,
            product_ids: new.product_ids,
        };
        let payload = promotion.config.payload_json()?;
        let now = Utc::now();

        debug!(
            promotion_id = %promotion.id,
            kind = %promotion.promotion_type(),
            products = promotion.product_ids.len(),
            "Creating promotion"
        );

        let mut uow = self.ledger.begin().await?;
        let result: DbResult<()> = async {
            uow.execute_raw(
                sqlx::query(
                    r#"
                    INSERT INTO promotions (
                        id, name, promotion_type, status, start_date, end_date,
                        config, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                    "#,
                )
                .bind(&promotion.id)
                .bind(&promotion.name)
                .bind(promotion.promotion_type())
                .bind(promotion.status)
                .bind(promotion.start_date)
                .bind(promotion.end_date)
                .bind(&payload)
                .bind(now),
            )
            .await?;

            Self::write_links(&mut uow, &promotion.id, &promotion.product_ids).await
        }
        .await;
        uow.finish(result).await?;

        info!(promotion_id = %promotion.id, name = %promotion.name, "Promotion created");
        self.audit
            .record(AuditEvent::new("create", "promotion", &promotion.id).new_value(&promotion));
        Ok(promotion)
    }

    async fn write_links(uow: &mut UnitOfWork, promotion_id: &str, product_ids: &[String]) -> DbResult<()> {
        for (position, product_id) in product_ids.iter().enumerate() {
            uow.execute_raw(
                sqlx::query(
                    "INSERT INTO promotion_products (promotion_id, product_id, position) VALUES (?1, ?2, ?3)",
                )
                .bind(promotion_id)
                .bind(product_id)
                .bind(position as i64),
            )
            .await?;
        }
        Ok(())
    }

    /// Gets a promotion that has not been deleted.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Promotion>> {
        let sql = format!(
            "SELECT {} FROM promotions WHERE id = ?1 AND deleted_at IS NULL",
            PROMOTION_COLUMNS
        );
        let Some(row) = self
            .ledger
            .get_one(sqlx::query_as::<_, PromotionRow>(&sql).bind(id))
            .await?
        else {
            return Ok(None);
        };

        let links = self
            .ledger
            .query(
                sqlx::query_as::<_, (String,)>(
                    "SELECT product_id FROM promotion_products WHERE promotion_id = ?1 ORDER BY position",
                )
                .bind(id),
            )
            .await?;

        row.into_promotion(links.into_iter().map(|(product_id,)| product_id).collect())
            .map(Some)
    }

    /// Newest promotions first. Deleted ones are never listed.
    pub async fn list(&self, filter: &PromotionFilter) -> DbResult<Vec<Promotion>> {
        let sql = format!(
            r#"
            SELECT {} FROM promotions
            WHERE deleted_at IS NULL
              AND (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR promotion_type = ?2)
            ORDER BY rowid DESC
            "#,
            PROMOTION_COLUMNS
        );
        let rows = self
            .ledger
            .query(
                sqlx::query_as::<_, PromotionRow>(&sql)
                    .bind(filter.status)
                    .bind(filter.promotion_type),
            )
            .await?;

        self.hydrate(rows, false).await
    }

    /// Promotions the pricing engine should see on `today`.
    ///
    /// A row whose config no longer parses is skipped with a warning so one
    /// bad promotion cannot block checkout.
    pub async fn active_for_checkout(&self, today: NaiveDate) -> DbResult<Vec<Promotion>> {
        let sql = format!(
            r#"
            SELECT {} FROM promotions
            WHERE deleted_at IS NULL
              AND status = ?1
              AND start_date <= ?2
              AND end_date >= ?2
            ORDER BY rowid
            "#,
            PROMOTION_COLUMNS
        );
        let rows = self
            .ledger
            .query(
                sqlx::query_as::<_, PromotionRow>(&sql)
                    .bind(PromotionStatus::Active)
                    .bind(today),
            )
            .await?;

        let promotions = self.hydrate(rows, true).await?;
        debug!(count = promotions.len(), %today, "Loaded checkout promotions");
        Ok(promotions)
    }

    async fn hydrate(&self, rows: Vec<PromotionRow>, skip_invalid: bool) -> DbResult<Vec<Promotion>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // Only the links of the selected rows, passed as one JSON array.
        let ids = serde_json::to_string(&rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>())?;
        let links = self
            .ledger
            .query(
                sqlx::query_as::<_, (String, String)>(
                    r#"
                    SELECT promotion_id, product_id
                    FROM promotion_products
                    WHERE promotion_id IN (SELECT value FROM json_each(?1))
                    ORDER BY promotion_id, position
                    "#,
                )
                .bind(ids),
            )
            .await?;

        let mut by_promotion: HashMap<String, Vec<String>> = HashMap::new();
        for (promotion_id, product_id) in links {
            by_promotion.entry(promotion_id).or_default().push(product_id);
        }

        let mut promotions = Vec::with_capacity(rows.len());
        for row in rows {
            let product_ids = by_promotion.remove(&row.id).unwrap_or_default();
            let id = row.id.clone();
            match row.into_promotion(product_ids) {
                Ok(promotion) => promotions.push(promotion),
                Err(e) if skip_invalid => {
                    warn!(promotion_id = %id, error = %e, "Skipping promotion with invalid config");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(promotions)
    }

    /// Applies a typed partial update and returns the updated promotion.
    ///
    /// The merged result is validated as a whole before anything is written,
    /// so an end date before the stored start date is rejected.
    pub async fn update(&self, id: &str, update: &PromotionUpdate) -> DbResult<Promotion> {
        let mut uow = self.ledger.begin().await?;
        let result = Self::write_update(&mut uow, id, update).await;
        let (before, after) = uow.finish(result).await?;

        info!(promotion_id = %id, fields = update.fields.len(), "Promotion updated");
        self.audit.record(
            AuditEvent::new("update", "promotion", id)
                .old_value(&before)
                .new_value(&after),
        );
        Ok(after)
    }

    async fn write_update(
        uow: &mut UnitOfWork,
        id: &str,
        update: &PromotionUpdate,
    ) -> DbResult<(Promotion, Promotion)> {
        let sql = format!(
            "SELECT {} FROM promotions WHERE id = ?1 AND deleted_at IS NULL",
            PROMOTION_COLUMNS
        );
        let row = uow
            .get_one(sqlx::query_as::<_, PromotionRow>(&sql).bind(id))
            .await?
            .ok_or_else(|| DbError::not_found("Promotion", id))?;
        let links = uow
            .query(
                sqlx::query_as::<_, (String,)>(
                    "SELECT product_id FROM promotion_products WHERE promotion_id = ?1 ORDER BY position",
                )
                .bind(id),
            )
            .await?;
        let before = row.into_promotion(links.into_iter().map(|(p,)| p).collect())?;

        let mut after = before.clone();
        update.apply_to(&mut after);
        after.name = after.name.trim().to_string();
        after.product_ids = distinct_ids(&after.product_ids);

        validate_new_promotion(&NewPromotion {
            name: after.name.clone(),
            status: after.status,
            start_date: after.start_date,
            end_date: after.end_date,
            config: after.config.clone(),
            product_ids: after.product_ids.clone(),
        })?;

        let now = Utc::now();
        for field in &update.fields {
            let query = match field {
                PromotionField::Name(_) => {
                    sqlx::query("UPDATE promotions SET name = ?1, updated_at = ?2 WHERE id = ?3")
                        .bind(after.name.clone())
                        .bind(now)
                        .bind(id)
                }
                PromotionField::Status(status) => {
                    sqlx::query("UPDATE promotions SET status = ?1, updated_at = ?2 WHERE id = ?3")
                        .bind(*status)
                        .bind(now)
                        .bind(id)
                }
                PromotionField::StartDate(date) => sqlx::query(
                    "UPDATE promotions SET start_date = ?1, updated_at = ?2 WHERE id = ?3",
                )
                .bind(*date)
                .bind(now)
                .bind(id),
                PromotionField::EndDate(date) => {
                    sqlx::query("UPDATE promotions SET end_date = ?1, updated_at = ?2 WHERE id = ?3")
                        .bind(*date)
                        .bind(now)
                        .bind(id)
                }
                PromotionField::Config(config) => sqlx::query(
                    "UPDATE promotions SET promotion_type = ?1, config = ?2, updated_at = ?3 WHERE id = ?4",
                )
                .bind(config.promotion_type())
                .bind(config.payload_json()?)
                .bind(now)
                .bind(id),
            };
            uow.execute_raw(query).await?;
        }

        if update.product_ids.is_some() {
            uow.execute_raw(
                sqlx::query("DELETE FROM promotion_products WHERE promotion_id = ?1").bind(id),
            )
            .await?;
            Self::write_links(uow, id, &after.product_ids).await?;
            uow.execute_raw(
                sqlx::query("UPDATE promotions SET updated_at = ?1 WHERE id = ?2")
                    .bind(now)
                    .bind(id),
            )
            .await?;
        }

        Ok((before, after))
    }

    /// Soft-deletes a promotion. It disappears from every read.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = self
            .ledger
            .execute(
                sqlx::query(
                    "UPDATE promotions SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                )
                .bind(now)
                .bind(id),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Promotion", id));
        }

        info!(promotion_id = %id, "Promotion deleted");
        self.audit.record(AuditEvent::new("delete", "promotion", id));
        Ok(())
    }
}
