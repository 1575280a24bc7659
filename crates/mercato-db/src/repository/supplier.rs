//! # Supplier Repository

use chrono::Utc;
use mercato_core::validation::validate_new_supplier;
use mercato_core::{NewSupplier, Supplier};
use tracing::debug;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::DbResult;
use crate::ledger::Ledger;

const SUPPLIER_COLUMNS: &str = "id, name, contact_person, phone, email, created_at";

/// Suppliers referenced by purchase orders.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    ledger: Ledger,
    audit: AuditLog,
}

impl SupplierRepository {
    pub fn new(ledger: Ledger, audit: AuditLog) -> Self {
        SupplierRepository { ledger, audit }
    }

    pub async fn create(&self, new: &NewSupplier) -> DbResult<Supplier> {
        validate_new_supplier(new)?;

        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            contact_person: new.contact_person.clone(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            created_at: Utc::now(),
        };
        debug!(id = %supplier.id, name = %supplier.name, "Creating supplier");

        self.ledger
            .execute(
                sqlx::query(
                    r#"
                    INSERT INTO suppliers (id, name, contact_person, phone, email, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(&supplier.id)
                .bind(&supplier.name)
                .bind(&supplier.contact_person)
                .bind(&supplier.phone)
                .bind(&supplier.email)
                .bind(supplier.created_at),
            )
            .await?;

        self.audit
            .record(AuditEvent::new("create", "supplier", &supplier.id).new_value(&supplier));
        Ok(supplier)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers WHERE id = ?1", SUPPLIER_COLUMNS);
        self.ledger
            .get_one(sqlx::query_as::<_, Supplier>(&sql).bind(id))
            .await
    }

    /// All suppliers by name.
    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers ORDER BY name", SUPPLIER_COLUMNS);
        self.ledger.query(sqlx::query_as::<_, Supplier>(&sql)).await
    }
}
