//! # Customer Repository
//!
//! Customers and the customer debt ledger.
//!
//! ## Debt Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_transaction(customer, debt|payment, amount)                       │
//! │       │                                                                 │
//! │       ▼  one unit of work                                               │
//! │  UPDATE customers                                                       │
//! │     SET total_debt_cents = total_debt_cents ± amount                   │
//! │   RETURNING total_debt_cents ─────────┐   (no row → NotFound)          │
//! │                                       ▼                                 │
//! │  INSERT customer_transactions (balance_after_cents = returned value)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT → save                                                          │
//! │                                                                         │
//! │  Replaying the rows in rowid order (+debt, -payment) gives              │
//! │  total_debt_cents exactly. Nothing else writes that column.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `balance_after_cents` comes from the row the update returned, inside the
//! same transaction, so it always matches the stored balance.

use chrono::Utc;
use mercato_core::validation::{validate_amount_cents, validate_name, validate_new_customer};
use mercato_core::{
    Customer, CustomerField, CustomerTransaction, CustomerUpdate, Money, NewCustomer,
    ReferenceType, TransactionType,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::{DbError, DbResult};
use crate::ledger::{Ledger, UnitOfWork};

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, address, total_debt_cents, created_at, updated_at";

const SEARCH_LIMIT: i64 = 20;

/// A ledger row about to be posted.
pub(crate) struct LedgerEntry<'a> {
    pub customer_id: &'a str,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Applies one ledger entry inside an open unit of work.
///
/// Shared by [`CustomerRepository::add_transaction`] and credit checkout.
pub(crate) async fn post_transaction(
    uow: &mut UnitOfWork,
    entry: LedgerEntry<'_>,
) -> DbResult<CustomerTransaction> {
    let change = entry.transaction_type.signed(entry.amount);
    let now = Utc::now();

    let (balance_after,) = uow
        .get_one(
            sqlx::query_as::<_, (i64,)>(
                r#"
                UPDATE customers
                SET total_debt_cents = total_debt_cents + ?1, updated_at = ?2
                WHERE id = ?3
                RETURNING total_debt_cents
                "#,
            )
            .bind(change.cents())
            .bind(now)
            .bind(entry.customer_id),
        )
        .await?
        .ok_or_else(|| DbError::not_found("Customer", entry.customer_id))?;

    let transaction = CustomerTransaction {
        id: Uuid::new_v4().to_string(),
        customer_id: entry.customer_id.to_string(),
        transaction_type: entry.transaction_type,
        amount_cents: entry.amount.cents(),
        balance_after_cents: balance_after,
        reference_type: entry.reference_type,
        reference_id: entry.reference_id.map(str::to_string),
        description: entry.description.map(str::to_string),
        created_at: now,
    };

    uow.execute_raw(
        sqlx::query(
            r#"
            INSERT INTO customer_transactions (
                id, customer_id, transaction_type, amount_cents, balance_after_cents,
                reference_type, reference_id, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.customer_id)
        .bind(transaction.transaction_type)
        .bind(transaction.amount_cents)
        .bind(transaction.balance_after_cents)
        .bind(transaction.reference_type)
        .bind(&transaction.reference_id)
        .bind(&transaction.description)
        .bind(transaction.created_at),
    )
    .await?;

    debug!(
        customer_id = %transaction.customer_id,
        balance_after = balance_after,
        "Ledger entry posted"
    );

    Ok(transaction)
}

// =============================================================================
// Repository
// =============================================================================

/// Customers and their debt ledger.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    ledger: Ledger,
    audit: AuditLog,
}

impl CustomerRepository {
    pub fn new(ledger: Ledger, audit: AuditLog) -> Self {
        CustomerRepository { ledger, audit }
    }

    pub async fn create(&self, new: &NewCustomer) -> DbResult<Customer> {
        validate_new_customer(new)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            address: new.address.clone(),
            total_debt_cents: 0,
            created_at: now,
            updated_at: now,
        };

        self.ledger
            .execute(
                sqlx::query(
                    r#"
                    INSERT INTO customers (
                        id, name, phone, email, address, total_debt_cents, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)
                    "#,
                )
                .bind(&customer.id)
                .bind(&customer.name)
                .bind(&customer.phone)
                .bind(&customer.email)
                .bind(&customer.address)
                .bind(customer.created_at)
                .bind(customer.updated_at),
            )
            .await?;

        info!(customer_id = %customer.id, "Customer created");
        self.audit
            .record(AuditEvent::new("create", "customer", &customer.id).new_value(&customer));
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS);
        self.ledger
            .get_one(sqlx::query_as::<_, Customer>(&sql).bind(id))
            .await
    }

    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {} FROM customers ORDER BY name", CUSTOMER_COLUMNS);
        self.ledger.query(sqlx::query_as::<_, Customer>(&sql)).await
    }

    /// Name or phone substring match, at most 20 rows.
    pub async fn search(&self, term: &str) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", term.trim());
        let sql = format!(
            "SELECT {} FROM customers WHERE name LIKE ?1 OR phone LIKE ?1 ORDER BY name LIMIT ?2",
            CUSTOMER_COLUMNS
        );
        self.ledger
            .query(
                sqlx::query_as::<_, Customer>(&sql)
                    .bind(&pattern)
                    .bind(SEARCH_LIMIT),
            )
            .await
    }

    /// Applies a partial update to contact details.
    ///
    /// Each field is one fixed statement; all of them share one unit of work.
    pub async fn update(&self, id: &str, update: &CustomerUpdate) -> DbResult<Customer> {
        for field in &update.fields {
            if let CustomerField::Name(name) = field {
                validate_name("name", name)?;
            }
        }

        let before = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        if update.is_empty() {
            return Ok(before);
        }

        let mut uow = self.ledger.begin().await?;
        let result: DbResult<()> = async {
            let now = Utc::now();
            for field in &update.fields {
                let (sql, value) = match field {
                    CustomerField::Name(name) => (
                        "UPDATE customers SET name = ?1, updated_at = ?2 WHERE id = ?3",
                        Some(name.trim()),
                    ),
                    CustomerField::Phone(phone) => (
                        "UPDATE customers SET phone = ?1, updated_at = ?2 WHERE id = ?3",
                        phone.as_deref(),
                    ),
                    CustomerField::Email(email) => (
                        "UPDATE customers SET email = ?1, updated_at = ?2 WHERE id = ?3",
                        email.as_deref(),
                    ),
                    CustomerField::Address(address) => (
                        "UPDATE customers SET address = ?1, updated_at = ?2 WHERE id = ?3",
                        address.as_deref(),
                    ),
                };

                let done = uow
                    .execute_raw(sqlx::query(sql).bind(value).bind(now).bind(id))
                    .await?;
                if done.rows_affected() == 0 {
                    return Err(DbError::not_found("Customer", id));
                }
            }
            Ok(())
        }
        .await;
        uow.finish(result).await?;

        let after = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        info!(customer_id = %id, fields = update.fields.len(), "Customer updated");
        self.audit.record(
            AuditEvent::new("update", "customer", id)
                .old_value(&before)
                .new_value(&after),
        );
        Ok(after)
    }

    /// Deletes a customer with no sales history. Ledger rows go with it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut uow = self.ledger.begin().await?;
        let result: DbResult<()> = async {
            let (sales,) = uow
                .get_one(
                    sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM sales WHERE customer_id = ?1")
                        .bind(id),
                )
                .await?
                .unwrap_or((0,));

            if sales > 0 {
                return Err(DbError::rejected(
                    "Cannot delete customer with existing sales history",
                ));
            }

            let done = uow
                .execute_raw(sqlx::query("DELETE FROM customers WHERE id = ?1").bind(id))
                .await?;
            if done.rows_affected() == 0 {
                return Err(DbError::not_found("Customer", id));
            }
            Ok(())
        }
        .await;
        uow.finish(result).await?;

        info!(customer_id = %id, "Customer deleted");
        self.audit.record(AuditEvent::new("delete", "customer", id));
        Ok(())
    }

    // =========================================================================
    // Debt Ledger
    // =========================================================================

    /// Posts one debt or payment row and moves `total_debt` with it.
    ///
    /// ## Errors
    /// - `amount <= 0` → validation error
    /// - Customer missing → `NotFound`
    pub async fn add_transaction(
        &self,
        customer_id: &str,
        transaction_type: TransactionType,
        amount: Money,
        reference_type: Option<ReferenceType>,
        reference_id: Option<&str>,
        description: Option<&str>,
    ) -> DbResult<CustomerTransaction> {
        validate_amount_cents(amount.cents())?;
        debug!(
            customer_id = %customer_id,
            amount = amount.cents(),
            "Adding customer transaction"
        );

        let mut uow = self.ledger.begin().await?;
        let result = post_transaction(
            &mut uow,
            LedgerEntry {
                customer_id,
                transaction_type,
                amount,
                reference_type,
                reference_id,
                description,
            },
        )
        .await;
        let transaction = uow.finish(result).await?;

        info!(
            customer_id = %customer_id,
            balance_after = transaction.balance_after_cents,
            "Customer transaction recorded"
        );
        self.audit.record(
            AuditEvent::new("transaction", "customer", customer_id).new_value(&transaction),
        );
        Ok(transaction)
    }

    /// Records a payment against the customer's debt.
    pub async fn record_payment(
        &self,
        customer_id: &str,
        amount: Money,
        description: Option<&str>,
    ) -> DbResult<CustomerTransaction> {
        self.add_transaction(
            customer_id,
            TransactionType::Payment,
            amount,
            None,
            None,
            description,
        )
        .await
    }

    /// Ledger rows for a customer, newest first.
    pub async fn transactions(&self, customer_id: &str) -> DbResult<Vec<CustomerTransaction>> {
        self.ledger
            .query(
                sqlx::query_as::<_, CustomerTransaction>(
                    r#"
                    SELECT id, customer_id, transaction_type, amount_cents, balance_after_cents,
                           reference_type, reference_id, description, created_at
                    FROM customer_transactions
                    WHERE customer_id = ?1
                    ORDER BY rowid DESC
                    "#,
                )
                .bind(customer_id),
            )
            .await
    }

    /// Customers who owe money, largest debt first.
    pub async fn debtors(&self) -> DbResult<Vec<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE total_debt_cents > 0 ORDER BY total_debt_cents DESC",
            CUSTOMER_COLUMNS
        );
        self.ledger.query(sqlx::query_as::<_, Customer>(&sql)).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
