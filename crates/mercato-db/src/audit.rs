//! # Audit Log
//!
//! Post-commit audit events, decoupled from the write that produced them.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  repository op ── COMMIT ok ──► AuditLog::record(event)                │
//! │                                      │  (unbounded send, never awaits) │
//! │                                      ▼                                  │
//! │                              mpsc channel                               │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                          AuditLogWriter::run (spawned)                  │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                          INSERT INTO audit_logs                         │
//! │                          failure → warn!, event dropped                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rolled-back operation emits nothing, and a failed audit write can't
//! reach the caller of the business operation.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One audited change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// `create`, `update`, `delete`, `stock_add`, `refund`, ...
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub user_id: Option<String>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        AuditEvent {
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            details: None,
            old_value: None,
            new_value: None,
            user_id: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Snapshot before the change. Unserializable values are skipped.
    pub fn old_value(mut self, value: &impl Serialize) -> Self {
        self.old_value = serde_json::to_value(value).ok();
        self
    }

    /// Snapshot after the change.
    pub fn new_value(mut self, value: &impl Serialize) -> Self {
        self.new_value = serde_json::to_value(value).ok();
        self
    }

    pub fn user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

// =============================================================================
// Sender Side
// =============================================================================

/// Fire-and-forget audit sender held by every repository.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    tx: Option<mpsc::UnboundedSender<AuditEvent>>,
}

impl AuditLog {
    /// Drops every event.
    pub fn disabled() -> Self {
        AuditLog { tx: None }
    }

    /// An audit log whose events land in the returned receiver. Handy in tests.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (AuditLog { tx: Some(tx) }, rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queues an event. Never blocks and never fails.
    pub fn record(&self, event: AuditEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        if tx.send(event).is_err() {
            debug!("Audit writer gone, event dropped");
        }
    }
}

// =============================================================================
// Writer Side
// =============================================================================

/// Drains audit events into the `audit_logs` table.
pub struct AuditLogWriter {
    pool: SqlitePool,
    rx: mpsc::UnboundedReceiver<AuditEvent>,
}

impl AuditLogWriter {
    /// Creates a writer and the sender that feeds it.
    pub fn new(pool: SqlitePool) -> (AuditLog, Self) {
        let (log, rx) = AuditLog::channel();
        (log, AuditLogWriter { pool, rx })
    }

    /// Runs until every `AuditLog` clone is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Audit writer starting");

        while let Some(event) = self.rx.recv().await {
            if let Err(e) = self.write(&event).await {
                warn!(
                    error = %e,
                    action = %event.action,
                    entity = %event.entity_type,
                    "Failed to write audit event"
                );
            }
        }

        info!("Audit writer stopped");
    }

    async fn write(&self, event: &AuditEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, user_id, action, entity_type, entity_id,
                details, old_value, new_value, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&event.user_id)
        .bind(&event.action)
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.details)
        .bind(event.old_value.as_ref().map(Value::to_string))
        .bind(event.new_value.as_ref().map(Value::to_string))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(action = %event.action, entity_id = %event.entity_id, "Audit event written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[test]
    fn test_disabled_log_drops_events() {
        let log = AuditLog::disabled();
        assert!(!log.is_enabled());
        log.record(AuditEvent::new("create", "product", "p-1"));
    }

    #[test]
    fn test_record_after_receiver_dropped_is_silent() {
        let (log, rx) = AuditLog::channel();
        drop(rx);
        log.record(AuditEvent::new("create", "product", "p-1"));
    }

    #[tokio::test]
    async fn test_writer_persists_events() {
        let db = Database::new(DbConfig::in_memory().audit_log(false))
            .await
            .unwrap();
        let (log, writer) = AuditLogWriter::new(db.pool().clone());

        log.record(
            AuditEvent::new("stock_add", "product", "p-1")
                .details("Restock")
                .new_value(&serde_json::json!({ "stock_quantity": 12 })),
        );
        drop(log);
        writer.run().await;

        let (action, new_value): (String, Option<String>) =
            sqlx::query_as("SELECT action, new_value FROM audit_logs WHERE entity_id = 'p-1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(action, "stock_add");
        assert_eq!(new_value.as_deref(), Some(r#"{"stock_quantity":12}"#));
    }
}
