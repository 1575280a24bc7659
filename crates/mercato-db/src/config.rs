//! # Store Configuration
//!
//! Configuration for a Mercato POS install.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERCATO_DB_PATH=/var/lib/mercato/store.db                          │
//! │     MERCATO_TAX_RATE_BPS=825                                           │
//! │     MERCATO_AUDIT=false                                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/mercato/mercato.toml (Linux)                             │
//! │     ~/Library/Application Support/com.mercato.pos/mercato.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # mercato.toml
//! [database]
//! path = "mercato.db"
//! max_connections = 1
//! save_debounce_ms = 250
//!
//! [store]
//! name = "Corner Shop"
//! default_tax_rate_bps = 825
//! walk_in_customer_name = "Walk-in Customer"
//!
//! [audit]
//! enabled = true
//! ```

use mercato_core::types::TaxRate;
use mercato_core::WALK_IN_CUSTOMER;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Relative paths resolve against the working directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Delay between a committed write and the WAL checkpoint (milliseconds).
    #[serde(default = "default_save_debounce")]
    pub save_debounce_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mercato.db")
}

fn default_max_connections() -> u32 {
    1
}

fn default_save_debounce() -> u64 {
    250
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            save_debounce_ms: default_save_debounce(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,

    /// Tax applied at checkout, in basis points (825 = 8.25%).
    #[serde(default)]
    pub default_tax_rate_bps: u32,

    /// Name stored on sales that have no linked customer.
    #[serde(default = "default_walk_in")]
    pub walk_in_customer_name: String,
}

fn default_store_name() -> String {
    "Mercato Store".to_string()
}

fn default_walk_in() -> String {
    WALK_IN_CUSTOMER.to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
            default_tax_rate_bps: 0,
            walk_in_customer_name: default_walk_in(),
        }
    }
}

// =============================================================================
// Audit Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AuditSettings {
    fn default() -> Self {
        AuditSettings { enabled: true }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete install configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub audit: AuditSettings,
}

impl PosConfig {
    /// Loads configuration from file, then applies environment overrides.
    ///
    /// ## Arguments
    /// * `config_path` - Explicit file. `None` uses the platform config dir.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.store.default_tax_rate_bps > 10_000 {
            return Err(DbError::Config(format!(
                "store.default_tax_rate_bps must be at most 10000, got {}",
                self.store.default_tax_rate_bps
            )));
        }

        if self.store.walk_in_customer_name.trim().is_empty() {
            return Err(DbError::Config(
                "store.walk_in_customer_name must not be empty".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MERCATO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(rate) = std::env::var("MERCATO_TAX_RATE_BPS") {
            match rate.parse::<u32>() {
                Ok(bps) => self.store.default_tax_rate_bps = bps,
                Err(_) => warn!(value = %rate, "Ignoring invalid MERCATO_TAX_RATE_BPS"),
            }
        }

        if let Ok(audit) = std::env::var("MERCATO_AUDIT") {
            match audit.to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => self.audit.enabled = true,
                "0" | "false" | "off" | "no" => self.audit.enabled = false,
                _ => warn!(value = %audit, "Ignoring invalid MERCATO_AUDIT"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "mercato", "pos")
            .map(|dirs| dirs.config_dir().join("mercato.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Builds the pool configuration for this install.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .save_debounce(Duration::from_millis(self.database.save_debounce_ms))
            .audit_log(self.audit.enabled)
            .walk_in_customer_name(&self.store.walk_in_customer_name)
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.store.default_tax_rate_bps)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
