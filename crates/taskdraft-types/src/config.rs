//! Configuration types for draft persistence.
//!
//! `AppConfig` represents the top-level `config.toml`; the draft subsystem
//! reads its `[drafts]` table. All fields have sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::draft::ANONYMOUS_USER;
use crate::error::ConfigError;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub drafts: DraftConfig,
}

/// Tunables for the draft store, auto-save scheduler and event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftConfig {
    /// Prefix of every draft key in the shared store.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Envelope version stamped on save and required on load.
    #[serde(default = "default_format_version")]
    pub format_version: String,

    /// Hard ceiling on total bytes in the store (5 MiB).
    #[serde(default = "default_storage_ceiling_bytes")]
    pub storage_ceiling_bytes: u64,

    /// Drafts older than this are treated as absent.
    #[serde(default = "default_expiry_days")]
    pub expiry_days: u32,

    /// Quiet period before an edit is auto-saved.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// User id used when no authenticated identity is available.
    #[serde(default = "default_anonymous_user")]
    pub anonymous_user: String,

    /// Sweep expired drafts when the store is bootstrapped.
    #[serde(default = "default_cleanup_on_start")]
    pub cleanup_on_start: bool,

    /// Broadcast channel capacity for draft events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_namespace() -> String {
    "task_draft".to_string()
}

fn default_format_version() -> String {
    "1.0".to_string()
}

fn default_storage_ceiling_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_expiry_days() -> u32 {
    7
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_anonymous_user() -> String {
    ANONYMOUS_USER.to_string()
}

fn default_cleanup_on_start() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            format_version: default_format_version(),
            storage_ceiling_bytes: default_storage_ceiling_bytes(),
            expiry_days: default_expiry_days(),
            debounce_ms: default_debounce_ms(),
            anonymous_user: default_anonymous_user(),
            cleanup_on_start: default_cleanup_on_start(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl DraftConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn expiry(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::days(i64::from(self.expiry_days))
    }

    /// Reject values that would make the store unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "namespace",
                reason: "must not be empty".to_string(),
            });
        }
        if self.format_version.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "format_version",
                reason: "must not be empty".to_string(),
            });
        }
        if self.storage_ceiling_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "storage_ceiling_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.expiry_days == 0 {
            return Err(ConfigError::Invalid {
                field: "expiry_days",
                reason: "must be at least one day".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
