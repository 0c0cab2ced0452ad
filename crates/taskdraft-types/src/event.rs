//! Notification events emitted by the draft subsystem.
//!
//! Events are broadcast to any UI surface that subscribes. `QuotaExceeded`
//! and `StorageUnavailable` back the dismissible notification; the per-key
//! auto-save indicator reads `AutoSaveStatus` from the registry instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::form::FormType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftEvent {
    /// A draft was written to storage.
    Saved { key: String, saved_at: DateTime<Utc> },

    /// A draft was removed, explicitly or as a purge side effect.
    Removed { key: String },

    /// A save attempt was refused.
    SaveFailed { key: String, error: String },

    /// A save did not fit even after evicting expired drafts.
    QuotaExceeded {
        key: String,
        required: u64,
        available: u64,
    },

    /// Persistent storage cannot be used; editing continues in memory only.
    StorageUnavailable,

    /// A prior draft was found when an editing session opened.
    RecoveryAvailable {
        key: String,
        timestamp: DateTime<Utc>,
        form_type: FormType,
    },

    /// An expiry sweep finished.
    CleanupCompleted { removed: usize },
}
