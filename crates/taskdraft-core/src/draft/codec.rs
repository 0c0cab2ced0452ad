//! Draft envelope encoding.
//!
//! Wraps a payload in `{version, timestamp, data}` on the way in and checks
//! shape, version and age on the way out. Like the storage adapter, the
//! codec never fails across its boundary: `encode` and `decode` return
//! `Option`. `inspect` exposes the rejection reason for logging.

use chrono::{DateTime, TimeDelta, Utc};
use taskdraft_types::draft::DraftRecord;
use taskdraft_types::error::DraftError;
use taskdraft_types::form::FormData;

/// Why a stored value was not accepted as a draft.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeRejection {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("format version '{found}' does not match '{expected}'")]
    VersionMismatch { found: String, expected: String },

    #[error("saved at {saved_at}, older than the expiry window")]
    Expired { saved_at: DateTime<Utc> },
}

impl From<DecodeRejection> for DraftError {
    fn from(rejection: DecodeRejection) -> Self {
        DraftError::CorruptRecord(rejection.to_string())
    }
}

/// Versioned, expiring envelope codec.
#[derive(Debug, Clone)]
pub struct DraftCodec {
    format_version: String,
    expiry: TimeDelta,
}

impl DraftCodec {
    pub fn new(format_version: impl Into<String>, expiry: TimeDelta) -> Self {
        Self {
            format_version: format_version.into(),
            expiry,
        }
    }

    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    /// Stamp `payload` with the current version and `now`, and serialize it.
    pub fn encode(&self, payload: &FormData, now: DateTime<Utc>) -> Option<(String, DraftRecord)> {
        let record = DraftRecord {
            format_version: self.format_version.clone(),
            saved_at: now,
            payload: payload.clone(),
        };
        match serde_json::to_string(&record) {
            Ok(raw) => Some((raw, record)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode draft record");
                None
            }
        }
    }

    /// Parse and check a stored value.
    pub fn inspect(&self, raw: &str, now: DateTime<Utc>) -> Result<DraftRecord, DecodeRejection> {
        let record: DraftRecord =
            serde_json::from_str(raw).map_err(|e| DecodeRejection::Malformed(e.to_string()))?;

        if record.format_version != self.format_version {
            return Err(DecodeRejection::VersionMismatch {
                found: record.format_version,
                expected: self.format_version.clone(),
            });
        }

        if self.is_expired(record.saved_at, now) {
            return Err(DecodeRejection::Expired {
                saved_at: record.saved_at,
            });
        }

        Ok(record)
    }

    /// Parse and check a stored value, discarding the rejection reason.
    pub fn decode(&self, raw: &str, now: DateTime<Utc>) -> Option<DraftRecord> {
        self.inspect(raw, now).ok()
    }

    /// Age of a record saved at `saved_at`. Negative under clock skew.
    pub fn age(&self, saved_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
        now - saved_at
    }

    /// Strictly older than the expiry window.
    pub fn is_expired(&self, saved_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.age(saved_at, now) > self.expiry
    }
}
