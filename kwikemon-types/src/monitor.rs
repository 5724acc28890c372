//! Monitor - one named status record.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::Expiry;

/// Hash field holding the status text.
pub const FIELD_TEXT: &str = "text";
/// Hash field holding the creation time (ms since epoch).
pub const FIELD_CREATED: &str = "created";
/// Hash field holding the last write time (ms since epoch).
pub const FIELD_MODIFIED: &str = "modified";
/// Hash field holding the write counter.
pub const FIELD_UPDATES: &str = "updates";
/// Hash field holding the configured expiry in seconds.
pub const FIELD_EXPIRE: &str = "expire";

/// A stored field could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}` is missing or malformed")]
pub struct FieldError {
    pub field: &'static str,
}

/// A snapshot of one monitor as last read from the store.
///
/// Monitors are plain values: the store is the only source of truth and a
/// `Monitor` is never written back implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Monitor {
    /// Name of the monitor, also part of its storage key.
    pub name: String,

    /// Latest status text.
    pub text: String,

    /// Unix timestamp in milliseconds of the first write.
    pub created: u64,

    /// Unix timestamp in milliseconds of the latest write.
    pub modified: u64,

    /// Number of writes so far.
    pub updates: u64,

    /// Expiry applied on every write.
    pub expire: Expiry,

    /// Time left before the monitor expires, as of the read.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub ttl: Option<Expiry>,
}

impl Monitor {
    /// Decode a monitor from its stored hash fields.
    ///
    /// Records written by older tools may lack `created` (taken to be
    /// `modified`), `updates` (taken to be one) or `expire` (taken to be
    /// `default_expire`). A missing `text` or `modified` field, or any
    /// numeric field that does not parse, is an error.
    pub fn from_fields(
        name: &str,
        fields: &HashMap<String, String>,
        default_expire: Expiry,
    ) -> Result<Self, FieldError> {
        let text = fields
            .get(FIELD_TEXT)
            .cloned()
            .ok_or(FieldError { field: FIELD_TEXT })?;
        let modified = parse_field::<u64>(fields, FIELD_MODIFIED)?.ok_or(FieldError {
            field: FIELD_MODIFIED,
        })?;
        let created = parse_field::<u64>(fields, FIELD_CREATED)?.unwrap_or(modified);
        let updates = parse_field::<u64>(fields, FIELD_UPDATES)?.unwrap_or(1);
        let expire = parse_field::<i64>(fields, FIELD_EXPIRE)?
            .map(Expiry::from_seconds)
            .unwrap_or(default_expire);

        Ok(Self {
            name: name.to_string(),
            text,
            created,
            modified,
            updates,
            expire,
            ttl: None,
        })
    }

    /// Creation time as a `SystemTime`.
    pub fn created_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.created)
    }

    /// Last write time as a `SystemTime`.
    pub fn modified_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.modified)
    }
}

fn parse_field<T: std::str::FromStr>(
    fields: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<T>, FieldError> {
    match fields.get(field) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| FieldError { field }),
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
