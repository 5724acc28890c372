//! Storage key layout.
//!
//! Existing deployments share data between implementations, so the layout
//! is fixed: one hash per monitor at `<prefix>:monitor:<name>` and one set
//! of names at `<prefix>:monitors`.

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "kwikemon";

/// Maps monitor names to storage keys under a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the hash holding one monitor's fields.
    pub fn monitor_key(&self, name: &str) -> String {
        format!("{}:monitor:{}", self.prefix, name)
    }

    /// Key of the set of monitor names.
    pub fn index_key(&self) -> String {
        format!("{}:monitors", self.prefix)
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
