//! Configuration loading.
//!
//! Settings are layered: built-in defaults, then an optional TOML file
//! (`~/.kwikemon.toml` unless another path is given), then environment
//! variables prefixed with `KWIKEMON_` (nested keys separated by `__`).
//!
//! ```toml
//! prefix = "kwikemon"
//! default_ttl = 86400
//!
//! [redis]
//! host = "127.0.0.1"
//! port = 6379
//! db = 0
//! ```
//!
//! `KWIKEMON_REDIS__PORT=6380` overrides `redis.port`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::backend::Backend;
use crate::store::MonitorStore;
use kwikemon_types::{Keyspace, DEFAULT_PREFIX, DEFAULT_TTL_SECS};

/// Name of the per-user config file in `$HOME`.
pub const CONFIG_FILE_NAME: &str = ".kwikemon.toml";

/// Connection settings for the Redis backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix for every storage key.
    pub prefix: String,
    /// Expiry in seconds for monitors written without one.
    pub default_ttl: i64,
    pub redis: RedisConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL_SECS,
            redis: RedisConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, `~/.kwikemon.toml` is
    /// read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => Some(File::from(path).format(FileFormat::Toml).required(true)),
            None => Self::default_path()
                .map(|path| File::from(path).format(FileFormat::Toml).required(false)),
        };

        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(file);
        }
        builder
            .add_source(
                Environment::with_prefix("KWIKEMON")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// `$HOME/.kwikemon.toml`, if `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(self.prefix.clone())
    }

    /// Build a store over `backend` using these settings.
    pub fn store(&self, backend: Arc<dyn Backend>) -> MonitorStore {
        MonitorStore::new(backend)
            .with_keyspace(self.keyspace())
            .with_default_ttl(self.default_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.prefix, "kwikemon");
        assert_eq!(settings.default_ttl, 86_400);
        assert_eq!(settings.redis.port, 6379);
        assert!(settings.redis.password.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
prefix = "staging"

[redis]
host = "redis.internal"
password = "hunter2"
db = 3
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.prefix, "staging");
        assert_eq!(settings.default_ttl, 86_400);
        assert_eq!(settings.redis.host, "redis.internal");
        assert_eq!(settings.redis.port, 6379);
        assert_eq!(settings.redis.password.as_deref(), Some("hunter2"));
        assert_eq!(settings.redis.db, 3);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/kwikemon.toml"))).is_err());
    }

    #[test]
    fn test_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_ttl = \"soon\"").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_keyspace() {
        let settings = Settings {
            prefix: "x".into(),
            ..Settings::default()
        };
        assert_eq!(settings.keyspace().index_key(), "x:monitors");
    }
}
