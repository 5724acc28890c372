//! The monitor store.
//!
//! Monitors live in the key-value store as one hash per name plus a set of
//! all names (the index). Expiry is delegated to the store's per-key TTL,
//! which removes the hash but leaves the name in the index; [`sweep`]
//! reconciles the two, and [`list`] always sweeps first.
//!
//! ```text
//!  write(name, text) ──▶ MULTI
//!                         HSET    <prefix>:monitor:<name> text.. modified..
//!                         HINCRBY <prefix>:monitor:<name> updates 1
//!                         EXPIRE | PERSIST <prefix>:monitor:<name>
//!                         SADD    <prefix>:monitors <name>
//!                        EXEC
//! ```
//!
//! [`sweep`]: MonitorStore::sweep
//! [`list`]: MonitorStore::list

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use tracing::{debug, warn};

use kwikemon_types::{
    current_timestamp_ms, Expiry, Keyspace, Monitor, DEFAULT_TTL_SECS, FIELD_CREATED,
    FIELD_EXPIRE, FIELD_MODIFIED, FIELD_TEXT, FIELD_UPDATES,
};

use crate::backend::{Backend, Command, TTL_MISSING};
use crate::error::StoreError;
use crate::writer::MonitorWriter;

/// Keyed storage for monitors with TTL-based expiry.
///
/// Cloning is cheap: clones share the backend handle. Every operation is a
/// handful of round trips at most, and every multi-key mutation is one
/// atomic batch, so a store can be shared freely between tasks.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kwikemon::{Expiry, MemoryBackend, MonitorStore};
///
/// # tokio_test::block_on(async {
/// let store = MonitorStore::new(Arc::new(MemoryBackend::new()));
///
/// store.write("backup", "copying /home", Some(600)).await.unwrap();
/// store.write("backup", "done", None).await.unwrap();
///
/// let monitor = store.read("backup").await.unwrap();
/// assert_eq!(monitor.text, "done");
/// assert_eq!(monitor.updates, 2);
/// assert_eq!(monitor.expire, Expiry::After(600));
/// assert_eq!(store.list().await.unwrap(), vec!["backup"]);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MonitorStore {
    backend: Arc<dyn Backend>,
    keys: Keyspace,
    default_ttl: i64,
}

impl MonitorStore {
    /// Create a store over `backend` with the default key prefix and TTL.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            keys: Keyspace::default(),
            default_ttl: DEFAULT_TTL_SECS,
        }
    }

    /// Use a different key layout, e.g. to isolate tests or deployments.
    pub fn with_keyspace(mut self, keys: Keyspace) -> Self {
        self.keys = keys;
        self
    }

    /// Expiry in seconds for new monitors written without one.
    pub fn with_default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = seconds;
        self
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keys
    }

    pub fn default_expiry(&self) -> Expiry {
        Expiry::from_seconds(self.default_ttl)
    }

    /// Set the text of `name`, creating the monitor if needed.
    ///
    /// `ttl` overrides the monitor's expiry; without it an existing monitor
    /// keeps its expiry and a new one gets the store default. Zero or
    /// negative values mean the monitor never expires. The expiry clock
    /// restarts on every write.
    pub async fn write(
        &self,
        name: &str,
        text: &str,
        ttl: Option<i64>,
    ) -> Result<Monitor, StoreError> {
        validate_name(name)?;
        let key = self.keys.monitor_key(name);

        // Read-then-act: two concurrent first writes may both take the
        // create path, and `created` then holds either timestamp.
        let now = current_timestamp_ms();
        let prior = self.prior_state(name, now).await?;
        let expire = match (ttl, &prior) {
            (Some(seconds), _) => Expiry::from_seconds(seconds),
            (None, Some(prior)) => prior.expire,
            (None, None) => self.default_expiry(),
        };
        let created = prior.as_ref().map(|p| p.created).unwrap_or(now);

        let mut fields = vec![
            (FIELD_TEXT.to_string(), text.to_string()),
            (FIELD_MODIFIED.to_string(), now.to_string()),
            (FIELD_EXPIRE.to_string(), expire.as_seconds().to_string()),
        ];
        if prior.as_ref().map_or(true, |p| p.rewrite) {
            fields.push((FIELD_CREATED.to_string(), created.to_string()));
        }
        if prior.as_ref().is_some_and(|p| p.reset_updates) {
            fields.push((FIELD_UPDATES.to_string(), "0".to_string()));
        }

        let commands = vec![
            Command::HashSet {
                key: key.clone(),
                fields,
            },
            Command::HashIncrement {
                key: key.clone(),
                field: FIELD_UPDATES.to_string(),
                by: 1,
            },
            expiry_command(&key, expire),
            Command::SetAdd {
                key: self.keys.index_key(),
                member: name.to_string(),
            },
        ];
        let replies = self.backend.execute(&commands).await?;
        let updates = replies
            .get(1)
            .and_then(|n| u64::try_from(*n).ok())
            .ok_or_else(|| StoreError::Corrupt {
                name: name.to_string(),
                field: FIELD_UPDATES,
            })?;

        debug!(
            "Wrote monitor {} (update {}, expires {})",
            name, updates, expire
        );

        Ok(Monitor {
            name: name.to_string(),
            text: text.to_string(),
            created,
            modified: now,
            updates,
            expire,
            ttl: Some(expire),
        })
    }

    /// Read one monitor, including its remaining lifetime.
    pub async fn read(&self, name: &str) -> Result<Monitor, StoreError> {
        let mut monitor = self
            .load(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        // The key can expire between the two calls; report that as missing.
        monitor.ttl = Some(self.time_to_live(name).await?);
        Ok(monitor)
    }

    /// Whether a live monitor called `name` exists.
    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        self.backend.exists(&self.keys.monitor_key(name)).await
    }

    /// Remaining lifetime of `name`; [`Expiry::Never`] if it never expires.
    pub async fn time_to_live(&self, name: &str) -> Result<Expiry, StoreError> {
        // A live key with under half a second left reports 0, not -1.
        match self.backend.ttl(&self.keys.monitor_key(name)).await? {
            TTL_MISSING => Err(StoreError::NotFound(name.to_string())),
            seconds if seconds >= 0 => Ok(Expiry::After(seconds as u64)),
            _ => Ok(Expiry::Never),
        }
    }

    /// Change the expiry of an existing monitor.
    ///
    /// The new expiry is remembered, so later writes without an explicit
    /// TTL keep it.
    pub async fn set_time_to_live(&self, name: &str, ttl: i64) -> Result<Expiry, StoreError> {
        if !self.exists(name).await? {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let key = self.keys.monitor_key(name);
        let expire = Expiry::from_seconds(ttl);
        self.backend
            .execute(&[
                Command::HashSet {
                    key: key.clone(),
                    fields: vec![(FIELD_EXPIRE.to_string(), expire.as_seconds().to_string())],
                },
                expiry_command(&key, expire),
            ])
            .await?;
        debug!("Set expiry of monitor {} to {}", name, expire);
        Ok(expire)
    }

    /// Sorted names of all live monitors. Sweeps first.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.sweep().await?;
        let mut names = self.backend.set_members(&self.keys.index_key()).await?;
        names.sort();
        Ok(names)
    }

    /// Number of indexed monitors.
    ///
    /// Does not sweep, so names whose keys expired since the last sweep
    /// are still counted.
    pub async fn count(&self) -> Result<u64, StoreError> {
        self.backend.set_cardinality(&self.keys.index_key()).await
    }

    /// Drop index entries whose monitor has expired.
    ///
    /// All names are checked concurrently. A failed check is logged and
    /// the name is kept, so one bad entry never blocks the rest. Returns
    /// the names that remain indexed.
    pub async fn sweep(&self) -> Result<BTreeSet<String>, StoreError> {
        let names = self.backend.set_members(&self.keys.index_key()).await?;

        let checks = names.into_iter().map(|name| async move {
            match self.exists(&name).await {
                Ok(true) => Some(name),
                Ok(false) => {
                    debug!("Sweeping expired monitor {}", name);
                    if let Err(e) = self.remove(&name).await {
                        warn!("Failed to remove expired monitor {}: {}", name, e);
                    }
                    None
                }
                Err(e) => {
                    warn!("Failed to check monitor {}, keeping it: {}", name, e);
                    Some(name)
                }
            }
        });

        Ok(join_all(checks).await.into_iter().flatten().collect())
    }

    /// Read every live monitor, keyed by name.
    ///
    /// Reads run concurrently; the first failure (including a monitor that
    /// expired after listing) aborts the whole call.
    pub async fn read_all(&self) -> Result<BTreeMap<String, Monitor>, StoreError> {
        let names = self.list().await?;
        let reads = names.into_iter().map(|name| async move {
            match self.read(&name).await {
                Ok(monitor) => Ok((name, monitor)),
                Err(source) => Err(StoreError::PartialFailure {
                    name,
                    source: Box::new(source),
                }),
            }
        });
        Ok(try_join_all(reads).await?.into_iter().collect())
    }

    /// Remove a monitor. Removing a missing monitor is not an error.
    pub async fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.backend
            .execute(&[
                Command::Delete {
                    key: self.keys.monitor_key(name),
                },
                Command::SetRemove {
                    key: self.keys.index_key(),
                    member: name.to_string(),
                },
            ])
            .await?;
        Ok(())
    }

    /// Remove every indexed monitor.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let names = self.backend.set_members(&self.keys.index_key()).await?;
        if names.is_empty() {
            return Ok(());
        }
        let index = self.keys.index_key();
        let commands: Vec<Command> = names
            .iter()
            .flat_map(|name| {
                [
                    Command::Delete {
                        key: self.keys.monitor_key(name),
                    },
                    Command::SetRemove {
                        key: index.clone(),
                        member: name.clone(),
                    },
                ]
            })
            .collect();
        self.backend.execute(&commands).await?;
        debug!("Cleared {} monitors", names.len());
        Ok(())
    }

    /// A writer that turns each line written to it into an update of `name`.
    pub fn writer(&self, name: &str, ttl: Option<i64>) -> MonitorWriter {
        MonitorWriter::new(self.clone(), name, ttl)
    }

    /// What `write` needs to know about the record it is about to replace.
    ///
    /// A record that fails to decode is rewritten in full rather than
    /// rejected.
    async fn prior_state(&self, name: &str, now: u64) -> Result<Option<Prior>, StoreError> {
        let fields = self
            .backend
            .hash_get_all(&self.keys.monitor_key(name))
            .await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let prior = match Monitor::from_fields(name, &fields, self.default_expiry()) {
            Ok(monitor) => Prior {
                created: monitor.created,
                expire: monitor.expire,
                rewrite: false,
                reset_updates: false,
            },
            Err(e) => {
                warn!(
                    "Monitor {} has a malformed {} field, rewriting it",
                    name, e.field
                );
                let parse = |field: &str| fields.get(field).and_then(|v| v.parse::<i64>().ok());
                Prior {
                    created: parse(FIELD_CREATED)
                        .and_then(|ms| u64::try_from(ms).ok())
                        .map_or(now, |ms| ms.min(now)),
                    expire: parse(FIELD_EXPIRE)
                        .map(Expiry::from_seconds)
                        .unwrap_or_else(|| self.default_expiry()),
                    rewrite: true,
                    reset_updates: fields.contains_key(FIELD_UPDATES)
                        && parse(FIELD_UPDATES).is_none(),
                }
            }
        };
        Ok(Some(prior))
    }

    async fn load(&self, name: &str) -> Result<Option<Monitor>, StoreError> {
        let fields = self
            .backend
            .hash_get_all(&self.keys.monitor_key(name))
            .await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Monitor::from_fields(name, &fields, self.default_expiry())
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                name: name.to_string(),
                field: e.field,
            })
    }
}

struct Prior {
    created: u64,
    expire: Expiry,
    /// Write every field, including `created`.
    rewrite: bool,
    /// `updates` holds something `HINCRBY` would refuse.
    reset_updates: bool,
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        Err(StoreError::InvalidName)
    } else {
        Ok(())
    }
}

fn expiry_command(key: &str, expire: Expiry) -> Command {
    match expire {
        Expiry::After(seconds) => Command::Expire {
            key: key.to_string(),
            seconds,
        },
        Expiry::Never => Command::Persist {
            key: key.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    fn store() -> MonitorStore {
        MonitorStore::new(Arc::new(MemoryBackend::new()))
    }

    /// Memory backend whose reads fail for chosen keys.
    #[derive(Debug, Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        failing: Mutex<HashSet<String>>,
    }

    impl FlakyBackend {
        fn fail(&self, key: &str) {
            self.failing.lock().insert(key.to_string());
        }

        fn check(&self, key: &str) -> Result<(), StoreError> {
            if self.failing.lock().contains(key) {
                Err(StoreError::Unavailable(format!("injected failure for {}", key)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            self.check(key)?;
            self.inner.exists(key).await
        }

        async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
            self.check(key)?;
            self.inner.hash_get_all(key).await
        }

        async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
            self.check(key)?;
            self.inner.ttl(key).await
        }

        async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
            self.inner.set_members(key).await
        }

        async fn set_cardinality(&self, key: &str) -> Result<u64, StoreError> {
            self.inner.set_cardinality(key).await
        }

        async fn execute(&self, commands: &[Command]) -> Result<Vec<i64>, StoreError> {
            self.inner.execute(commands).await
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = store();
        store.write("foo", "bar", None).await.unwrap();

        let monitor = store.read("foo").await.unwrap();
        assert_eq!(monitor.name, "foo");
        assert_eq!(monitor.text, "bar");
        assert_eq!(monitor.updates, 1);
        assert_eq!(monitor.created, monitor.modified);
        assert_eq!(monitor.expire, Expiry::After(86_400));
    }

    #[tokio::test]
    async fn test_write_overwrites_text() {
        let store = store();
        let first = store.write("foo", "bar", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = store.write("foo", "marcellus", None).await.unwrap();

        assert_eq!(second.updates, 2);
        assert_eq!(second.created, first.created);
        assert!(second.modified >= first.modified);

        let monitor = store.read("foo").await.unwrap();
        assert_eq!(monitor.text, "marcellus");
        assert_eq!(monitor.updates, 2);
        assert_eq!(monitor.created, first.created);
        assert!(monitor.created <= monitor.modified);
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let store = store();
        for name in ["", "   ", "\t\n"] {
            let err = store.write(name, "text", None).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidName));
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_ttl() {
        let store = store();
        store.write("foo", "bar", Some(300)).await.unwrap();
        match store.time_to_live("foo").await.unwrap() {
            Expiry::After(secs) => assert!(secs > 0 && secs <= 300),
            Expiry::Never => panic!("expected an expiry"),
        }
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = store();
        store.write("foo", "bar", Some(0)).await.unwrap();
        let ttl = store.time_to_live("foo").await.unwrap();
        assert_eq!(ttl, Expiry::Never);
        assert_eq!(ttl.as_seconds(), -1);
        assert!(store.exists("foo").await.unwrap());
    }

    #[tokio::test]
    async fn test_negative_ttl_never_expires() {
        let store = store();
        store.write("foo", "bar", Some(-1)).await.unwrap();
        assert_eq!(store.time_to_live("foo").await.unwrap().as_seconds(), -1);
    }

    #[tokio::test]
    async fn test_write_keeps_prior_expiry() {
        let store = store();
        store.write("foo", "a", Some(0)).await.unwrap();
        let monitor = store.write("foo", "b", None).await.unwrap();
        assert_eq!(monitor.expire, Expiry::Never);
        assert_eq!(store.time_to_live("foo").await.unwrap(), Expiry::Never);

        // An explicit ttl replaces it again
        store.write("foo", "c", Some(50)).await.unwrap();
        assert_eq!(store.read("foo").await.unwrap().expire, Expiry::After(50));
    }

    #[tokio::test]
    async fn test_store_default_ttl() {
        let store = store().with_default_ttl(0);
        let monitor = store.write("foo", "bar", None).await.unwrap();
        assert_eq!(monitor.expire, Expiry::Never);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_expires() {
        let store = store();
        store.write("foo", "bar", Some(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(!store.exists("foo").await.unwrap());
        assert!(store.read("foo").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_restarts_expiry_clock() {
        let store = store();
        store.write("foo", "a", Some(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.write("foo", "b", None).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert!(store.exists("foo").await.unwrap());
        assert_eq!(store.time_to_live("foo").await.unwrap(), Expiry::After(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_close_to_expiry_is_not_never() {
        let store = store();
        store.write("foo", "bar", Some(1)).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;

        assert_eq!(store.time_to_live("foo").await.unwrap(), Expiry::After(0));
        let monitor = store.read("foo").await.unwrap();
        assert_eq!(monitor.ttl, Some(Expiry::After(0)));
        assert_eq!(monitor.expire, Expiry::After(1));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let store = store();
        let err = store.read("non-existent").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref n) if n == "non-existent"));
    }

    #[tokio::test]
    async fn test_ttl_missing() {
        let store = store();
        assert!(store.time_to_live("non-existent").await.unwrap_err().is_not_found());
        assert!(store
            .set_time_to_live("non-existent", 10)
            .await
            .unwrap_err()
            .is_not_found());
        // Setting a ttl must not create the monitor
        assert!(!store.exists("non-existent").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_time_to_live() {
        let store = store();
        store.write("foo", "bar", None).await.unwrap();
        assert_eq!(
            store.set_time_to_live("foo", 100).await.unwrap(),
            Expiry::After(100)
        );
        match store.time_to_live("foo").await.unwrap() {
            Expiry::After(secs) => assert!(secs <= 100),
            Expiry::Never => panic!("expected an expiry"),
        }

        // The new expiry sticks for later writes
        store.write("foo", "baz", None).await.unwrap();
        assert_eq!(store.read("foo").await.unwrap().expire, Expiry::After(100));

        store.set_time_to_live("foo", 0).await.unwrap();
        assert_eq!(store.time_to_live("foo").await.unwrap(), Expiry::Never);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = store();
        store.write("foo", "bar", None).await.unwrap();
        store.remove("foo").await.unwrap();

        assert!(!store.exists("foo").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());

        // Idempotent
        store.remove("foo").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_all() {
        let store = store();
        store.write("c", "3", None).await.unwrap();
        store.write("a", "1", None).await.unwrap();
        store.write("b", "2", None).await.unwrap();

        let monitors = store.read_all().await.unwrap();
        let names: Vec<&str> = monitors.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(monitors["a"].text, "1");
        assert_eq!(monitors["b"].text, "2");
        assert_eq!(monitors["c"].text, "3");
    }

    #[tokio::test]
    async fn test_count() {
        let store = store();
        store.write("a", "1", None).await.unwrap();
        store.write("b", "2", None).await.unwrap();
        store.write("c", "3", None).await.unwrap();
        store.write("a", "4", None).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store();
        store.write("foo", "bar", None).await.unwrap();
        store.write("baz", "quux", None).await.unwrap();
        store.clear().await.unwrap();

        assert!(!store.exists("foo").await.unwrap());
        assert!(!store.exists("baz").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.list().await.unwrap().is_empty());

        // Clearing an empty store is fine
        store.clear().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_heals_index_drift() {
        let store = store();
        store.write("short", "x", Some(1)).await.unwrap();
        store.write("long", "y", Some(100)).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        // Expiry removed the key but not the index entry
        assert_eq!(store.count().await.unwrap(), 2);

        let kept = store.sweep().await.unwrap();
        assert_eq!(kept.into_iter().collect::<Vec<_>>(), vec!["long"]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_sweeps_first() {
        let store = store();
        store.write("b", "x", Some(1)).await.unwrap();
        store.write("a", "y", Some(0)).await.unwrap();
        store.write("c", "z", None).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(store.list().await.unwrap(), vec!["a", "c"]);
        assert_eq!(store.read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_keeps_names_it_cannot_check() {
        let backend = Arc::new(FlakyBackend::default());
        let store = MonitorStore::new(backend.clone());
        store.write("good", "1", None).await.unwrap();
        store.write("bad", "2", None).await.unwrap();
        backend.fail(&store.keyspace().monitor_key("bad"));

        let kept = store.sweep().await.unwrap();
        assert!(kept.contains("good"));
        assert!(kept.contains("bad"));
        assert_eq!(store.list().await.unwrap(), vec!["bad", "good"]);
    }

    #[tokio::test]
    async fn test_read_all_surfaces_first_failure() {
        let backend = Arc::new(FlakyBackend::default());
        let store = MonitorStore::new(backend.clone());
        store.write("good", "1", None).await.unwrap();
        store.write("bad", "2", None).await.unwrap();

        backend.fail(&store.keyspace().monitor_key("bad"));

        match store.read_all().await.unwrap_err() {
            StoreError::PartialFailure { name, source } => {
                assert_eq!(name, "bad");
                assert!(matches!(*source, StoreError::Unavailable(_)));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let backend = Arc::new(MemoryBackend::new());
        let store = MonitorStore::new(backend.clone());
        backend
            .execute(&[Command::HashSet {
                key: store.keyspace().monitor_key("junk"),
                fields: vec![
                    ("text".into(), "x".into()),
                    ("modified".into(), "later".into()),
                ],
            }])
            .await
            .unwrap();

        let err = store.read("junk").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { field: "modified", .. }));
    }

    #[tokio::test]
    async fn test_write_repairs_corrupt_record() {
        let backend = Arc::new(MemoryBackend::new());
        let store = MonitorStore::new(backend.clone());
        backend
            .execute(&[Command::HashSet {
                key: store.keyspace().monitor_key("junk"),
                fields: vec![
                    ("text".into(), "x".into()),
                    ("modified".into(), "later".into()),
                    ("updates".into(), "many".into()),
                    ("expire".into(), "120".into()),
                ],
            }])
            .await
            .unwrap();

        let written = store.write("junk", "fixed", None).await.unwrap();
        assert_eq!(written.updates, 1);
        assert_eq!(written.expire, Expiry::After(120));

        let monitor = store.read("junk").await.unwrap();
        assert_eq!(monitor.text, "fixed");
        assert_eq!(monitor.updates, 1);
        assert!(monitor.created <= monitor.modified);
        assert_eq!(store.write("junk", "again", None).await.unwrap().updates, 2);
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_an_error() {
        let store = store();
        let err = store.write("foo", "bar", Some(i64::MAX)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!store.exists("foo").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keyspaces_are_isolated() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let one = MonitorStore::new(backend.clone()).with_keyspace(Keyspace::new("one"));
        let two = MonitorStore::new(backend).with_keyspace(Keyspace::new("two"));

        one.write("foo", "1", None).await.unwrap();
        assert!(!two.exists("foo").await.unwrap());
        two.clear().await.unwrap();
        assert_eq!(one.read("foo").await.unwrap().text, "1");
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_distinct_names() {
        let store = store();
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    for n in 0..10 {
                        let name = format!("m{}", i);
                        let text = format!("{}-{}", i, n);
                        store.write(&name, &text, None).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let monitors = store.read_all().await.unwrap();
        assert_eq!(monitors.len(), 20);
        for i in 0..20 {
            let monitor = &monitors[&format!("m{}", i)];
            assert_eq!(monitor.text, format!("{}-9", i));
            assert_eq!(monitor.updates, 10);
        }
    }
}
