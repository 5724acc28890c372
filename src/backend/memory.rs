//! In-process backend.
//!
//! Mirrors the Redis semantics the monitor store relies on, including lazy
//! expiry: an expired key disappears, but nothing else (in particular the
//! index set) is touched when it does.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{Backend, Command, TTL_MISSING, TTL_PERSISTENT};
use crate::error::StoreError;

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A [`Backend`] that keeps everything in memory.
///
/// Deadlines use `tokio::time::Instant`, so tests running with paused time
/// can expire monitors with `tokio::time::advance`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kwikemon::{MemoryBackend, MonitorStore};
///
/// # tokio_test::block_on(async {
/// let store = MonitorStore::new(Arc::new(MemoryBackend::new()));
/// store.write("build", "passing", None).await.unwrap();
/// assert_eq!(store.read("build").await.unwrap().text, "passing");
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, hashes and sets alike.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live<R>(&self, key: &str, f: impl FnOnce(Option<&Entry>) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        f(entries.get(key))
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Unavailable(format!(
        "WRONGTYPE operation against key {} holding the wrong kind of value",
        key
    ))
}

fn hash_mut<'a>(
    slot: &'a mut Option<Entry>,
    key: &str,
) -> Result<&'a mut HashMap<String, String>, StoreError> {
    let entry = slot.get_or_insert_with(|| Entry {
        value: Value::Hash(HashMap::new()),
        expires_at: None,
    });
    match &mut entry.value {
        Value::Hash(fields) => Ok(fields),
        Value::Set(_) => Err(wrong_type(key)),
    }
}

fn set_mut<'a>(
    slot: &'a mut Option<Entry>,
    key: &str,
) -> Result<&'a mut BTreeSet<String>, StoreError> {
    let entry = slot.get_or_insert_with(|| Entry {
        value: Value::Set(BTreeSet::new()),
        expires_at: None,
    });
    match &mut entry.value {
        Value::Set(members) => Ok(members),
        Value::Hash(_) => Err(wrong_type(key)),
    }
}

fn apply(
    slot: &mut Option<Entry>,
    command: &Command,
    now: Instant,
) -> Result<i64, StoreError> {
    match command {
        Command::HashSet { key, fields } => {
            let hash = hash_mut(slot, key)?;
            let mut added = 0;
            for (field, value) in fields {
                if hash.insert(field.clone(), value.clone()).is_none() {
                    added += 1;
                }
            }
            Ok(added)
        }
        Command::HashIncrement { key, field, by } => {
            let hash = hash_mut(slot, key)?;
            let current = match hash.get(field) {
                Some(raw) => raw.parse::<i64>().map_err(|_| {
                    StoreError::Unavailable("hash value is not an integer".to_string())
                })?,
                None => 0,
            };
            let next = current + by;
            hash.insert(field.clone(), next.to_string());
            Ok(next)
        }
        Command::Expire { seconds, .. } => match slot {
            Some(entry) => {
                let at = now
                    .checked_add(Duration::from_secs(*seconds))
                    .ok_or_else(|| {
                        StoreError::Unavailable(format!(
                            "invalid expire time in 'expire' command: {}",
                            seconds
                        ))
                    })?;
                entry.expires_at = Some(at);
                Ok(1)
            }
            None => Ok(0),
        },
        Command::Persist { .. } => match slot {
            Some(entry) if entry.expires_at.is_some() => {
                entry.expires_at = None;
                Ok(1)
            }
            _ => Ok(0),
        },
        Command::Delete { .. } => Ok(i64::from(slot.take().is_some())),
        Command::SetAdd { key, member } => {
            let members = set_mut(slot, key)?;
            Ok(i64::from(members.insert(member.clone())))
        }
        Command::SetRemove { key, member } => {
            let removed = match slot {
                Some(Entry {
                    value: Value::Set(members),
                    ..
                }) => members.remove(member),
                Some(_) => return Err(wrong_type(key)),
                None => false,
            };
            // Redis drops empty sets
            if matches!(slot, Some(Entry { value: Value::Set(m), .. }) if m.is_empty()) {
                *slot = None;
            }
            Ok(i64::from(removed))
        }
    }
}

fn command_key(command: &Command) -> &str {
    match command {
        Command::HashSet { key, .. }
        | Command::HashIncrement { key, .. }
        | Command::Expire { key, .. }
        | Command::Persist { key }
        | Command::Delete { key }
        | Command::SetAdd { key, .. }
        | Command::SetRemove { key, .. } => key,
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live(key, |entry| entry.is_some()))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.live(key, |entry| match entry {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields.clone()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        Ok(self.live(key, |entry| match entry {
            None => TTL_MISSING,
            Some(Entry {
                expires_at: None, ..
            }) => TTL_PERSISTENT,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(now);
                ((remaining.as_millis() + 500) / 1000) as i64
            }
        }))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.live(key, |entry| match entry {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_cardinality(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.set_members(key).await?.len() as u64)
    }

    async fn execute(&self, commands: &[Command]) -> Result<Vec<i64>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        // Work on copies of the touched keys so a failing command leaves
        // nothing half-applied.
        let mut scratch: HashMap<String, Option<Entry>> = HashMap::new();
        for command in commands {
            let key = command_key(command);
            if !scratch.contains_key(key) {
                let current = entries.get(key).filter(|e| !e.is_expired(now)).cloned();
                scratch.insert(key.to_string(), current);
            }
        }

        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            let slot = scratch
                .get_mut(command_key(command))
                .ok_or_else(|| StoreError::Unavailable("batch key vanished".to_string()))?;
            replies.push(apply(slot, command, now)?);
        }

        for (key, slot) in scratch {
            match slot {
                Some(entry) => {
                    entries.insert(key, entry);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }

        Ok(replies)
    }
}
