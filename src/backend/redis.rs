//! Redis backend.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::debug;

use super::{Backend, Command};
use crate::config::RedisConfig;
use crate::error::StoreError;

/// A [`Backend`] talking to a Redis server.
///
/// Uses a [`ConnectionManager`], which multiplexes commands over one
/// connection and reconnects after failures. Cloning is cheap and clones
/// share the connection.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use kwikemon::{MonitorStore, RedisBackend, RedisConfig};
///
/// # tokio_test::block_on(async {
/// let backend = RedisBackend::connect(&RedisConfig::default()).await?;
/// let store = MonitorStore::new(Arc::new(backend));
/// store.write("nightly", "started", Some(3600)).await?;
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
    description: String,
}

impl RedisBackend {
    /// Connect using the given settings.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: config.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)?;
        let connection = ConnectionManager::new(client).await?;
        let description = format!("redis://{}:{}/{}", config.host, config.port, config.db);
        debug!("Connected to {}", description);

        Ok(Self {
            connection,
            description,
        })
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("server", &self.description)
            .finish()
    }
}

fn add_command(pipe: &mut redis::Pipeline, command: &Command) {
    match command {
        Command::HashSet { key, fields } => {
            // HSET with several pairs replies with an integer, unlike HMSET
            let cmd = pipe.cmd("HSET").arg(key);
            for (field, value) in fields {
                cmd.arg(field).arg(value);
            }
        }
        Command::HashIncrement { key, field, by } => {
            pipe.cmd("HINCRBY").arg(key).arg(field).arg(*by);
        }
        Command::Expire { key, seconds } => {
            pipe.cmd("EXPIRE").arg(key).arg(*seconds);
        }
        Command::Persist { key } => {
            pipe.cmd("PERSIST").arg(key);
        }
        Command::Delete { key } => {
            pipe.cmd("DEL").arg(key);
        }
        Command::SetAdd { key, member } => {
            pipe.cmd("SADD").arg(key).arg(member);
        }
        Command::SetRemove { key, member } => {
            pipe.cmd("SREM").arg(key).arg(member);
        }
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(exists)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(fields)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(ttl)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await?;
        Ok(members)
    }

    async fn set_cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        let count: u64 = redis::cmd("SCARD").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    async fn execute(&self, commands: &[Command]) -> Result<Vec<i64>, StoreError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in commands {
            add_command(&mut pipe, command);
        }
        let mut conn = self.connection.clone();
        let replies: Vec<i64> = pipe.query_async(&mut conn).await?;
        Ok(replies)
    }
}
