//! # kwikemon
//!
//! Monitor anything: named status lines that expire unless refreshed.
//!
//! A program writes a line of status text to a named monitor, for example
//! the progress of a backup or the last heartbeat of a worker. Each write
//! restarts the monitor's expiry clock. A monitor that has gone missing is
//! therefore a signal in itself: whatever was writing it stopped.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  stdout of some program                                      │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ MonitorWriter│──▶│ LineSplitter │──▶│   MonitorStore   │  │
//! │  │   (writer)   │   │   (lines)    │   │     (store)      │  │
//! │  └──────────────┘   └──────────────┘   └────────┬─────────┘  │
//! │                                                 │            │
//! │                                                 ▼            │
//! │                                  Backend: RedisBackend |     │
//! │                                           MemoryBackend      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`store`]**: [`MonitorStore`], keyed read/write/expire/list/sweep
//! - **[`lines`]**: [`LineSplitter`], bytes in, complete lines out
//! - **[`writer`]**: [`MonitorWriter`], one monitor update per line
//! - **[`backend`]**: the [`Backend`] trait over the key-value store
//! - **[`config`]**: [`Settings`] loaded from `~/.kwikemon.toml` and the
//!   environment
//! - **[`render`]**: plain-text and JSON output
//!
//! ## Storage layout
//!
//! Data is shared with other kwikemon implementations, so the layout is
//! fixed: each monitor is a hash at `kwikemon:monitor:<name>` with the
//! fields `text`, `created`, `modified`, `updates` and `expire`, and the
//! set `kwikemon:monitors` indexes the names.
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Set a monitor that expires in ten minutes
//! kwikemon set backup --ttl 600 "copying /home"
//!
//! # Turn every line a program prints into an update
//! rsync -av --info=progress2 src/ dst/ | kwikemon pipe backup --tee
//!
//! # Everything still alive
//! kwikemon all
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use kwikemon::{Expiry, MemoryBackend, MonitorStore};
//!
//! # tokio_test::block_on(async {
//! let store = MonitorStore::new(Arc::new(MemoryBackend::new()));
//! store.write("worker-1", "idle", Some(0)).await.unwrap();
//!
//! assert!(store.exists("worker-1").await.unwrap());
//! assert_eq!(store.time_to_live("worker-1").await.unwrap(), Expiry::Never);
//! # });
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod lines;
pub mod render;
pub mod store;
pub mod writer;

// Re-export main types for convenience
pub use backend::{Backend, Command, MemoryBackend};
#[cfg(feature = "redis")]
pub use backend::RedisBackend;
pub use config::{RedisConfig, Settings};
pub use error::{StoreError, WriterError};
pub use kwikemon_types::{Expiry, Keyspace, Monitor, DEFAULT_PREFIX, DEFAULT_TTL_SECS};
pub use lines::LineSplitter;
pub use store::MonitorStore;
pub use writer::{MonitorUpdate, MonitorWriter};
