//! # kwikemon-types
//!
//! Core types shared by every kwikemon component: the [`Monitor`] record,
//! its [`Expiry`] policy and the [`Keyspace`] that maps monitor names onto
//! storage keys.
//!
//! A monitor is a named line of status text that an external process keeps
//! refreshing. Each write pushes the expiry further into the future, so a
//! monitor that disappears is a signal that its writer stopped.
//!
//! ## Features
//!
//! - `serde`: JSON (and other formats) via serde
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use kwikemon_types::{Expiry, Keyspace, Monitor};
//!
//! let keys = Keyspace::default();
//! assert_eq!(keys.monitor_key("backup"), "kwikemon:monitor:backup");
//! assert_eq!(keys.index_key(), "kwikemon:monitors");
//!
//! let fields: HashMap<String, String> = [
//!     ("text", "42% done"),
//!     ("created", "1700000000000"),
//!     ("modified", "1700000005000"),
//!     ("updates", "3"),
//!     ("expire", "300"),
//! ]
//! .into_iter()
//! .map(|(k, v)| (k.to_string(), v.to_string()))
//! .collect();
//!
//! let monitor = Monitor::from_fields("backup", &fields, Expiry::default()).unwrap();
//! assert_eq!(monitor.text, "42% done");
//! assert_eq!(monitor.updates, 3);
//! assert_eq!(monitor.expire, Expiry::After(300));
//! ```

mod expiry;
mod keys;
mod monitor;

pub use expiry::*;
pub use keys::*;
pub use monitor::*;
