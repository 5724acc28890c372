//! Plain-text and JSON renderings of monitors.

use std::collections::BTreeMap;

use kwikemon_types::Monitor;

/// A single monitor as plain text: just its status text.
pub fn monitor_text(monitor: &Monitor) -> String {
    monitor.text.clone()
}

/// Several monitors as `name: text` lines, sorted by name.
pub fn monitors_text(monitors: &BTreeMap<String, Monitor>) -> String {
    monitors
        .iter()
        .map(|(name, monitor)| format!("{}: {}", name, monitor.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn monitor_json(monitor: &Monitor) -> serde_json::Result<String> {
    serde_json::to_string_pretty(monitor)
}

pub fn monitors_json(monitors: &BTreeMap<String, Monitor>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(monitors)
}
