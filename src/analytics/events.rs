//! Client event log: one JSON line per backend round trip, degraded trace
//! row, or non-fatal warning.
//!
//! Log file: `~/.vcdash/events.jsonl` (see `[logging]` in the config).
//! Writes are best-effort: a failure to log never affects the operation
//! being logged.

use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config;

/// Resolved once per process from the effective config.
static EVENTS_PATH: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
    let cfg = config::load();
    if cfg.logging.enabled {
        expand_home(&cfg.logging.path)
    } else {
        None
    }
});

/// Process-wide switch on top of the config. Off in unit tests.
static ENABLED: AtomicBool = AtomicBool::new(!cfg!(test));

/// Turn event logging on or off for the rest of the process, regardless of
/// the config. Test harnesses turn it off to keep the user's log clean.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    BackendCall {
        method: String,
        path: String,
        ok: bool,
        latency_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    DecodeDegraded {
        row_id: String,
        reason: String,
    },
    Warning {
        message: String,
    },
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEvent {
    pub timestamp: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ClientEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Append an event to the log, if logging is enabled.
pub fn log_event(event: &ClientEvent) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    if let Some(path) = EVENTS_PATH.as_deref() {
        let _ = append_event(path, event);
    }
}

/// Convenience: log one backend round trip.
pub fn log_backend_call(method: &str, path: &str, latency_ms: u64, error: Option<&str>) {
    log_event(&ClientEvent::now(EventKind::BackendCall {
        method: method.to_string(),
        path: path.to_string(),
        ok: error.is_none(),
        latency_ms,
        error: error.map(str::to_string),
    }));
}

/// Convenience: log a trace row that could not be decoded.
pub fn log_decode_degraded(row_id: &str, reason: &str) {
    log_event(&ClientEvent::now(EventKind::DecodeDegraded {
        row_id: row_id.to_string(),
        reason: reason.to_string(),
    }));
}

/// Convenience: log a non-fatal warning.
pub fn log_warning(message: &str) {
    log_event(&ClientEvent::now(EventKind::Warning {
        message: message.to_string(),
    }));
}

fn append_event(path: &Path, event: &ClientEvent) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(event)?;
    writeln!(file, "{json}")?;

    Ok(())
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None if path == "~" => dirs::home_dir(),
        None if path.is_empty() => None,
        None => Some(PathBuf::from(path)),
    }
}

/// Path of the event log, or `None` when logging is disabled.
pub fn events_log_path() -> Option<PathBuf> {
    EVENTS_PATH.clone()
}
