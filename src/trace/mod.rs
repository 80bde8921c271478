//! Trace reconciliation pipeline.
//!
//! Turns persisted log rows into normalized [`TraceEntry`] values and keeps
//! them in a newest-first [`TraceList`]. The list is replaced wholesale on
//! every reload; session entries created before the next reload are
//! inserted by the conversation session.

pub mod decode;
pub mod filter;

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::analytics::events;
use crate::backend::Backend;
use crate::backend::wire::{self, Command, CommandResult, LogRow};
use crate::error::ClientError;

pub use filter::{Cardinality, TraceFilter};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Unique key of a trace entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TraceId {
    /// Backend log id of a persisted row.
    Log(String),
    /// Entry created in this session, numbered in send order.
    Local(u64),
}

impl TraceId {
    /// Parse the textual form produced by `Display`.
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix("local-").and_then(|n| n.parse().ok()) {
            Some(seq) => Self::Local(seq),
            None => Self::Log(text.to_string()),
        }
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log(id) => f.write_str(id),
            Self::Local(seq) => write!(f, "local-{seq}"),
        }
    }
}

/// One reconciled view of a single chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub id: TraceId,
    /// 1-based display position; recomputed whenever the list changes.
    pub display_index: usize,
    pub user_input: String,
    /// Normalized payload: decoded response fields plus `user_input` and
    /// `latency_ms` stamped from the row itself.
    pub payload: Map<String, Value>,
    pub latency_ms: u64,
    pub token_count: u64,
    /// Backend log id, when known, for entries created in this session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    /// Row time as reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// The stored payload could not be decoded by either syntax.
    pub degraded: bool,
}

impl TraceEntry {
    /// Build an entry from a normalized payload.
    pub fn new(id: TraceId, user_input: String, latency_ms: u64, payload: Map<String, Value>) -> Self {
        let token_count = wire::token_count(&payload);
        Self {
            id,
            display_index: 0,
            user_input,
            payload,
            latency_ms,
            token_count,
            log_id: None,
            created_at: None,
            degraded: false,
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        wire::parse_list(self.payload.get("commands"))
    }

    pub fn results(&self) -> Vec<CommandResult> {
        wire::parse_list(self.payload.get("results"))
    }

    /// Number of recognized commands (0 when none were recorded).
    pub fn command_count(&self) -> usize {
        match self.payload.get("commands") {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    /// Distinct modules across the recognized commands.
    pub fn modules(&self) -> BTreeSet<String> {
        self.commands()
            .into_iter()
            .map(|c| c.module)
            .filter(|m| !m.is_empty())
            .collect()
    }

    /// The agent's reply: `reply`, else `summary`.
    pub fn reply(&self) -> Option<&str> {
        ["reply", "summary"]
            .iter()
            .filter_map(|k| self.payload.get(*k).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }

    /// A `curl` invocation that replays this exchange against `base_url`.
    pub fn curl_command(&self, base_url: &str) -> String {
        let body = serde_json::json!({ "message": self.user_input, "history": [] });
        let body = body.to_string().replace('\'', "'\\''");
        format!(
            "curl -X POST {}/chat \\\n  -H \"Content-Type: application/json\" \\\n  -d '{}'",
            base_url.trim_end_matches('/'),
            body
        )
    }
}

/// Render a latency in seconds with one decimal, e.g. `1234` → `"1.2s"`.
pub fn format_latency(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// A row whose stored payload could not be decoded. Non-fatal: the row is
/// still shown, with only the fields taken from its own columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeDegraded {
    pub row_id: String,
    pub reason: String,
}

/// Result of reconciling one batch of log rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    /// Entries in row order.
    pub entries: Vec<TraceEntry>,
    pub degraded: Vec<DecodeDegraded>,
}

/// Normalize one log row.
pub fn reconcile_row(row: &LogRow) -> (TraceEntry, Option<DecodeDegraded>) {
    let latency_ms = row.latency_ms.unwrap_or(0);
    let stamp = |mut payload: Map<String, Value>| {
        payload.insert("user_input".to_string(), Value::String(row.user_input.clone()));
        payload.insert("latency_ms".to_string(), Value::from(latency_ms));
        payload
    };

    // Blank text is how older backends store "no payload".
    let raw = row.raw_response.as_deref().filter(|t| !t.trim().is_empty());
    let (payload, degraded) = match raw {
        None => (stamp(Map::new()), None),
        Some(text) => match decode::decode_payload(text) {
            Some(decoded) => (stamp(decoded), None),
            None => (
                stamp(Map::new()),
                Some(DecodeDegraded {
                    row_id: row.id.clone(),
                    reason: degraded_reason(text),
                }),
            ),
        },
    };

    let mut entry = TraceEntry::new(
        TraceId::Log(row.id.clone()),
        row.user_input.clone(),
        latency_ms,
        payload,
    );
    entry.log_id = Some(row.id.clone());
    entry.created_at = row.created_at.clone();
    entry.degraded = degraded.is_some();
    (entry, degraded)
}

fn degraded_reason(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(_) => "payload is not an object".to_string(),
        Err(e) => format!("undecodable payload: {e}"),
    }
}

/// Normalize a batch of rows. Never drops a row.
pub fn reconcile(rows: &[LogRow]) -> Reconciled {
    let mut out = Reconciled {
        entries: Vec::with_capacity(rows.len()),
        degraded: Vec::new(),
    };
    for row in rows {
        let (entry, degraded) = reconcile_row(row);
        out.entries.push(entry);
        out.degraded.extend(degraded);
    }
    out
}

// ---------------------------------------------------------------------------
// Trace list
// ---------------------------------------------------------------------------

/// Newest-first list of trace entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceList {
    entries: Vec<TraceEntry>,
}

impl TraceList {
    /// Build from entries already ordered newest-first.
    pub fn from_entries(entries: Vec<TraceEntry>) -> Self {
        let mut list = Self { entries };
        list.renumber();
        list
    }

    /// Fetch the latest `limit` rows and replace the whole list.
    ///
    /// Returns the rows that reconciled in degraded form. The list is left
    /// untouched if the fetch fails.
    pub fn reload<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        limit: usize,
    ) -> Result<Vec<DecodeDegraded>, ClientError> {
        let rows = backend.logs(limit)?;
        let reconciled = reconcile(&rows);
        for d in &reconciled.degraded {
            events::log_decode_degraded(&d.row_id, &d.reason);
        }
        *self = Self::from_entries(reconciled.entries);
        Ok(reconciled.degraded)
    }

    /// Insert a session entry, newest-first by send order, and renumber.
    ///
    /// A local entry goes above every persisted entry and above local
    /// entries sent before it, but beneath local entries sent after it that
    /// already resolved.
    pub fn insert_session_entry(&mut self, entry: TraceEntry) {
        let position = match entry.id {
            TraceId::Local(seq) => self
                .entries
                .iter()
                .position(|e| !matches!(e.id, TraceId::Local(other) if other > seq))
                .unwrap_or(self.entries.len()),
            TraceId::Log(_) => 0,
        };
        self.entries.insert(position, entry);
        self.renumber();
    }

    fn renumber(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.display_index = i + 1;
        }
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &TraceId) -> Option<&TraceEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Entries passing `filter`, in list order. The list itself is unchanged.
    pub fn filtered(&self, filter: &TraceFilter) -> Vec<&TraceEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    /// Distinct modules across all entries, for the module filter choices.
    pub fn modules(&self) -> BTreeSet<String> {
        self.entries.iter().flat_map(TraceEntry::modules).collect()
    }
}
