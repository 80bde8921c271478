//! JSON API handlers for the dashboard.
//!
//! Each handler corresponds to one endpoint and returns a [`Reply`]: an
//! HTTP status plus a JSON body. Backend failures become `{"error": ...}`
//! bodies with a status derived from the [`ClientError`] kind.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::analytics::reporter;
use crate::backend::Backend;
use crate::error::ClientError;
use crate::knowledge::SnapshotId;
use crate::locale::Locale;
use crate::session::TurnOutcome;
use crate::trace::{Cardinality, TraceFilter, TraceId};

use super::Dashboard;

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Status and JSON body of one API response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(500, "internal", &format!("failed to serialize response: {e}")),
        }
    }

    fn error(status: u16, kind: &str, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message, "kind": kind }),
        }
    }

    pub(super) fn not_found(message: &str) -> Self {
        Self::error(404, "not_found", message)
    }

    pub(super) fn bad_request(message: &str) -> Self {
        Self::error(400, "bad_request", message)
    }

    /// Map a backend failure, keeping the backend's detail verbatim.
    fn from_client_error(err: &ClientError, locale: Locale) -> Self {
        match err {
            ClientError::Unavailable(detail) => Self::error(
                502,
                "unavailable",
                &format!("{}: {detail}", locale.connect_error()),
            ),
            ClientError::Import(detail) => Self::error(400, "import", detail),
            ClientError::NotFound(detail) => Self::error(404, "not_found", detail),
            ClientError::Conflict(detail) => Self::error(409, "conflict", detail),
            ClientError::EmptyMessage => Self::error(400, "empty_message", &err.to_string()),
            ClientError::Backend { .. } | ClientError::InvalidResponse { .. } => Self::error(
                502,
                "backend",
                &format!("{}: {}", locale.request_failed(), err.detail()),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
struct ChatBody {
    message: String,
}

// ---------------------------------------------------------------------------
// Query helpers
// ---------------------------------------------------------------------------

/// Value of query parameter `key`, percent-decoded. Empty values count as
/// absent.
fn query_param(url: &str, key: &str) -> Option<String> {
    url.split_once('?')?.1.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k != key {
            return None;
        }
        // Form encoding: `+` is a space, a literal plus arrives as `%2B`.
        let v = percent_decode(&v.replace('+', " "));
        (!v.is_empty()).then_some(v)
    })
}

/// Decode `%XX` escapes in a path segment or query value. Invalid escapes
/// are kept literally; invalid UTF-8 is replaced.
fn percent_decode(input: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes())).into_owned()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// `GET /api/health`: backend reachability. Always 200; an unreachable
/// backend is reported in the body.
pub fn get_health<B: Backend>(dash: &Dashboard<B>) -> Reply {
    match dash.backend.health() {
        Ok(body) => Reply::ok(&json!({
            "reachable": true,
            "backend_url": dash.base_url,
            "backend": body,
        })),
        Err(e) => Reply::ok(&json!({
            "reachable": false,
            "backend_url": dash.base_url,
            "error": format!("{}: {}", dash.locale.connect_error(), e.detail()),
        })),
    }
}

// ---------------------------------------------------------------------------
// Knowledge
// ---------------------------------------------------------------------------

/// `GET /api/knowledge?q=&domain=&reload=1`: rules and resolved intents
/// of the active snapshot, optionally searched.
pub fn get_knowledge<B: Backend>(dash: &mut Dashboard<B>, url: &str) -> Reply {
    if query_param(url, "reload").is_some() {
        dash.knowledge.refresh(&dash.backend);
    }

    let keyword = query_param(url, "q");
    let domain = query_param(url, "domain");
    let kb = dash.knowledge.knowledge();
    let intents = kb.search(keyword.as_deref(), domain.as_deref());

    Reply::ok(&json!({
        "active": dash.knowledge.active(),
        "rules": kb.rules,
        "domains": kb.domains(),
        "total_intents": kb.intents.len(),
        "intents": intents,
        "warnings": dash.knowledge.warnings(),
    }))
}

/// `GET /api/knowledge/files`: the snapshot list, exactly one active.
pub fn get_knowledge_files<B: Backend>(dash: &Dashboard<B>) -> Reply {
    Reply::ok(&json!({
        "files": dash.knowledge.snapshots(),
        "warnings": dash.knowledge.warnings(),
    }))
}

/// `POST /api/knowledge/upload?name=<file name>`: raw file bytes as body.
pub fn post_upload<B: Backend>(dash: &mut Dashboard<B>, url: &str, body: &[u8]) -> Reply {
    let Some(name) = query_param(url, "name") else {
        return Reply::bad_request("missing ?name= for the uploaded file");
    };
    if body.is_empty() {
        return Reply::bad_request("uploaded file is empty");
    }

    match dash.knowledge.upload(&dash.backend, body, &name) {
        Ok(report) => Reply::ok(&json!({
            "report": report,
            "files": dash.knowledge.snapshots(),
            "total_intents": dash.knowledge.knowledge().intents.len(),
        })),
        Err(e) => Reply::from_client_error(&e, dash.locale),
    }
}

/// `POST /api/knowledge/activate/{id}`
pub fn post_activate<B: Backend>(dash: &mut Dashboard<B>, id: &str) -> Reply {
    let id = SnapshotId::new(percent_decode(id));
    match dash.knowledge.activate(&dash.backend, &id) {
        Ok(()) => Reply::ok(&json!({
            "active": dash.knowledge.active(),
            "files": dash.knowledge.snapshots(),
        })),
        Err(e) => Reply::from_client_error(&e, dash.locale),
    }
}

/// `DELETE /api/knowledge/files/{id}`
pub fn delete_file<B: Backend>(dash: &mut Dashboard<B>, id: &str) -> Reply {
    let id = SnapshotId::new(percent_decode(id));
    match dash.knowledge.delete(&dash.backend, &id) {
        Ok(()) => Reply::ok(&json!({ "deleted": id, "files": dash.knowledge.snapshots() })),
        Err(e) => Reply::from_client_error(&e, dash.locale),
    }
}

// ---------------------------------------------------------------------------
// Traces
// ---------------------------------------------------------------------------

/// `GET /api/traces?type=single|multi&module=&q=`: filtered view of the
/// trace list. The list itself is not modified.
pub fn get_traces<B: Backend>(dash: &Dashboard<B>, url: &str) -> Reply {
    let cardinality = match query_param(url, "type") {
        Some(kind) => match Cardinality::parse(&kind) {
            Some(c) => Some(c),
            None => return Reply::bad_request(&format!("unknown trace type '{kind}'")),
        },
        None => None,
    };
    let filter = TraceFilter {
        cardinality,
        module: query_param(url, "module"),
        keyword: query_param(url, "q"),
    };

    Reply::ok(&json!({
        "total": dash.traces.len(),
        "modules": dash.traces.modules(),
        "entries": dash.traces.filtered(&filter),
    }))
}

/// `GET /api/traces/{id}`: one entry with its replay command.
pub fn get_trace<B: Backend>(dash: &Dashboard<B>, id: &str) -> Reply {
    let id = TraceId::parse(&percent_decode(id));
    match dash.traces.get(&id) {
        Some(entry) => Reply::ok(&json!({
            "entry": entry,
            "commands": entry.commands(),
            "results": entry.results(),
            "reply": entry.reply(),
            "curl": entry.curl_command(&dash.base_url),
        })),
        None => Reply::not_found(&format!("no trace entry {id}")),
    }
}

/// `POST /api/traces/reload`: replace the list from `GET /logs`.
pub fn post_traces_reload<B: Backend>(dash: &mut Dashboard<B>) -> Reply {
    match dash.traces.reload(&dash.backend, dash.trace_limit) {
        Ok(degraded) => Reply::ok(&json!({
            "total": dash.traces.len(),
            "degraded": degraded,
        })),
        Err(e) => Reply::from_client_error(&e, dash.locale),
    }
}

/// `GET /api/stats`: aggregate statistics over the current trace list.
pub fn get_stats<B: Backend>(dash: &Dashboard<B>) -> Reply {
    Reply::ok(&reporter::build_stats(dash.traces.entries()))
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// `GET /api/transcript`
pub fn get_transcript<B: Backend>(dash: &Dashboard<B>) -> Reply {
    Reply::ok(&json!({
        "state": dash.session.state(),
        "messages": dash.session.transcript(),
    }))
}

/// `POST /api/transcript/clear`: the trace list is kept.
pub fn post_transcript_clear<B: Backend>(dash: &mut Dashboard<B>) -> Reply {
    dash.session.clear();
    Reply::ok(&json!({ "messages": [] }))
}

/// `POST /api/chat` with `{"message": "..."}`.
///
/// A failed turn still answers 200: the transcript gained the localized
/// error message, which is the result the caller renders.
pub fn post_chat<B: Backend>(dash: &mut Dashboard<B>, body: &[u8]) -> Reply {
    let request: ChatBody = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return Reply::bad_request(&format!("invalid chat request: {e}")),
    };

    let outcome = match dash.session.send(&dash.backend, &request.message, &mut dash.traces) {
        Ok(outcome) => outcome,
        Err(e) => return Reply::from_client_error(&e, dash.locale),
    };

    let message = dash.session.transcript().last();
    match outcome {
        TurnOutcome::Delivered { trace_id } => Reply::ok(&json!({
            "delivered": true,
            "message": message,
            "trace": dash.traces.get(&trace_id),
        })),
        TurnOutcome::Failed { error } => Reply::ok(&json!({
            "delivered": false,
            "message": message,
            "error": error.to_string(),
        })),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
