/// HTTP client for the command backend.
///
/// Uses the synchronous `ureq` client with a per-request timeout. Each call
/// is one independent round trip: no retries, no shared session state.
/// Every round trip is recorded in the event log (best-effort).
///
/// Status codes are mapped onto [`ClientError`] per operation, and the
/// backend's `{"detail": ...}` text is carried through verbatim.
use std::io::Read;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::multipart;
use super::wire::{ChatRequest, ChatResponse, CommandItem, KnowledgePayload, LogRow, UploadReport};
use super::Backend;
use crate::analytics::events;
use crate::config::VcdashConfig;
use crate::error::ClientError;
use crate::knowledge::snapshot::{KnowledgeSnapshot, SnapshotId};
use crate::locale::Locale;

/// `filename="..."` in a `Content-Disposition` header.
static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).expect("filename regex must compile")
});

// ---------------------------------------------------------------------------
// Operation-specific status mapping
// ---------------------------------------------------------------------------

/// Which kind of call produced a status, for mapping it onto the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Read,
    Upload,
    Activate,
    Delete,
    Chat,
}

fn map_status(op: Operation, status: u16, detail: String) -> ClientError {
    match (op, status) {
        (_, 404) => ClientError::NotFound(detail),
        (_, 409) => ClientError::Conflict(detail),
        (Operation::Upload, 400 | 415 | 422) => ClientError::Import(detail),
        (Operation::Delete, 400 | 403) => ClientError::Conflict(detail),
        _ => ClientError::Backend { status, detail },
    }
}

/// Pull the human-readable detail out of an error body.
///
/// Prefers a JSON `detail` (string, or anything else rendered as JSON), then
/// `error`/`message`, then the raw body text.
fn extract_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "error", "message"] {
            match map.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                Some(Value::Null) | None => {}
                Some(other) => return Some(other.to_string()),
            }
        }
    }
    Some(body.to_string())
}

/// Server-suggested file name from a `Content-Disposition` header.
fn disposition_file_name(header: &str) -> Option<String> {
    FILENAME_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

enum Body<'a> {
    Empty,
    Json(Value),
    Bytes { content_type: &'a str, bytes: &'a [u8] },
}

/// A downloaded file (`/knowledge/template`, `/knowledge/export`), unparsed.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Synchronous backend client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    timeout: Duration,
    locale: Locale,
}

impl HttpBackend {
    /// Build a client from the resolved config.
    pub fn from_config(config: &VcdashConfig) -> Self {
        Self::new(
            &config.backend.url,
            Duration::from_millis(config.backend.timeout_ms),
            config.general.locale,
        )
    }

    pub fn new(base_url: &str, timeout: Duration, locale: Locale) -> Self {
        let base_url = pin_localhost(base_url.trim_end_matches('/'));
        Self {
            base_url,
            timeout,
            locale,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path, for links handed to a user agent.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch a file endpoint as raw bytes.
    pub fn download(&self, path: &str) -> Result<Download, ClientError> {
        let resp = self.send(Operation::Read, "GET", path, Body::Empty)?;
        let file_name = resp
            .header("Content-Disposition")
            .and_then(disposition_file_name);
        let mut bytes = Vec::new();
        resp.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| ClientError::Unavailable(format!("{path}: {e}")))?;
        Ok(Download { file_name, bytes })
    }

    /// Perform one round trip, mapping transport and status failures.
    fn send(
        &self,
        op: Operation,
        method: &str,
        path: &str,
        body: Body<'_>,
    ) -> Result<ureq::Response, ClientError> {
        let url = self.url_for(path);
        let request = ureq::request(method, &url).timeout(self.timeout);

        let start = Instant::now();
        let result = match body {
            Body::Empty => request.call(),
            Body::Json(value) => request.send_json(value),
            Body::Bytes {
                content_type,
                bytes,
            } => request.set("Content-Type", content_type).send_bytes(bytes),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(status, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                let detail = extract_detail(&text)
                    .unwrap_or_else(|| self.locale.request_failed().to_string());
                Err(map_status(op, status, detail))
            }
            Err(ureq::Error::Transport(t)) => Err(ClientError::Unavailable(t.to_string())),
        };

        events::log_backend_call(
            method,
            path,
            latency_ms,
            outcome.as_ref().err().map(ToString::to_string).as_deref(),
        );
        outcome
    }

    fn read_json<T: DeserializeOwned>(resp: ureq::Response, path: &str) -> Result<T, ClientError> {
        resp.into_json::<T>()
            .map_err(|e| ClientError::InvalidResponse {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Backend for HttpBackend {
    fn health(&self) -> Result<Value, ClientError> {
        let resp = self.send(Operation::Read, "GET", "/", Body::Empty)?;
        Self::read_json(resp, "/")
    }

    fn knowledge(&self) -> Result<KnowledgePayload, ClientError> {
        let resp = self.send(Operation::Read, "GET", "/knowledge", Body::Empty)?;
        Self::read_json(resp, "/knowledge")
    }

    fn list_snapshots(&self) -> Result<Vec<KnowledgeSnapshot>, ClientError> {
        let resp = self.send(Operation::Read, "GET", "/knowledge/files", Body::Empty)?;
        Self::read_json(resp, "/knowledge/files")
    }

    fn upload_snapshot(&self, bytes: &[u8], file_name: &str) -> Result<UploadReport, ClientError> {
        let body = multipart::single_file(bytes, file_name);
        let resp = self.send(
            Operation::Upload,
            "POST",
            "/knowledge/upload",
            Body::Bytes {
                content_type: &body.content_type,
                bytes: &body.bytes,
            },
        )?;
        Self::read_json(resp, "/knowledge/upload")
    }

    fn activate_snapshot(&self, id: &SnapshotId) -> Result<(), ClientError> {
        let path = format!("/knowledge/activate/{}", path_segment(id.as_str()));
        self.send(Operation::Activate, "POST", &path, Body::Empty)?;
        Ok(())
    }

    fn delete_snapshot(&self, id: &SnapshotId) -> Result<(), ClientError> {
        let path = format!("/knowledge/files/{}", path_segment(id.as_str()));
        self.send(Operation::Delete, "DELETE", &path, Body::Empty)?;
        Ok(())
    }

    fn logs(&self, limit: usize) -> Result<Vec<LogRow>, ClientError> {
        let path = format!("/logs?limit={limit}");
        let resp = self.send(Operation::Read, "GET", &path, Body::Empty)?;
        Self::read_json(resp, "/logs")
    }

    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::InvalidResponse {
            endpoint: "/chat".to_string(),
            reason: e.to_string(),
        })?;
        let resp = self.send(Operation::Chat, "POST", "/chat", Body::Json(body))?;
        let value: Value = Self::read_json(resp, "/chat")?;
        ChatResponse::from_value(value).map_err(|reason| ClientError::InvalidResponse {
            endpoint: "/chat".to_string(),
            reason,
        })
    }

    fn recognize(&self, message: &str) -> Result<Value, ClientError> {
        let body = serde_json::json!({ "message": message });
        let resp = self.send(Operation::Chat, "POST", "/chat/recognize", Body::Json(body))?;
        Self::read_json(resp, "/chat/recognize")
    }

    fn execute(&self, commands: &[CommandItem]) -> Result<Value, ClientError> {
        let body = serde_json::json!({ "commands": commands });
        let resp = self.send(Operation::Chat, "POST", "/chat/execute", Body::Json(body))?;
        Self::read_json(resp, "/chat/execute")
    }
}

/// Rewrite a host of exactly `localhost` to `127.0.0.1`: "localhost" may
/// resolve to ::1 first while the backend only binds IPv4.
fn pin_localhost(url: &str) -> String {
    if let Some((scheme, rest)) = url.split_once("://")
        && let Some(after) = rest.strip_prefix("localhost")
        && (after.is_empty() || after.starts_with([':', '/']))
    {
        return format!("{scheme}://127.0.0.1{after}");
    }
    url.to_string()
}

/// Percent-encode an opaque id for use as one path segment.
fn path_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
