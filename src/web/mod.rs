//! Local dashboard API for vcdash.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) exposing the
//! knowledge browser, the trace viewer and the chat session as JSON
//! endpoints. One [`Dashboard`] owns the state of all three for the life of
//! the process.
//!
//! Launched via `vcdash web` (default: `http://127.0.0.1:9747`).

mod api;

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::analytics::events;
use crate::backend::{Backend, HttpBackend};
use crate::config::VcdashConfig;
use crate::knowledge::SnapshotManager;
use crate::locale::Locale;
use crate::session::ConversationSession;
use crate::trace::TraceList;

pub use api::Reply;

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// Everything the dashboard shows, plus the client it loads it through.
pub struct Dashboard<B> {
    backend: B,
    base_url: String,
    locale: Locale,
    trace_limit: usize,
    knowledge: SnapshotManager,
    traces: TraceList,
    session: ConversationSession,
}

impl<B: Backend> Dashboard<B> {
    pub fn new(backend: B, base_url: &str, locale: Locale, trace_limit: usize) -> Self {
        Self {
            backend,
            base_url: base_url.to_string(),
            locale,
            trace_limit,
            knowledge: SnapshotManager::new(),
            traces: TraceList::default(),
            session: ConversationSession::new(locale),
        }
    }

    /// Initial load of the knowledge view and the trace list.
    ///
    /// Failures leave the affected view empty; they are logged, never fatal.
    pub fn load(&mut self) {
        self.knowledge.refresh(&self.backend);
        if let Err(e) = self.traces.reload(&self.backend, self.trace_limit) {
            events::log_warning(&format!("trace list unavailable: {e}"));
        }
    }

    pub fn knowledge(&self) -> &SnapshotManager {
        &self.knowledge
    }

    pub fn traces(&self) -> &TraceList {
        &self.traces
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Route one request to its handler.
    pub fn handle(&mut self, method: &Method, url: &str, body: &[u8]) -> Reply {
        // Strip query string for path matching
        let path = url.split('?').next().unwrap_or(url);

        match (method, path) {
            // API: Health
            (&Method::Get, "/api/health") => api::get_health(self),

            // API: Knowledge
            (&Method::Get, "/api/knowledge") => api::get_knowledge(self, url),
            (&Method::Get, "/api/knowledge/files") => api::get_knowledge_files(self),
            (&Method::Post, "/api/knowledge/upload") => api::post_upload(self, url, body),
            (&Method::Post, p) if p.starts_with("/api/knowledge/activate/") => {
                api::post_activate(self, &p["/api/knowledge/activate/".len()..])
            }
            (&Method::Delete, p) if p.starts_with("/api/knowledge/files/") => {
                api::delete_file(self, &p["/api/knowledge/files/".len()..])
            }

            // API: Traces
            (&Method::Get, "/api/traces") => api::get_traces(self, url),
            (&Method::Post, "/api/traces/reload") => api::post_traces_reload(self),
            (&Method::Get, p) if p.starts_with("/api/traces/") => {
                api::get_trace(self, &p["/api/traces/".len()..])
            }
            (&Method::Get, "/api/stats") => api::get_stats(self),

            // API: Chat
            (&Method::Get, "/api/transcript") => api::get_transcript(self),
            (&Method::Post, "/api/transcript/clear") => api::post_transcript_clear(self),
            (&Method::Post, "/api/chat") => api::post_chat(self, body),

            // 404
            _ => Reply::not_found("not found"),
        }
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the dashboard server on the given address.
///
/// Blocks the current thread. Handles requests sequentially (sufficient for
/// a local single-user dashboard). Errors are answered per request without
/// stopping the server.
pub fn serve(addr: &str, config: &VcdashConfig) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    let backend = HttpBackend::from_config(config);
    let base_url = backend.base_url().to_string();
    let mut dashboard = Dashboard::new(
        backend,
        &base_url,
        config.general.locale,
        config.traces.limit,
    );
    dashboard.load();

    println!("vcdash dashboard API running at http://{addr} (backend {base_url})");
    println!("Press Ctrl+C to stop.\n");

    if config.web.open_browser {
        let _ = open_browser(&format!("http://{addr}/api/health"));
    }

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let reply = match read_body(&method, request.as_reader()) {
            Ok(body) => dashboard.handle(&method, &url, &body),
            Err(e) => Reply::bad_request(&format!("could not read request body: {e}")),
        };
        let status = reply.status;
        let _ = request.respond(into_response(reply));

        // Brief access log
        println!(
            "{} {} {} {}",
            method,
            url,
            status,
            chrono::Local::now().format("%H:%M:%S")
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Request body as raw bytes (uploads are binary). A short or failed read
/// is an error, never a truncated body.
fn read_body(method: &Method, reader: &mut dyn Read) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    if matches!(method, Method::Put | Method::Post | Method::Patch | Method::Delete) {
        reader.read_to_end(&mut body)?;
    }
    Ok(body)
}

fn into_response(reply: Reply) -> Response<Cursor<Vec<u8>>> {
    let body = serde_json::to_vec(&reply.body).unwrap_or_else(|_| b"{}".to_vec());
    let response = Response::from_data(body).with_status_code(StatusCode(reply.status));
    match content_type_json() {
        Some(header) => response.with_header(header),
        None => response,
    }
}

/// JSON content type header.
fn content_type_json() -> Option<Header> {
    Header::from_bytes("Content-Type", "application/json; charset=utf-8").ok()
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Interrupted;

    impl Read for Interrupted {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed"))
        }
    }

    #[test]
    fn body_is_read_for_writes_only() {
        let mut upload = Cursor::new(b"xlsx".to_vec());
        assert_eq!(read_body(&Method::Post, &mut upload).unwrap(), b"xlsx");

        let mut ignored = Cursor::new(b"stray".to_vec());
        assert!(read_body(&Method::Get, &mut ignored).unwrap().is_empty());
    }

    #[test]
    fn failed_body_read_is_reported() {
        assert!(read_body(&Method::Post, &mut Interrupted).is_err());
        assert_eq!(Reply::bad_request("could not read request body").status, 400);
    }
}
