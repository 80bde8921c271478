/// Dashboard API tests: requests are routed through `Dashboard::handle`
/// against the in-memory backend, without opening a socket.
mod common;

use common::{FakeBackend, log_row};
use serde_json::json;
use tiny_http::Method;
use vcdash::backend::UploadReport;
use vcdash::locale::Locale;
use vcdash::web::Dashboard;

fn dashboard(backend: FakeBackend) -> Dashboard<FakeBackend> {
    let mut dash = Dashboard::new(backend, "http://127.0.0.1:8000", Locale::En, 50);
    dash.load();
    dash
}

fn seeded_backend() -> FakeBackend {
    let backend = FakeBackend::new();
    *backend.logs.borrow_mut() = vec![
        log_row("3", "打开空调", Some(r#"{"commands": [{"module": "AC", "text": "打开空调"}]}"#), 900),
        log_row(
            "2",
            "打开空调，导航去公司",
            Some("{'commands': [{'module': 'AC', 'text': 'a'}, {'module': 'NAV', 'text': 'b'}]}"),
            2300,
        ),
        log_row("1", "播放音乐", Some(r#"{"commands": [{"module": "MEDIA", "text": "c"}]}"#), 600),
    ];
    backend
}

#[test]
fn health_reports_reachability() {
    let mut dash = dashboard(FakeBackend::new());
    let reply = dash.handle(&Method::Get, "/api/health", b"");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["reachable"], true);
    assert_eq!(reply.body["backend"]["status"], "ok");
}

#[test]
fn unknown_route_is_404() {
    let mut dash = dashboard(FakeBackend::new());
    let reply = dash.handle(&Method::Get, "/api/nope", b"");
    assert_eq!(reply.status, 404);
}

#[test]
fn traces_endpoint_applies_filters() {
    let mut dash = dashboard(seeded_backend());

    let all = dash.handle(&Method::Get, "/api/traces", b"");
    assert_eq!(all.body["total"], 3);
    assert_eq!(all.body["modules"], json!(["AC", "MEDIA", "NAV"]));

    let multi_nav = dash.handle(&Method::Get, "/api/traces?type=multi&module=NAV", b"");
    let entries = multi_nav.body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["user_input"], "打开空调，导航去公司");

    // "空调" percent-encoded
    let keyword = dash.handle(&Method::Get, "/api/traces?q=%E7%A9%BA%E8%B0%83", b"");
    assert_eq!(keyword.body["entries"].as_array().unwrap().len(), 2);

    let bad = dash.handle(&Method::Get, "/api/traces?type=several", b"");
    assert_eq!(bad.status, 400);
}

#[test]
fn trace_detail_includes_replay_command() {
    let mut dash = dashboard(seeded_backend());
    let reply = dash.handle(&Method::Get, "/api/traces/2", b"");

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["commands"].as_array().unwrap().len(), 2);
    let curl = reply.body["curl"].as_str().unwrap();
    assert!(curl.starts_with("curl -X POST http://127.0.0.1:8000/chat"));

    let missing = dash.handle(&Method::Get, "/api/traces/99", b"");
    assert_eq!(missing.status, 404);
}

#[test]
fn chat_round_trip_updates_transcript_and_traces() {
    let backend = seeded_backend();
    backend.push_chat(Ok(json!({ "reply": "好的", "commands": [{ "module": "AC", "text": "x" }] })));
    let mut dash = dashboard(backend);

    let reply = dash.handle(&Method::Post, "/api/chat", r#"{"message": "打开空调"}"#.as_bytes());
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["delivered"], true);
    assert_eq!(reply.body["trace"]["display_index"], 1);
    assert_eq!(dash.traces().len(), 4);

    let transcript = dash.handle(&Method::Get, "/api/transcript", b"");
    assert_eq!(transcript.body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(transcript.body["state"], "idle");

    dash.handle(&Method::Post, "/api/transcript/clear", b"");
    assert!(dash.session().transcript().is_empty());
    assert_eq!(dash.traces().len(), 4);
}

#[test]
fn failed_chat_answers_with_localized_message() {
    let backend = FakeBackend::new();
    backend.offline.set(true);
    let mut dash = dashboard(backend);

    let reply = dash.handle(&Method::Post, "/api/chat", br#"{"message": "hi"}"#);

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["delivered"], false);
    assert_eq!(reply.body["message"]["content"], "Failed to connect server");
    assert!(dash.traces().is_empty());
}

#[test]
fn invalid_chat_requests_are_rejected() {
    let mut dash = dashboard(FakeBackend::new());

    let blank = dash.handle(&Method::Post, "/api/chat", br#"{"message": "   "}"#);
    assert_eq!(blank.status, 400);
    assert_eq!(blank.body["kind"], "empty_message");

    let malformed = dash.handle(&Method::Post, "/api/chat", b"not json");
    assert_eq!(malformed.status, 400);
    assert!(dash.session().transcript().is_empty());
}

#[test]
fn knowledge_endpoints_expose_state_and_search() {
    let mut dash = dashboard(FakeBackend::new());

    let files = dash.handle(&Method::Get, "/api/knowledge/files", b"");
    assert_eq!(files.body["files"].as_array().unwrap().len(), 2);

    let kb = dash.handle(&Method::Get, "/api/knowledge?q=AC", b"");
    assert_eq!(kb.body["total_intents"], 1);
    assert_eq!(kb.body["intents"][0]["intent"], "AC_ON");
    assert_eq!(kb.body["active"]["name"], "System");
}

#[test]
fn upload_then_activate_then_delete() {
    let backend = FakeBackend::new();
    *backend.upload_result.borrow_mut() = Ok(UploadReport {
        imported_intents: 40,
        duplicates_removed: 3,
    });
    let mut dash = dashboard(backend);

    let missing_name = dash.handle(&Method::Post, "/api/knowledge/upload", b"bytes");
    assert_eq!(missing_name.status, 400);

    let upload = dash.handle(&Method::Post, "/api/knowledge/upload?name=nav.xlsx", b"bytes");
    assert_eq!(upload.status, 200);
    assert_eq!(upload.body["report"]["intents"], 40);
    assert_eq!(upload.body["report"]["duplicates_removed"], 3);
    assert_eq!(upload.body["total_intents"], 40);

    let activate = dash.handle(&Method::Post, "/api/knowledge/activate/7", b"");
    assert_eq!(activate.status, 200);
    assert_eq!(activate.body["active"]["id"], "7");

    let delete_active = dash.handle(&Method::Delete, "/api/knowledge/files/7", b"");
    assert_eq!(delete_active.status, 409);

    let delete_system = dash.handle(&Method::Delete, "/api/knowledge/files/sys", b"");
    assert_eq!(delete_system.status, 409);

    let delete_upload = dash.handle(&Method::Delete, "/api/knowledge/files/100", b"");
    assert_eq!(delete_upload.status, 200);
    assert_eq!(dash.knowledge().snapshots().len(), 2);
}

#[test]
fn stats_and_reload() {
    let mut dash = dashboard(seeded_backend());

    let stats = dash.handle(&Method::Get, "/api/stats", b"");
    assert_eq!(stats.body["total_entries"], 3);
    assert_eq!(stats.body["cardinality"]["multi"], 1);

    let reload = dash.handle(&Method::Post, "/api/traces/reload", b"");
    assert_eq!(reload.status, 200);
    assert_eq!(reload.body["total"], 3);
}
