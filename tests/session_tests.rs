/// Integration tests for the conversation session: transcript, trace list
/// insertion, failure handling and overlapping turns.
mod common;

use common::{FakeBackend, log_row};
use serde_json::json;
use vcdash::backend::{Backend, ChatResponse};
use vcdash::error::ClientError;
use vcdash::locale::Locale;
use vcdash::session::{ConversationSession, Role, SessionState, TurnOutcome};
use vcdash::trace::{TraceId, TraceList};

fn reply(text: &str) -> ChatResponse {
    ChatResponse::from_value(json!({ "reply": text, "latency_ms": 100 })).unwrap()
}

fn inputs(list: &TraceList) -> Vec<&str> {
    list.entries().iter().map(|e| e.user_input.as_str()).collect()
}

#[test]
fn blank_message_makes_no_backend_call() {
    let backend = FakeBackend::new();
    let mut session = ConversationSession::new(Locale::Zh);
    let mut traces = TraceList::default();

    let err = session.send(&backend, "  \t ", &mut traces).unwrap_err();

    assert_eq!(err, ClientError::EmptyMessage);
    assert!(backend.calls().is_empty());
    assert!(session.transcript().is_empty());
}

#[test]
fn request_carries_literal_text_and_empty_history() {
    let backend = FakeBackend::new();
    let mut session = ConversationSession::new(Locale::Zh);
    let mut traces = TraceList::default();

    session.send(&backend, "  导航去公司 ", &mut traces).unwrap();

    assert_eq!(backend.calls(), vec!["POST /chat   导航去公司 ".to_string()]);
    assert_eq!(session.transcript()[0].content, "  导航去公司 ");
}

#[test]
fn delivered_turn_prepends_trace_above_persisted_rows() {
    let backend = FakeBackend::new();
    *backend.logs.borrow_mut() = vec![log_row("5", "older", None, 10), log_row("4", "oldest", None, 10)];
    backend.push_chat(Ok(json!({
        "summary": "已打开空调",
        "commands": [{ "module": "AC", "text": "打开空调" }],
        "results": [{ "module": "AC", "intent": "AC_ON", "action": "AC_ON", "reply": "好的" }],
        "latency_ms": 1500,
        "token_usage": { "total_tokens": 210 },
        "log_id": 6
    })));

    let mut traces = TraceList::default();
    traces.reload(&backend, 50).unwrap();
    let mut session = ConversationSession::new(Locale::Zh);

    let outcome = session.send(&backend, "打开空调", &mut traces).unwrap();

    let TurnOutcome::Delivered { trace_id } = outcome else {
        panic!("expected delivery");
    };
    assert_eq!(inputs(&traces), vec!["打开空调", "older", "oldest"]);
    let idx: Vec<usize> = traces.entries().iter().map(|e| e.display_index).collect();
    assert_eq!(idx, vec![1, 2, 3]);

    let entry = traces.get(&trace_id).unwrap();
    assert_eq!(entry.token_count, 210);
    assert_eq!(entry.log_id.as_deref(), Some("6"));
    assert_eq!(entry.reply(), Some("已打开空调"));

    let agent = session.transcript().last().unwrap();
    assert_eq!(agent.role, Role::Agent);
    assert_eq!(agent.content, "已打开空调");
    assert_eq!(agent.results.len(), 1);
    assert_eq!(agent.latency_ms, Some(1500));
}

#[test]
fn network_failure_adds_one_error_message_and_no_trace() {
    let backend = FakeBackend::new();
    *backend.logs.borrow_mut() = vec![log_row("1", "earlier", None, 10)];
    let mut traces = TraceList::default();
    traces.reload(&backend, 50).unwrap();
    backend.offline.set(true);

    let mut session = ConversationSession::new(Locale::Zh);
    let outcome = session.send(&backend, "播放音乐", &mut traces).unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed { error } if error.is_unavailable()));
    assert_eq!(traces.len(), 1);

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].role, Role::Agent);
    assert_eq!(transcript[1].content, "连接服务器失败");
    assert!(transcript[1].trace_id.is_none());
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn responses_resolving_in_reverse_keep_newer_send_on_top() {
    let mut session = ConversationSession::new(Locale::En);
    let mut traces = TraceList::default();

    let u1 = session.begin("u1").unwrap();
    let u2 = session.begin("u2").unwrap();
    assert_eq!(session.state(), SessionState::Sending);

    session.resolve(u2, Ok(reply("second")), &mut traces);
    assert_eq!(session.state(), SessionState::Sending);
    session.resolve(u1, Ok(reply("first")), &mut traces);

    assert_eq!(inputs(&traces), vec!["u2", "u1"]);
    assert_eq!(session.state(), SessionState::Idle);

    // Transcript is in resolution order.
    let contents: Vec<&str> = session.transcript().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["u1", "u2", "second", "first"]);
}

#[test]
fn session_entries_stay_until_next_reload() {
    let backend = FakeBackend::new();
    let mut session = ConversationSession::new(Locale::Zh);
    let mut traces = TraceList::default();

    session.send(&backend, "一", &mut traces).unwrap();
    session.send(&backend, "二", &mut traces).unwrap();
    assert_eq!(inputs(&traces), vec!["二", "一"]);
    assert_eq!(traces.get(&TraceId::Local(1)).map(|e| e.display_index), Some(2));

    *backend.logs.borrow_mut() = vec![log_row("31", "二", None, 10), log_row("30", "一", None, 10)];
    traces.reload(&backend, 50).unwrap();

    assert!(traces.get(&TraceId::Local(1)).is_none());
    assert!(traces.get(&TraceId::Log("31".to_string())).is_some());
}

#[test]
fn backend_is_used_through_the_trait_object() {
    let backend = FakeBackend::new();
    let dyn_backend: &dyn Backend = &backend;
    let mut session = ConversationSession::new(Locale::Zh);
    let mut traces = TraceList::default();

    session.send(dyn_backend, "你好", &mut traces).unwrap();
    assert_eq!(traces.len(), 1);
}

#[test]
fn transcript_and_trace_show_the_same_reply() {
    let backend = FakeBackend::new();
    backend.push_chat(Ok(json!({ "reply": "R", "summary": "S" })));
    let mut session = ConversationSession::new(Locale::En);
    let mut traces = TraceList::default();

    let TurnOutcome::Delivered { trace_id } = session.send(&backend, "hi", &mut traces).unwrap() else {
        panic!("expected delivery");
    };

    assert_eq!(session.transcript().last().unwrap().content, "R");
    assert_eq!(traces.get(&trace_id).unwrap().reply(), Some("R"));
}
