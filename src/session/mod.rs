//! Conversation session assembler.
//!
//! Drives one request/response cycle per utterance:
//!
//! ```text
//! Idle ──begin──▶ Sending ──resolve(Ok)──▶ Delivered ──▶ Idle
//!                         └─resolve(Err)─▶ Failed    ──▶ Idle
//! ```
//!
//! The transcript is ephemeral and session-scoped. A delivered response
//! also yields a trace entry, inserted into the caller's [`TraceList`]; a
//! failed one only appends the localized connection-error message.
//!
//! Overlapping turns are admitted as they come: nothing is queued, cancelled
//! or rejected. Each resolved turn is placed in the trace list by send
//! order.

use chrono::Local;
use serde::Serialize;
use serde_json::Value;

use crate::analytics::events;
use crate::backend::wire::{Command, CommandResult};
use crate::backend::{Backend, ChatRequest, ChatResponse};
use crate::error::ClientError;
use crate::locale::Locale;
use crate::trace::{TraceEntry, TraceId, TraceList};

/// Who wrote a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One turn in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<CommandResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    /// The trace entry built from the same response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            commands: Vec::new(),
            results: Vec::new(),
            latency_ms: None,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            trace_id: None,
        }
    }
}

/// Assembler state from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Sending,
}

/// A turn whose request has been issued but not resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending turn must be resolved"]
pub struct PendingTurn {
    seq: u64,
    text: String,
}

impl PendingTurn {
    /// The request body for this turn: the literal text, empty history.
    pub fn request(&self) -> ChatRequest {
        ChatRequest::new(self.text.clone())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Delivered { trace_id: TraceId },
    Failed { error: ClientError },
}

/// Owner of the ephemeral chat transcript.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    transcript: Vec<ChatMessage>,
    locale: Locale,
    in_flight: usize,
    next_seq: u64,
}

impl ConversationSession {
    pub fn new(locale: Locale) -> Self {
        Self {
            transcript: Vec::new(),
            locale,
            in_flight: 0,
            next_seq: 1,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight > 0 {
            SessionState::Sending
        } else {
            SessionState::Idle
        }
    }

    /// Empty the transcript. The trace list is not touched.
    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Start a turn: reject blank input, append the user message.
    pub fn begin(&mut self, text: &str) -> Result<PendingTurn, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if self.in_flight > 0 {
            events::log_warning(&format!(
                "chat send issued while {} turn(s) still in flight",
                self.in_flight
            ));
        }

        self.transcript.push(ChatMessage::new(Role::User, text));
        self.in_flight += 1;
        let seq = self.next_seq;
        self.next_seq += 1;

        Ok(PendingTurn {
            seq,
            text: text.to_string(),
        })
    }

    /// Finish a turn with the backend's result.
    ///
    /// On success the agent message and the trace entry are recorded
    /// together; on failure only the connection-error message is appended.
    pub fn resolve(
        &mut self,
        turn: PendingTurn,
        result: Result<ChatResponse, ClientError>,
        traces: &mut TraceList,
    ) -> TurnOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);

        match result {
            Ok(response) => {
                let trace_id = TraceId::Local(turn.seq);
                let entry = trace_entry_for(&turn, &response);

                let mut message = ChatMessage::new(Role::Agent, response.reply_text());
                message.commands = response.commands;
                message.results = response.results;
                message.latency_ms = response.latency_ms;
                message.trace_id = Some(trace_id.clone());

                self.transcript.push(message);
                traces.insert_session_entry(entry);
                TurnOutcome::Delivered { trace_id }
            }
            Err(error) => {
                self.transcript
                    .push(ChatMessage::new(Role::Agent, self.locale.connect_error()));
                TurnOutcome::Failed { error }
            }
        }
    }

    /// `begin`, one `POST /chat`, then `resolve`.
    pub fn send<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        text: &str,
        traces: &mut TraceList,
    ) -> Result<TurnOutcome, ClientError> {
        let turn = self.begin(text)?;
        let result = backend.chat(&turn.request());
        Ok(self.resolve(turn, result, traces))
    }
}

/// Trace entry for a delivered turn: the full response plus the input.
fn trace_entry_for(turn: &PendingTurn, response: &ChatResponse) -> TraceEntry {
    let latency_ms = response.latency_ms.unwrap_or(0);
    let mut payload = response.raw.clone();
    payload.insert("user_input".to_string(), Value::String(turn.text.clone()));
    payload.insert("latency_ms".to_string(), Value::from(latency_ms));

    let mut entry = TraceEntry::new(TraceId::Local(turn.seq), turn.text.clone(), latency_ms, payload);
    entry.log_id = response.log_id.clone();
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> ChatResponse {
        ChatResponse::from_value(value).unwrap()
    }

    #[test]
    fn blank_input_is_rejected_without_a_message() {
        let mut session = ConversationSession::new(Locale::Zh);
        assert_eq!(session.begin("   \n"), Err(ClientError::EmptyMessage));
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn begin_appends_user_message_and_enters_sending() {
        let mut session = ConversationSession::new(Locale::Zh);
        let turn = session.begin("打开空调").unwrap();
        assert_eq!(session.state(), SessionState::Sending);
        assert_eq!(session.transcript()[0].role, Role::User);
        assert_eq!(turn.request(), ChatRequest::new("打开空调"));
    }

    #[test]
    fn delivered_turn_links_message_and_trace() {
        let mut session = ConversationSession::new(Locale::Zh);
        let mut traces = TraceList::default();
        let turn = session.begin("打开空调，导航去公司").unwrap();

        let outcome = session.resolve(
            turn,
            Ok(response(json!({
                "summary": "已打开空调，正在导航去公司",
                "commands": [
                    { "module": "AC", "text": "打开空调", "confidence": 0.95 },
                    { "module": "NAV", "text": "导航去公司", "confidence": 0.98 }
                ],
                "results": [{ "module": "AC", "intent": "AC_ON", "action": "AC_ON", "reply": "好的" }],
                "latency_ms": 2300,
                "token_usage": { "total_tokens": 321 },
                "log_id": 88
            }))),
            &mut traces,
        );

        let TurnOutcome::Delivered { trace_id } = outcome else {
            panic!("expected delivery");
        };
        assert_eq!(session.state(), SessionState::Idle);

        let agent = &session.transcript()[1];
        assert_eq!(agent.role, Role::Agent);
        assert_eq!(agent.content, "已打开空调，正在导航去公司");
        assert_eq!(agent.commands.len(), 2);
        assert_eq!(agent.trace_id.as_ref(), Some(&trace_id));

        let entry = traces.get(&trace_id).unwrap();
        assert_eq!(entry.display_index, 1);
        assert_eq!(entry.token_count, 321);
        assert_eq!(entry.latency_ms, 2300);
        assert_eq!(entry.log_id.as_deref(), Some("88"));
        assert_eq!(entry.payload["user_input"], "打开空调，导航去公司");
        assert_eq!(entry.command_count(), 2);
    }

    #[test]
    fn failed_turn_appends_localized_error_only() {
        let mut session = ConversationSession::new(Locale::En);
        let mut traces = TraceList::default();
        let turn = session.begin("hello").unwrap();

        let outcome = session.resolve(
            turn,
            Err(ClientError::Unavailable("connection refused".into())),
            &mut traces,
        );

        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].content, "Failed to connect server");
        assert!(traces.is_empty());
    }

    #[test]
    fn clear_keeps_traces() {
        let mut session = ConversationSession::new(Locale::Zh);
        let mut traces = TraceList::default();
        let turn = session.begin("播放音乐").unwrap();
        session.resolve(turn, Ok(response(json!({ "reply": "好的" }))), &mut traces);

        session.clear();
        assert!(session.transcript().is_empty());
        assert_eq!(traces.len(), 1);
    }
}
