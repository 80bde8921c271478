//! In-memory backend shared by the integration tests.
//!
//! Behaves like the real service for the knowledge endpoints (one active
//! snapshot, system snapshot undeletable, active snapshot undeletable) and
//! replays canned responses for `/logs` and `/chat`. Every call is recorded.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use serde_json::{Value, json};

use vcdash::backend::{
    Backend, ChatRequest, ChatResponse, CommandItem, KnowledgePayload, LogRow, UploadReport,
};
use vcdash::analytics::events;
use vcdash::backend::wire::RawIntent;
use vcdash::error::ClientError;
use vcdash::knowledge::{KnowledgeSnapshot, Origin, SnapshotId};

pub struct FakeBackend {
    pub snapshots: RefCell<Vec<KnowledgeSnapshot>>,
    pub payload: RefCell<KnowledgePayload>,
    pub logs: RefCell<Vec<LogRow>>,
    pub chat_replies: RefCell<VecDeque<Result<Value, ClientError>>>,
    /// Report for the next upload; `Err` rejects it.
    pub upload_result: RefCell<Result<UploadReport, ClientError>>,
    /// Every endpoint fails with `Unavailable` while set.
    pub offline: Cell<bool>,
    pub calls: RefCell<Vec<String>>,
    next_id: Cell<u32>,
}

impl FakeBackend {
    /// A backend holding the system snapshot (active) and one import.
    pub fn new() -> Self {
        events::set_enabled(false);
        Self {
            snapshots: RefCell::new(vec![
                snapshot("sys", "System", Origin::System, 12, true),
                snapshot("7", "ac_rules.xlsx", Origin::Imported, 20, false),
            ]),
            payload: RefCell::new(payload(&[("A", "x", "f1", "AC_ON", "打开空调")])),
            logs: RefCell::new(Vec::new()),
            chat_replies: RefCell::new(VecDeque::new()),
            upload_result: RefCell::new(Ok(UploadReport::default())),
            offline: Cell::new(false),
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(100),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn push_chat(&self, reply: Result<Value, ClientError>) {
        self.chat_replies.borrow_mut().push_back(reply);
    }

    fn record(&self, call: String) -> Result<(), ClientError> {
        self.calls.borrow_mut().push(call);
        if self.offline.get() {
            Err(ClientError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Backend for FakeBackend {
    fn health(&self) -> Result<Value, ClientError> {
        self.record("GET /".to_string())?;
        Ok(json!({ "status": "ok" }))
    }

    fn knowledge(&self) -> Result<KnowledgePayload, ClientError> {
        self.record("GET /knowledge".to_string())?;
        Ok(self.payload.borrow().clone())
    }

    fn list_snapshots(&self) -> Result<Vec<KnowledgeSnapshot>, ClientError> {
        self.record("GET /knowledge/files".to_string())?;
        Ok(self.snapshots.borrow().clone())
    }

    fn upload_snapshot(&self, _bytes: &[u8], file_name: &str) -> Result<UploadReport, ClientError> {
        self.record(format!("POST /knowledge/upload {file_name}"))?;
        let report = self.upload_result.borrow().clone()?;

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let mut snapshots = self.snapshots.borrow_mut();
        for s in snapshots.iter_mut() {
            s.active = false;
        }
        snapshots.push(snapshot(
            &id.to_string(),
            file_name,
            Origin::Imported,
            report.imported_intents,
            true,
        ));

        *self.payload.borrow_mut() = KnowledgePayload {
            rules: Vec::new(),
            intents: (0..report.imported_intents)
                .map(|i| RawIntent {
                    domain: Some("UPLOADED".to_string()),
                    intent: Some(format!("INTENT_{i}")),
                    query: Some(format!("query {i}")),
                    ..RawIntent::default()
                })
                .collect(),
        };
        Ok(report)
    }

    fn activate_snapshot(&self, id: &SnapshotId) -> Result<(), ClientError> {
        self.record(format!("POST /knowledge/activate/{id}"))?;
        let mut snapshots = self.snapshots.borrow_mut();
        if !snapshots.iter().any(|s| &s.id == id) {
            return Err(ClientError::NotFound(format!("knowledge file {id} not found")));
        }
        for s in snapshots.iter_mut() {
            s.active = &s.id == id;
        }
        Ok(())
    }

    fn delete_snapshot(&self, id: &SnapshotId) -> Result<(), ClientError> {
        self.record(format!("DELETE /knowledge/files/{id}"))?;
        let mut snapshots = self.snapshots.borrow_mut();
        let Some(pos) = snapshots.iter().position(|s| &s.id == id) else {
            return Err(ClientError::NotFound(format!("knowledge file {id} not found")));
        };
        if snapshots[pos].active {
            return Err(ClientError::Conflict("cannot delete the active knowledge file".to_string()));
        }
        snapshots.remove(pos);
        Ok(())
    }

    fn logs(&self, limit: usize) -> Result<Vec<LogRow>, ClientError> {
        self.record(format!("GET /logs?limit={limit}"))?;
        Ok(self.logs.borrow().iter().take(limit).cloned().collect())
    }

    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        self.record(format!("POST /chat {}", request.message))?;
        let reply = self
            .chat_replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "reply": "ok" })))?;
        ChatResponse::from_value(reply).map_err(|reason| ClientError::InvalidResponse {
            endpoint: "/chat".to_string(),
            reason,
        })
    }

    fn recognize(&self, message: &str) -> Result<Value, ClientError> {
        self.record(format!("POST /chat/recognize {message}"))?;
        Ok(json!({ "commands": [] }))
    }

    fn execute(&self, commands: &[CommandItem]) -> Result<Value, ClientError> {
        self.record(format!("POST /chat/execute {}", commands.len()))?;
        Ok(json!({ "results": [] }))
    }
}

pub fn snapshot(id: &str, name: &str, origin: Origin, intents: u64, active: bool) -> KnowledgeSnapshot {
    KnowledgeSnapshot {
        id: SnapshotId::new(id),
        name: name.to_string(),
        origin,
        rule_count: 0,
        intent_count: intents,
        active,
    }
}

/// Knowledge payload from `(domain, ability, feature, intent, query)`
/// tuples; empty strings become omitted fields.
pub fn payload(rows: &[(&str, &str, &str, &str, &str)]) -> KnowledgePayload {
    let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
    KnowledgePayload {
        rules: vec!["rule one".to_string()],
        intents: rows
            .iter()
            .map(|(domain, ability, feature, intent, query)| RawIntent {
                domain: opt(*domain),
                ability: opt(*ability),
                feature: opt(*feature),
                intent: opt(*intent),
                query: opt(*query),
            })
            .collect(),
    }
}

pub fn log_row(id: &str, input: &str, raw: Option<&str>, latency_ms: u64) -> LogRow {
    LogRow {
        id: id.to_string(),
        user_input: input.to_string(),
        raw_response: raw.map(str::to_string),
        latency_ms: Some(latency_ms),
        created_at: Some("2026-10-18 09:00:00".to_string()),
    }
}
