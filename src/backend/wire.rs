//! Request / response shapes of the backend HTTP surface.
//!
//! The backend is loose about types: ids arrive as numbers or strings,
//! spreadsheet-derived fields may be numbers, and list elements are not
//! guaranteed to be well formed. Everything here deserializes leniently and
//! skips what it cannot read rather than failing the whole response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Body of `POST /chat`.
///
/// `history` is always sent empty: every turn is independent context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Value>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
        }
    }
}

/// One recognized sub-command of an utterance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(deserialize_with = "lenient_string")]
    pub module: String,
    #[serde(deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Execution result for one sub-command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(deserialize_with = "lenient_string")]
    pub module: String,
    #[serde(deserialize_with = "lenient_string")]
    pub intent: String,
    #[serde(deserialize_with = "lenient_string")]
    pub action: String,
    #[serde(deserialize_with = "lenient_string")]
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A command handed to `POST /chat/execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandItem {
    pub module: String,
    pub text: String,
}

/// Decoded `POST /chat` response.
///
/// The typed fields are views over `raw`, which keeps the complete response
/// object so trace entries can show everything the backend sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub reply: Option<String>,
    pub summary: Option<String>,
    pub commands: Vec<Command>,
    pub results: Vec<CommandResult>,
    pub latency_ms: Option<u64>,
    pub log_id: Option<String>,
    pub raw: Map<String, Value>,
}

impl ChatResponse {
    /// Build from the decoded JSON body. Fails only if the body is not an object.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(raw) = value else {
            return Err("expected a JSON object".to_string());
        };

        Ok(Self {
            reply: non_empty_str(raw.get("reply")),
            summary: non_empty_str(raw.get("summary")),
            commands: parse_list(raw.get("commands")),
            results: parse_list(raw.get("results")),
            latency_ms: latency_ms(&raw),
            log_id: raw.get("log_id").and_then(scalar_to_string),
            raw,
        })
    }

    /// The text shown as the agent's reply: `reply`, else `summary`.
    pub fn reply_text(&self) -> &str {
        [self.reply.as_deref(), self.summary.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }

    /// Total tokens reported by the backend, 0 if absent.
    pub fn token_count(&self) -> u64 {
        token_count(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// One persisted row from `GET /logs`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogRow {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_input: String,
    #[serde(default)]
    pub raw_response: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Knowledge
// ---------------------------------------------------------------------------

/// Body of `GET /knowledge` before fill-down resolution.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KnowledgePayload {
    pub rules: Vec<String>,
    pub intents: Vec<RawIntent>,
}

/// An intent row as stored: hierarchy fields may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawIntent {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub domain: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub ability: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub feature: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub intent: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub query: Option<String>,
}

/// Body of `POST /knowledge/upload`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    #[serde(rename = "intents", default)]
    pub imported_intents: u64,
    #[serde(default)]
    pub duplicates_removed: u64,
}

// ---------------------------------------------------------------------------
// Payload field helpers
// ---------------------------------------------------------------------------

/// Deserialize every element of a JSON array that fits `T`, skipping the rest.
pub fn parse_list<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Total token usage recorded in a payload.
///
/// Reads `token_usage` at the top level, falling back to `trace.token_usage`.
/// Uses `total_tokens` when present, else `input_tokens + output_tokens`.
pub fn token_count(payload: &Map<String, Value>) -> u64 {
    let usage = payload.get("token_usage").or_else(|| {
        payload
            .get("trace")
            .and_then(|t| t.get("token_usage"))
    });
    let Some(Value::Object(usage)) = usage else {
        return 0;
    };

    if let Some(total) = usage.get("total_tokens").and_then(Value::as_u64) {
        return total;
    }
    let input = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
    let output = usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
    input + output
}

/// Latency recorded in a payload: `latency_ms`, else `trace.latency_ms`.
pub fn latency_ms(payload: &Map<String, Value>) -> Option<u64> {
    payload
        .get("latency_ms")
        .and_then(as_millis)
        .or_else(|| {
            payload
                .get("trace")
                .and_then(|t| t.get("latency_ms"))
                .and_then(as_millis)
        })
}

fn as_millis(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Render a JSON scalar as a string (ids, spreadsheet cells).
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept a string, number or bool; `null` becomes the empty string.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value).unwrap_or_default())
}

/// Like [`lenient_string`] but keeps absence (`null`) distinct.
pub(crate) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_always_sends_empty_history() {
        let body = serde_json::to_value(ChatRequest::new("打开空调")).unwrap();
        assert_eq!(body, json!({ "message": "打开空调", "history": [] }));
    }

    #[test]
    fn chat_response_prefers_reply_over_summary() {
        let resp = ChatResponse::from_value(json!({
            "reply": "好的",
            "summary": "已打开空调",
        }))
        .unwrap();
        assert_eq!(resp.reply_text(), "好的");

        let resp = ChatResponse::from_value(json!({ "summary": "已打开空调" })).unwrap();
        assert_eq!(resp.reply_text(), "已打开空调");

        let resp = ChatResponse::from_value(json!({ "reply": "", "summary": "已打开空调" })).unwrap();
        assert_eq!(resp.reply_text(), "已打开空调");
    }

    #[test]
    fn chat_response_reads_v1_trace_block() {
        let resp = ChatResponse::from_value(json!({
            "reply": "ok",
            "trace": { "latency_ms": 812.4, "token_usage": { "input_tokens": 30, "output_tokens": 12 } },
            "log_id": 17,
        }))
        .unwrap();
        assert_eq!(resp.latency_ms, Some(812));
        assert_eq!(resp.token_count(), 42);
        assert_eq!(resp.log_id.as_deref(), Some("17"));
    }

    #[test]
    fn chat_response_rejects_non_object() {
        assert!(ChatResponse::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn parse_list_skips_malformed_elements() {
        let value = json!([
            { "module": "AC", "text": "打开空调", "confidence": 0.95 },
            "garbage",
            { "module": "NAV", "text": "导航去公司" },
        ]);
        let commands: Vec<Command> = parse_list(Some(&value));
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].module, "NAV");
        assert_eq!(commands[1].confidence, None);
    }

    #[test]
    fn token_count_prefers_total() {
        let payload = json!({ "token_usage": { "input_tokens": 1, "output_tokens": 2, "total_tokens": 9 } });
        assert_eq!(token_count(payload.as_object().unwrap()), 9);
        assert_eq!(token_count(&Map::new()), 0);
    }

    #[test]
    fn log_row_accepts_numeric_id_and_null_payload() {
        let row: LogRow = serde_json::from_value(json!({
            "id": 3,
            "user_input": "播放音乐",
            "raw_response": null,
            "latency_ms": 1200,
            "timestamp": "2026-01-02 10:00:00",
        }))
        .unwrap();
        assert_eq!(row.id, "3");
        assert!(row.raw_response.is_none());
        assert_eq!(row.created_at.as_deref(), Some("2026-01-02 10:00:00"));
    }

    #[test]
    fn raw_intent_keeps_missing_fields_absent() {
        let raw: RawIntent = serde_json::from_value(json!({
            "ability": "温度",
            "intent": "TEMP_SET",
            "query": 26,
        }))
        .unwrap();
        assert!(raw.domain.is_none());
        assert_eq!(raw.ability.as_deref(), Some("温度"));
        assert_eq!(raw.query.as_deref(), Some("26"));
    }

    #[test]
    fn upload_report_maps_intents_field() {
        let report: UploadReport =
            serde_json::from_value(json!({ "intents": 40, "duplicates_removed": 3 })).unwrap();
        assert_eq!(report.imported_intents, 40);
        assert_eq!(report.duplicates_removed, 3);
    }
}
