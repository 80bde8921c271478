//! The backend service seam.
//!
//! Every component talks to the backend through the [`Backend`] trait, one
//! method per endpoint. [`http::HttpBackend`] is the real implementation;
//! tests substitute scripted fakes.

pub mod http;
pub mod multipart;
pub mod wire;

use serde_json::Value;

use crate::error::ClientError;
use crate::knowledge::snapshot::{KnowledgeSnapshot, SnapshotId};

pub use http::HttpBackend;
pub use wire::{ChatRequest, ChatResponse, CommandItem, KnowledgePayload, LogRow, UploadReport};

/// Request/response surface of the command backend.
pub trait Backend {
    /// `GET /` liveness probe.
    fn health(&self) -> Result<Value, ClientError>;

    /// `GET /knowledge`: rules and raw intent rows of the active snapshot.
    fn knowledge(&self) -> Result<KnowledgePayload, ClientError>;

    /// `GET /knowledge/files`.
    fn list_snapshots(&self) -> Result<Vec<KnowledgeSnapshot>, ClientError>;

    /// `POST /knowledge/upload` (multipart).
    fn upload_snapshot(&self, bytes: &[u8], file_name: &str) -> Result<UploadReport, ClientError>;

    /// `POST /knowledge/activate/{id}`.
    fn activate_snapshot(&self, id: &SnapshotId) -> Result<(), ClientError>;

    /// `DELETE /knowledge/files/{id}`.
    fn delete_snapshot(&self, id: &SnapshotId) -> Result<(), ClientError>;

    /// `GET /logs?limit=N`, newest first.
    fn logs(&self, limit: usize) -> Result<Vec<LogRow>, ClientError>;

    /// `POST /chat`.
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;

    /// `POST /chat/recognize`: diagnostic phase one.
    fn recognize(&self, message: &str) -> Result<Value, ClientError>;

    /// `POST /chat/execute`: diagnostic phase two.
    fn execute(&self, commands: &[CommandItem]) -> Result<Value, ClientError>;
}
