//! Knowledge snapshot manager.
//!
//! Tracks the uploaded and system knowledge files, which one is active, and
//! the resolved intent rows of the active one. The backend is the only
//! authority: every mutation is followed by a full reload of both the
//! snapshot list and the knowledge base, and each reload replaces the local
//! collections wholesale.

pub mod intents;
pub mod snapshot;

use serde::Serialize;

use crate::analytics::events;
use crate::backend::{Backend, UploadReport};
use crate::error::ClientError;

pub use intents::{IntentEntry, KnowledgeBase};
pub use snapshot::{ActiveRepair, KnowledgeSnapshot, Origin, SnapshotId};

/// Backend paths for the file downloads handed straight to the user agent.
pub const TEMPLATE_PATH: &str = "/knowledge/template";
pub const EXPORT_PATH: &str = "/knowledge/export";

/// Local view of the backend's knowledge files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotManager {
    snapshots: Vec<KnowledgeSnapshot>,
    knowledge: KnowledgeBase,
    /// Non-fatal problems from the most recent refresh.
    warnings: Vec<String>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[KnowledgeSnapshot] {
        &self.snapshots
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The active snapshot, if the list is non-empty.
    pub fn active(&self) -> Option<&KnowledgeSnapshot> {
        self.snapshots.iter().find(|s| s.active)
    }

    pub fn find(&self, id: &SnapshotId) -> Option<&KnowledgeSnapshot> {
        self.snapshots.iter().find(|s| &s.id == id)
    }

    /// Fetch the snapshot list, repaired to exactly one active entry.
    pub fn list_snapshots<B: Backend + ?Sized>(
        backend: &B,
    ) -> Result<(Vec<KnowledgeSnapshot>, ActiveRepair), ClientError> {
        let listed = backend.list_snapshots()?;
        Ok(snapshot::enforce_single_active(listed))
    }

    /// Reload the snapshot list and the active knowledge base.
    ///
    /// Never fails: an unreachable backend degrades the affected collection
    /// to empty and records a warning.
    pub fn refresh<B: Backend + ?Sized>(&mut self, backend: &B) -> &[String] {
        let mut warnings = Vec::new();

        let snapshots = match Self::list_snapshots(backend) {
            Ok((list, repair)) => {
                if let Some(message) = describe_repair(&repair) {
                    warnings.push(message);
                }
                list
            }
            Err(e) => {
                warnings.push(format!("knowledge files unavailable: {e}"));
                Vec::new()
            }
        };

        let knowledge = match backend.knowledge() {
            Ok(payload) => KnowledgeBase::from_payload(&payload),
            Err(e) => {
                warnings.push(format!("knowledge base unavailable: {e}"));
                KnowledgeBase::default()
            }
        };

        for w in &warnings {
            events::log_warning(w);
        }

        self.snapshots = snapshots;
        self.knowledge = knowledge;
        self.warnings = warnings;
        &self.warnings
    }

    /// Upload a knowledge file. Deduplication and validation are the
    /// backend's; the report is passed through as received.
    pub fn upload<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<UploadReport, ClientError> {
        let result = backend.upload_snapshot(bytes, file_name);
        if result.is_ok() {
            self.refresh(backend);
        }
        result
    }

    /// Make `id` the active snapshot. Local state changes only through the
    /// reload that follows the call.
    pub fn activate<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        id: &SnapshotId,
    ) -> Result<(), ClientError> {
        let result = backend.activate_snapshot(id);
        self.refresh(backend);
        result
    }

    /// Delete snapshot `id`.
    ///
    /// The origin must be known before the call: an id missing from the
    /// cached list triggers a reload of the list, and an id still missing
    /// afterwards is refused. A system snapshot is refused here, so no DELETE for it ever
    /// reaches the backend. Deleting the active snapshot is refused by the
    /// backend.
    pub fn delete<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        id: &SnapshotId,
    ) -> Result<(), ClientError> {
        if self.find(id).is_none() {
            let (list, repair) = Self::list_snapshots(backend)?;
            if let Some(message) = describe_repair(&repair) {
                events::log_warning(&message);
            }
            self.snapshots = list;
        }
        let Some(snap) = self.find(id) else {
            return Err(ClientError::NotFound(format!("snapshot '{id}' is not in the file list")));
        };
        if snap.is_system() {
            return Err(ClientError::Conflict(format!(
                "snapshot '{}' is the system default and cannot be deleted",
                snap.name
            )));
        }

        let result = backend.delete_snapshot(id);
        self.refresh(backend);
        result
    }
}

fn describe_repair(repair: &ActiveRepair) -> Option<String> {
    match repair {
        ActiveRepair::None => None,
        ActiveRepair::ClearedExtra { kept, cleared } => Some(format!(
            "backend reported {} active snapshots; keeping '{kept}' active",
            cleared + 1
        )),
        ActiveRepair::Elected(id) => Some(format!(
            "backend reported no active snapshot; treating '{id}' as active"
        )),
    }
}
