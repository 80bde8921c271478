//! Knowledge snapshots: one uploaded or system-provided rule/intent bundle.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::backend::wire::scalar_to_string;

/// Opaque snapshot identifier assigned by the backend.
///
/// The wire may carry either a string or a number; both normalize to the
/// same textual form so ids compare and print consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SnapshotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        scalar_to_string(&value)
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom("snapshot id must be a string or number"))
    }
}

/// Where a snapshot came from. System snapshots cannot be deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[serde(alias = "System")]
    System,
    #[default]
    #[serde(alias = "Imported", alias = "import", alias = "upload", alias = "uploaded", alias = "user")]
    Imported,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "System"),
            Self::Imported => write!(f, "Imported"),
        }
    }
}

/// One entry of `GET /knowledge/files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub id: SnapshotId,
    #[serde(default, alias = "filename", alias = "file_name")]
    pub name: String,
    #[serde(default, alias = "source", alias = "type")]
    pub origin: Origin,
    #[serde(default, alias = "rules", alias = "rules_count")]
    pub rule_count: u64,
    #[serde(default, alias = "intents", alias = "intents_count")]
    pub intent_count: u64,
    #[serde(default, alias = "is_active")]
    pub active: bool,
}

impl KnowledgeSnapshot {
    pub fn is_system(&self) -> bool {
        self.origin == Origin::System
    }
}

/// Outcome of [`enforce_single_active`]: which snapshot was left active and
/// whether the loaded list had to be repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveRepair {
    /// The list already satisfied the invariant (or was empty).
    None,
    /// More than one snapshot was flagged active; all but the first were cleared.
    ClearedExtra { kept: SnapshotId, cleared: usize },
    /// No snapshot was flagged active; this one was chosen.
    Elected(SnapshotId),
}

/// Make a freshly loaded list satisfy "exactly one active, or zero if empty".
///
/// Keeps the first active snapshot when several are flagged. When none is,
/// elects the system snapshot, falling back to the first in list order.
pub fn enforce_single_active(snapshots: Vec<KnowledgeSnapshot>) -> (Vec<KnowledgeSnapshot>, ActiveRepair) {
    if snapshots.is_empty() {
        return (snapshots, ActiveRepair::None);
    }

    let active_count = snapshots.iter().filter(|s| s.active).count();
    match active_count {
        1 => (snapshots, ActiveRepair::None),
        0 => {
            let pick = snapshots
                .iter()
                .position(KnowledgeSnapshot::is_system)
                .unwrap_or(0);
            let elected = snapshots[pick].id.clone();
            let repaired = snapshots
                .into_iter()
                .enumerate()
                .map(|(i, s)| KnowledgeSnapshot { active: i == pick, ..s })
                .collect();
            (repaired, ActiveRepair::Elected(elected))
        }
        n => {
            let mut kept = None;
            let repaired = snapshots
                .into_iter()
                .map(|s| {
                    let active = s.active && kept.is_none();
                    if active {
                        kept = Some(s.id.clone());
                    }
                    KnowledgeSnapshot { active, ..s }
                })
                .collect();
            let kept = kept.unwrap_or_else(|| SnapshotId::new(""));
            (repaired, ActiveRepair::ClearedExtra { kept, cleared: n - 1 })
        }
    }
}
