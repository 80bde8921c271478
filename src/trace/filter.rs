//! Display filters over a reconciled trace list.
//!
//! Criteria compose with logical AND. Filtering never reorders.

use serde::{Deserialize, Serialize};

use super::TraceEntry;

/// How many commands an utterance was split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// Exactly one command.
    Single,
    /// More than one command.
    Multi,
}

impl Cardinality {
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "single" => Some(Self::Single),
            "multi" => Some(Self::Multi),
            _ => None,
        }
    }

    fn admits(self, count: usize) -> bool {
        match self {
            Self::Single => count == 1,
            Self::Multi => count > 1,
        }
    }
}

/// Trace viewer filter. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFilter {
    pub cardinality: Option<Cardinality>,
    pub module: Option<String>,
    /// Case-sensitive substring of the user input.
    pub keyword: Option<String>,
}

impl TraceFilter {
    pub fn is_empty(&self) -> bool {
        self.cardinality.is_none() && self.module.is_none() && self.keyword.is_none()
    }

    pub fn matches(&self, entry: &TraceEntry) -> bool {
        if let Some(kind) = self.cardinality
            && !kind.admits(entry.command_count())
        {
            return false;
        }
        if let Some(module) = self.module.as_deref().filter(|m| !m.is_empty())
            && !entry.modules().contains(module)
        {
            return false;
        }
        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.is_empty())
            && !entry.user_input.contains(keyword)
        {
            return false;
        }
        true
    }
}
