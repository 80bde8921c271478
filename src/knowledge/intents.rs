//! Intent rows of the active knowledge base and fill-down resolution.
//!
//! Source rows are run-length compressed: a row that omits `domain`,
//! `ability` or `feature` belongs to the same group as the nearest preceding
//! row that set it. Resolution is a single left-to-right pass carrying the
//! last seen value of each field.

use serde::Serialize;

use crate::backend::wire::{KnowledgePayload, RawIntent};

/// One resolved intent row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentEntry {
    /// 1-based position in load order.
    pub index: usize,
    pub domain: String,
    pub ability: String,
    pub feature: String,
    pub intent: String,
    pub query: String,
}

/// Last non-empty hierarchy values seen so far in a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillDown {
    domain: String,
    ability: String,
    feature: String,
}

impl FillDown {
    /// Resolve one raw row against the carried state, returning the next
    /// state and the resolved entry.
    pub fn step(self, index: usize, raw: &RawIntent) -> (Self, IntentEntry) {
        let next = Self {
            domain: inherit(raw.domain.as_deref(), self.domain),
            ability: inherit(raw.ability.as_deref(), self.ability),
            feature: inherit(raw.feature.as_deref(), self.feature),
        };
        let entry = IntentEntry {
            index,
            domain: next.domain.clone(),
            ability: next.ability.clone(),
            feature: next.feature.clone(),
            intent: raw.intent.clone().unwrap_or_default(),
            query: raw.query.clone().unwrap_or_default(),
        };
        (next, entry)
    }
}

fn inherit(own: Option<&str>, last: String) -> String {
    match own {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => last,
    }
}

/// Resolve an ordered load of raw rows.
pub fn resolve_intents(rows: &[RawIntent]) -> Vec<IntentEntry> {
    rows.iter()
        .enumerate()
        .fold(
            (FillDown::default(), Vec::with_capacity(rows.len())),
            |(state, mut out), (i, raw)| {
                let (state, entry) = state.step(i + 1, raw);
                out.push(entry);
                (state, out)
            },
        )
        .1
}

/// The active knowledge base as shown in the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeBase {
    pub rules: Vec<String>,
    pub intents: Vec<IntentEntry>,
}

impl KnowledgeBase {
    pub fn from_payload(payload: &KnowledgePayload) -> Self {
        Self {
            rules: payload.rules.clone(),
            intents: resolve_intents(&payload.intents),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.intents.is_empty()
    }

    /// Distinct resolved domains in first-seen order.
    pub fn domains(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.intents {
            if !entry.domain.is_empty() && !seen.contains(&entry.domain.as_str()) {
                seen.push(&entry.domain);
            }
        }
        seen
    }

    /// Rows whose `intent` or `query` contains `keyword`, optionally limited
    /// to one domain. Empty criteria match everything.
    pub fn search(&self, keyword: Option<&str>, domain: Option<&str>) -> Vec<&IntentEntry> {
        let keyword = keyword.filter(|k| !k.is_empty());
        let domain = domain.filter(|d| !d.is_empty());

        self.intents
            .iter()
            .filter(|e| domain.is_none_or(|d| e.domain == d))
            .filter(|e| keyword.is_none_or(|k| e.intent.contains(k) || e.query.contains(k)))
            .collect()
    }
}
