//! Trace reporter: aggregate statistics over the current trace list.
//!
//! Provides the numbers behind `vcdash stats` and `GET /api/stats`:
//! command cardinality distribution, per-module command counts, latency
//! and token totals.

use std::collections::HashMap;

use serde::Serialize;

use crate::trace::TraceEntry;

// ---------------------------------------------------------------------------
// Aggregated stats
// ---------------------------------------------------------------------------

/// Summary statistics for `vcdash stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceStats {
    pub total_entries: usize,
    pub cardinality: CardinalityDistribution,
    /// Command counts per module, most frequent first.
    pub module_stats: Vec<ModuleStat>,
    pub avg_latency_ms: f64,
    pub total_tokens: u64,
    /// Entries whose stored payload could not be decoded.
    pub degraded: usize,
}

/// How many recognized commands each exchange produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardinalityDistribution {
    pub single: usize,
    pub multi: usize,
    pub empty: usize,
}

impl CardinalityDistribution {
    pub fn total(&self) -> usize {
        self.single + self.multi + self.empty
    }

    /// Percentage for a given bucket, returns 0.0 if total is zero.
    pub fn pct(&self, count: usize) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (count as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStat {
    pub module: String,
    /// Commands routed to this module.
    pub commands: usize,
    /// Exchanges with at least one command for this module.
    pub entries: usize,
}

// ---------------------------------------------------------------------------
// Stats computation
// ---------------------------------------------------------------------------

pub fn build_stats(entries: &[TraceEntry]) -> TraceStats {
    if entries.is_empty() {
        return TraceStats::default();
    }

    let total_entries = entries.len();
    let total_latency: u64 = entries.iter().map(|e| e.latency_ms).sum();

    TraceStats {
        total_entries,
        cardinality: compute_cardinality(entries),
        module_stats: compute_module_stats(entries),
        avg_latency_ms: total_latency as f64 / total_entries as f64,
        total_tokens: entries.iter().map(|e| e.token_count).sum(),
        degraded: entries.iter().filter(|e| e.degraded).count(),
    }
}

fn compute_cardinality(entries: &[TraceEntry]) -> CardinalityDistribution {
    let mut dist = CardinalityDistribution::default();
    for entry in entries {
        match entry.command_count() {
            0 => dist.empty += 1,
            1 => dist.single += 1,
            _ => dist.multi += 1,
        }
    }
    dist
}

/// Sorted by command count descending, then module name.
fn compute_module_stats(entries: &[TraceEntry]) -> Vec<ModuleStat> {
    let mut commands: HashMap<String, usize> = HashMap::new();
    let mut touched: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        for command in entry.commands() {
            if !command.module.is_empty() {
                *commands.entry(command.module).or_default() += 1;
            }
        }
        for module in entry.modules() {
            *touched.entry(module).or_default() += 1;
        }
    }

    let mut stats: Vec<ModuleStat> = commands
        .into_iter()
        .map(|(module, count)| ModuleStat {
            entries: touched.get(&module).copied().unwrap_or(0),
            module,
            commands: count,
        })
        .collect();

    stats.sort_by(|a, b| b.commands.cmp(&a.commands).then_with(|| a.module.cmp(&b.module)));
    stats
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
