//! Client-side analytics: the JSONL event log and trace statistics.

pub mod events;
pub mod reporter;
