//! vcdash: dashboard client for a vehicle-command assistant backend.
//!
//! Three client-side components sit on top of the backend's HTTP API:
//! the knowledge snapshot manager ([`knowledge`]), the trace reconciliation
//! pipeline ([`trace`]) and the conversation session assembler
//! ([`session`]). The CLI and the local dashboard API are thin surfaces
//! over them.

pub mod analytics;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod locale;
pub mod session;
pub mod trace;
pub mod web;
