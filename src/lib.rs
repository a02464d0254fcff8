//! # Matchday
//!
//! Sports association match lifecycle and roster management service.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (matches, registrations, team entries)
//! - **status**: Pure, time-driven lifecycle status derivation
//! - **roster**: Registration ledgers and the position-bucket squad balancer
//! - **stats**: Goal/assist reconciliation for match report edits
//! - **service**: The orchestration façade, per-match locking, side effects
//! - **directory**: Collaborator interfaces (users, teams, notifications, community)
//! - **store**: Filesystem persistence (JSONL) and collaborator implementations
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod config;
pub mod directory;
pub mod models;
pub mod roster;
pub mod service;
pub mod stats;
pub mod status;
pub mod store;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num * multiplier))
}
