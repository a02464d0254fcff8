//! Stats reconciliation for match report edits.
//!
//! A match's `events` list is replaced wholesale, never appended to. To keep
//! cumulative player stats consistent the reconciler derives one signed
//! delta per player: every old event is subtracted, every new event added,
//! and the two are merged so each player's adjustment applies as a single
//! unit. An unchanged list therefore nets to zero deltas; replaying a
//! report edit cannot double-count.

use std::collections::{BTreeMap, HashSet};

use crate::models::{MatchEvent, Registration, StatsDelta, TeamRegistration, UserId};

/// Compute per-player stat deltas for replacing `old` with `new`.
///
/// Deltas that net to zero are dropped; the rest are returned in a stable
/// (player id) order.
pub fn reconcile(old: &[MatchEvent], new: &[MatchEvent]) -> Vec<(UserId, StatsDelta)> {
    let mut deltas: BTreeMap<UserId, StatsDelta> = BTreeMap::new();

    for event in old {
        if let Some(scorer) = &event.player_id {
            deltas.entry(scorer.clone()).or_default().goals -= 1;
        }
        if let Some(assist) = &event.assist_player_id {
            deltas.entry(assist.clone()).or_default().assists -= 1;
        }
    }

    for event in new {
        if let Some(scorer) = &event.player_id {
            deltas.entry(scorer.clone()).or_default().goals += 1;
        }
        if let Some(assist) = &event.assist_player_id {
            deltas.entry(assist.clone()).or_default().assists += 1;
        }
    }

    deltas.into_iter().filter(|(_, d)| !d.is_zero()).collect()
}

/// Whether a submitted report body is an actual change over the stored one.
pub fn report_changed(stored: Option<&str>, submitted: &str) -> bool {
    stored != Some(submitted)
}

/// Compose the community post mirroring a match report.
pub fn report_post_content(title: &str, score: Option<&str>, report: &str) -> String {
    format!(
        "[Match Report] {}\nScore: {}\n\n{}",
        title,
        score.unwrap_or("not recorded"),
        report
    )
}

/// De-duplicated union of everyone involved in a match: individual
/// registrants plus every roster player of every team entry. Order of first
/// appearance is kept.
pub fn participant_ids(regs: &[Registration], entries: &[TeamRegistration]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for reg in regs {
        if seen.insert(reg.user_id.clone()) {
            ids.push(reg.user_id.clone());
        }
    }
    for entry in entries {
        for player in &entry.player_ids {
            if seen.insert(player.clone()) {
                ids.push(player.clone());
            }
        }
    }

    ids
}
