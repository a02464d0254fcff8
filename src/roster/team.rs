//! Team registration ledger for league matches.
//!
//! One row per `(team, match)`; a team resubmitting replaces its roster and
//! drops back to `confirmed` until the next audit. The match's `teams`
//! ratio is recomputed from the countable rows after every mutation.

use chrono::{DateTime, Utc};

use super::{LedgerError, TeamRole};
use crate::models::{Match, MatchStatus, TeamEntryId, TeamEntryStatus, TeamRegistration, UserId};

/// Recompute the "filled/capacity" ratio from the countable entries.
pub fn recount_teams(m: &mut Match, entries: &[TeamRegistration]) {
    let count = entries
        .iter()
        .filter(|e| e.match_id == m.id && e.countable())
        .count();
    m.teams = format!("{}/{}", count, m.max_teams);
}

/// Submit (or resubmit) a team's roster for a league match.
pub fn submit(
    m: &mut Match,
    entries: &mut Vec<TeamRegistration>,
    team_role: Option<&TeamRole>,
    player_ids: Vec<UserId>,
    now: DateTime<Utc>,
) -> Result<TeamRegistration, LedgerError> {
    if m.status != MatchStatus::Registering {
        return Err(LedgerError::InvalidState(
            "match is not open for entry".to_string(),
        ));
    }
    let role = team_role
        .ok_or_else(|| LedgerError::InvalidState("you are not on a team".to_string()))?;
    if !role.is_admin {
        return Err(LedgerError::Forbidden(
            "only team admins may enter a league".to_string(),
        ));
    }

    let entry = match entries.iter_mut().find(|e| e.team_id == role.team.id) {
        Some(existing) => {
            existing.player_ids = player_ids;
            existing.status = TeamEntryStatus::Confirmed;
            existing.updated_at = now;
            existing.clone()
        }
        None => {
            let entry =
                TeamRegistration::new(m.id.clone(), role.team.id.clone(), player_ids, now);
            entries.push(entry.clone());
            entry
        }
    };

    recount_teams(m, entries);
    Ok(entry)
}

/// Set the audit verdict on one entry and refresh the parent match's ratio.
pub fn audit(
    m: &mut Match,
    entries: &mut Vec<TeamRegistration>,
    entry_id: &TeamEntryId,
    status: TeamEntryStatus,
    feedback: Option<String>,
    now: DateTime<Utc>,
) -> Result<TeamRegistration, LedgerError> {
    let entry = entries
        .iter_mut()
        .find(|e| e.id == *entry_id)
        .ok_or_else(|| LedgerError::NotFound("registration not found".to_string()))?;

    entry.status = status;
    if feedback.is_some() {
        entry.feedback = feedback;
    }
    entry.updated_at = now;
    let entry = entry.clone();

    recount_teams(m, entries);
    Ok(entry)
}

/// Withdraw the caller's team from a league match (team-admin self-service).
pub fn cancel(
    m: &mut Match,
    entries: &mut Vec<TeamRegistration>,
    team_role: Option<&TeamRole>,
) -> Result<String, LedgerError> {
    if m.status == MatchStatus::Finished {
        return Err(LedgerError::InvalidState(
            "match is already finished".to_string(),
        ));
    }
    let role = team_role
        .ok_or_else(|| LedgerError::InvalidState("you are not on a team".to_string()))?;
    if !role.is_admin {
        return Err(LedgerError::Forbidden(
            "only team admins may cancel the entry".to_string(),
        ));
    }

    let position = entries
        .iter()
        .position(|e| e.team_id == role.team.id)
        .ok_or_else(|| {
            LedgerError::InvalidState("your team has not entered this match".to_string())
        })?;
    entries.remove(position);

    recount_teams(m, entries);
    Ok("Entry cancelled".to_string())
}
