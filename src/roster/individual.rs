//! Individual registration ledger.
//!
//! Covers direct sign-up for pickup/night matches, the single challenger
//! slot on team friendlies, and team-admin roster management (adding or
//! syncing players onto a friendly's sides).

use chrono::{DateTime, Utc};

use super::{LedgerError, TeamRole};
use crate::models::{
    Match, MatchStatus, MatchType, Registration, Side, StatsDelta, User, UserId,
};

/// Result of a registration mutation: a user-facing message plus the stat
/// adjustments the orchestrator should attempt best-effort.
#[derive(Debug)]
pub struct RegisterOutcome {
    pub message: String,
    pub stats: Vec<(UserId, StatsDelta)>,
}

/// Result of a cancellation.
#[derive(Debug)]
pub struct CancelOutcome {
    pub message: String,
    pub stats: Vec<(UserId, StatsDelta)>,
}

/// Result of a team-roster sync.
#[derive(Debug)]
pub struct SyncOutcome {
    pub message: String,
    pub added_count: u32,
    pub stats: Vec<(UserId, StatsDelta)>,
}

/// Pick the side with fewer registrants; ties go HOME.
fn balanced_side(regs: &[Registration]) -> Side {
    let home = regs.iter().filter(|r| r.side == Side::Home).count();
    let away = regs.iter().filter(|r| r.side == Side::Away).count();
    if home <= away {
        Side::Home
    } else {
        Side::Away
    }
}

/// Sign the caller up for a match.
///
/// For a friendly this is a challenge-accept, not a roster add: the caller's
/// team takes the away slot and the match goes ongoing. League matches are
/// rejected here; they register whole teams through the team ledger.
pub fn register(
    m: &mut Match,
    regs: &mut Vec<Registration>,
    user: &User,
    team_role: Option<&TeamRole>,
    requested: Option<Side>,
    now: DateTime<Utc>,
) -> Result<RegisterOutcome, LedgerError> {
    if m.status != MatchStatus::Registering {
        return Err(LedgerError::InvalidState(
            "match is not open for registration".to_string(),
        ));
    }

    match m.match_type {
        MatchType::League => Err(LedgerError::InvalidState(
            "league entry goes through the team channel".to_string(),
        )),
        MatchType::TeamFriendly => {
            let role = team_role.ok_or_else(|| {
                LedgerError::InvalidState("you are not on a team".to_string())
            })?;
            if m.home_team_id.as_ref() == Some(&role.team.id) {
                return Err(LedgerError::InvalidState(
                    "cannot challenge your own team".to_string(),
                ));
            }
            if !role.is_admin {
                return Err(LedgerError::Forbidden(
                    "only team admins may accept a challenge".to_string(),
                ));
            }
            if m.away_team_id.is_some() {
                return Err(LedgerError::Conflict(
                    "this match already has a challenger".to_string(),
                ));
            }

            m.away_team_id = Some(role.team.id.clone());
            m.status = MatchStatus::Ongoing;
            m.teams = "2/2".to_string();
            regs.push(Registration::new(
                m.id.clone(),
                user.id.clone(),
                Side::Away,
                now,
            ));
            m.current_players += 1;

            Ok(RegisterOutcome {
                message: "Challenge accepted".to_string(),
                stats: Vec::new(),
            })
        }
        MatchType::Pickup | MatchType::Night => {
            if regs.iter().any(|r| r.user_id == user.id) {
                return Err(LedgerError::Conflict(
                    "you are already registered".to_string(),
                ));
            }

            let side = match requested {
                Some(side) if side != Side::None => side,
                _ => balanced_side(regs),
            };

            regs.push(Registration::new(m.id.clone(), user.id.clone(), side, now));
            m.current_players += 1;

            Ok(RegisterOutcome {
                message: "Registered".to_string(),
                stats: vec![(user.id.clone(), StatsDelta::matches(1))],
            })
        }
    }
}

/// Cancel the caller's participation.
///
/// A team admin on the away side of a friendly withdraws the whole
/// challenge: every away registration goes, the opponent slot reopens, and
/// an ongoing match drops back to registering immediately rather than on
/// the next read.
pub fn cancel(
    m: &mut Match,
    regs: &mut Vec<Registration>,
    user: &User,
    team_role: Option<&TeamRole>,
) -> Result<CancelOutcome, LedgerError> {
    if m.status == MatchStatus::Finished {
        return Err(LedgerError::InvalidState(
            "match is already finished".to_string(),
        ));
    }

    if m.match_type == MatchType::TeamFriendly {
        if let Some(role) = team_role {
            if m.away_team_id.as_ref() == Some(&role.team.id) && role.is_admin {
                let before = regs.len();
                regs.retain(|r| r.side != Side::Away);
                let removed = (before - regs.len()) as u32;

                m.away_team_id = None;
                if m.status == MatchStatus::Ongoing {
                    m.status = MatchStatus::Registering;
                }
                m.teams = "1/2".to_string();
                m.current_players = m.current_players.saturating_sub(removed);

                return Ok(CancelOutcome {
                    message: "Challenge withdrawn".to_string(),
                    stats: Vec::new(),
                });
            }
        }
    }

    let position = regs
        .iter()
        .position(|r| r.user_id == user.id)
        .ok_or_else(|| {
            LedgerError::InvalidState("you are not registered for this match".to_string())
        })?;
    regs.remove(position);
    m.current_players = m.current_players.saturating_sub(1);

    Ok(CancelOutcome {
        message: "Registration cancelled".to_string(),
        stats: vec![(user.id.clone(), StatsDelta::matches(-1))],
    })
}

/// Check that the caller administers the team occupying `side`.
fn side_admin_gate(
    m: &Match,
    team_role: Option<&TeamRole>,
    side: Side,
) -> Result<(), LedgerError> {
    let side_team = match side {
        Side::Home => m.home_team_id.as_ref(),
        Side::Away => m.away_team_id.as_ref(),
        Side::None => {
            return Err(LedgerError::InvalidState("a side is required".to_string()))
        }
    };
    let side_team = side_team.ok_or_else(|| {
        LedgerError::InvalidState("no team on that side yet".to_string())
    })?;

    let role = team_role
        .ok_or_else(|| LedgerError::Forbidden("you are not on a team".to_string()))?;
    if role.team.id != *side_team {
        return Err(LedgerError::Forbidden(
            "you are not a member of that team".to_string(),
        ));
    }
    if !role.is_admin {
        return Err(LedgerError::Forbidden(
            "only team admins may manage the roster".to_string(),
        ));
    }
    Ok(())
}

/// Add one player to a friendly's side (team-admin only).
pub fn add_player(
    m: &mut Match,
    regs: &mut Vec<Registration>,
    team_role: Option<&TeamRole>,
    target: &User,
    side: Side,
    now: DateTime<Utc>,
) -> Result<RegisterOutcome, LedgerError> {
    side_admin_gate(m, team_role, side)?;

    if let Some(existing) = regs.iter().find(|r| r.user_id == target.id) {
        if existing.side == side {
            return Ok(RegisterOutcome {
                message: "Player is already on that side".to_string(),
                stats: Vec::new(),
            });
        }
        return Err(LedgerError::Conflict(
            "player is already registered on the other side".to_string(),
        ));
    }

    regs.push(Registration::new(m.id.clone(), target.id.clone(), side, now));
    m.current_players += 1;

    Ok(RegisterOutcome {
        message: "Player added".to_string(),
        stats: vec![(target.id.clone(), StatsDelta::matches(1))],
    })
}

/// Register every not-yet-registered team member onto `side`.
pub fn sync_team_players(
    m: &mut Match,
    regs: &mut Vec<Registration>,
    team_role: Option<&TeamRole>,
    members: &[User],
    side: Side,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, LedgerError> {
    side_admin_gate(m, team_role, side)?;

    if members.is_empty() {
        return Ok(SyncOutcome {
            message: "Team has no members".to_string(),
            added_count: 0,
            stats: Vec::new(),
        });
    }

    let mut stats = Vec::new();
    let mut added = 0u32;
    for member in members {
        if regs.iter().any(|r| r.user_id == member.id) {
            continue;
        }
        regs.push(Registration::new(m.id.clone(), member.id.clone(), side, now));
        stats.push((member.id.clone(), StatsDelta::matches(1)));
        added += 1;
    }
    m.current_players += added;

    Ok(SyncOutcome {
        message: format!("Sync complete, {} players added", added),
        added_count: added,
        stats,
    })
}
