//! Per-team roster submissions for league matches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchId, TeamEntryId, TeamId, UserId};

/// Audit state of a team's league entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamEntryStatus {
    Pending,
    Confirmed,
    Approved,
    Rejected,
}

/// A team's roster submission for a league match.
///
/// Keyed by the `(match, team)` pair; a team resubmitting its roster
/// overwrites the prior one until audited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRegistration {
    pub id: TeamEntryId,

    pub match_id: MatchId,

    pub team_id: TeamId,

    /// Submitted roster, in submission order
    pub player_ids: Vec<UserId>,

    pub status: TeamEntryStatus,

    /// Admin note from audit
    pub feedback: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl TeamRegistration {
    /// Create a confirmed entry for a team in a match.
    pub fn new(
        match_id: MatchId,
        team_id: TeamId,
        player_ids: Vec<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = TeamEntryId::generate(&[match_id.as_str(), team_id.as_str()]);
        Self {
            id,
            match_id,
            team_id,
            player_ids,
            status: TeamEntryStatus::Confirmed,
            feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this entry counts toward the match's `teams` ratio.
    /// Rejected entries stay on file for audit but do not count.
    pub fn countable(&self) -> bool {
        matches!(
            self.status,
            TeamEntryStatus::Pending | TeamEntryStatus::Confirmed | TeamEntryStatus::Approved
        )
    }
}
