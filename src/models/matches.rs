//! Match model and its lifecycle vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchId, TeamId, UserId};

/// The four registration protocols a match can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// Individual pickup match: any user may sign up directly.
    #[serde(rename = "PICKUP")]
    Pickup,

    /// Individual night match, same protocol as pickup.
    #[serde(rename = "NIGHT")]
    Night,

    /// Two-team exhibition: one team challenges, a second accepts.
    #[serde(rename = "TEAM_FRIENDLY")]
    TeamFriendly,

    /// Bracket competition: whole teams submit rosters, subject to audit.
    #[serde(rename = "LEAGUE")]
    League,
}

impl MatchType {
    /// Whether users sign up individually (pickup/night) rather than as teams.
    pub fn is_individual(&self) -> bool {
        matches!(self, MatchType::Pickup | MatchType::Night)
    }
}

/// Lifecycle status, derived from the clock and the match's windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Registration window not yet open.
    Upcoming,
    /// Open for registration.
    Registering,
    /// Registration closed, awaiting kickoff.
    Pending,
    /// In progress.
    Ongoing,
    /// Over.
    Finished,
}

/// Side assignment of an individual registrant within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "HOME")]
    Home,
    #[serde(rename = "AWAY")]
    Away,
    #[serde(rename = "NONE")]
    None,
}

/// One entry in a match's goal/assist timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Minute of the match.
    pub time: u32,

    /// Scorer, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<UserId>,

    /// Assist provider, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assist_player_id: Option<UserId>,

    /// Which side the event counts for.
    pub side: Side,
}

/// A match.
///
/// The match exclusively owns its denormalized counters (`current_players`,
/// the `teams` ratio string) and its event list. Registration rows are owned
/// by the ledgers and only counted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    /// Unique identifier (derived from title + location + initiator + creation time)
    pub id: MatchId,

    /// Display title
    pub title: String,

    /// Registration protocol
    #[serde(rename = "type")]
    pub match_type: MatchType,

    /// Stored lifecycle status; recomputed lazily on every read
    pub status: MatchStatus,

    /// Venue
    pub location: String,

    /// Kickoff, when scheduled
    pub start_time: Option<DateTime<Utc>>,

    /// Final whistle, when scheduled
    pub end_time: Option<DateTime<Utc>>,

    /// Registration window open
    pub registration_start_time: Option<DateTime<Utc>>,

    /// Registration window close
    pub registration_end_time: Option<DateTime<Utc>>,

    /// User who created the match
    pub initiator_id: UserId,

    /// Hosting team (TEAM_FRIENDLY/LEAGUE only)
    pub home_team_id: Option<TeamId>,

    /// Challenging team, set when a friendly is accepted
    pub away_team_id: Option<TeamId>,

    /// Minimum headcount to play
    pub min_players: u32,

    /// Maximum headcount
    pub max_players: u32,

    /// Count of individual registration rows; must always match the ledger
    pub current_players: u32,

    /// "filled/capacity" ratio string, e.g. "2/16" or "1/2"
    pub teams: String,

    /// Entry capacity for LEAGUE matches
    pub max_teams: u32,

    /// Final score, e.g. "3:2"
    pub score: Option<String>,

    /// Published match report
    pub report_content: Option<String>,

    /// Images attached to the report
    #[serde(default)]
    pub report_images: Vec<String>,

    /// Goal/assist timeline, replaced wholesale on report edits
    #[serde(default)]
    pub events: Vec<MatchEvent>,

    /// Whether the 24h reminder has been dispatched
    #[serde(default)]
    pub reminder_sent: bool,

    /// When this record was created
    pub created_at: DateTime<Utc>,

    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Match {
    /// Create a new match with an auto-generated ID and initial counters.
    ///
    /// League matches count entered teams out of `max_teams`; a friendly
    /// starts with its host filling one of two slots.
    pub fn new(
        title: String,
        match_type: MatchType,
        location: String,
        initiator_id: UserId,
        max_teams: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let id = MatchId::generate(&[
            &title,
            &location,
            initiator_id.as_str(),
            &now.to_rfc3339(),
        ]);
        let teams = match match_type {
            MatchType::League => format!("0/{}", max_teams),
            MatchType::TeamFriendly => "1/2".to_string(),
            _ => "0/2".to_string(),
        };

        Self {
            id,
            title,
            match_type,
            status: MatchStatus::Registering,
            location,
            start_time: None,
            end_time: None,
            registration_start_time: None,
            registration_end_time: None,
            initiator_id,
            home_team_id: None,
            away_team_id: None,
            min_players: 0,
            max_players: 0,
            current_players: 0,
            teams,
            max_teams,
            score: None,
            report_content: None,
            report_images: Vec::new(),
            events: Vec::new(),
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method to set the play window.
    pub fn with_schedule(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Builder method to set the registration window.
    pub fn with_registration_window(mut self, open: DateTime<Utc>, close: DateTime<Utc>) -> Self {
        self.registration_start_time = Some(open);
        self.registration_end_time = Some(close);
        self
    }

    /// Builder method to set the hosting team.
    pub fn with_home_team(mut self, team_id: TeamId) -> Self {
        self.home_team_id = Some(team_id);
        self
    }
}
