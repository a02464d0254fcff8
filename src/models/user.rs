//! User records as seen through the user collaborator.
//!
//! Profile CRUD lives outside this service; the core reads users for
//! permission checks and adjusts their cumulative stats.

use serde::{Deserialize, Serialize};

use super::{TeamId, UserId};

/// Platform role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// Primary declared position, used by the squad balancer's bucket order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

/// Cumulative per-player counters, floored at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub matches: u32,
    #[serde(default)]
    pub goals: u32,
    #[serde(default)]
    pub assists: u32,
}

/// A signed adjustment to a player's stats, applied as one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub matches: i32,
    pub goals: i32,
    pub assists: i32,
}

impl StatsDelta {
    /// A delta touching only the match counter.
    pub fn matches(n: i32) -> Self {
        Self {
            matches: n,
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.matches == 0 && self.goals == 0 && self.assists == 0
    }
}

impl PlayerStats {
    /// Apply a delta, saturating at zero on the way down.
    pub fn apply(&mut self, delta: StatsDelta) {
        self.matches = self.matches.saturating_add_signed(delta.matches);
        self.goals = self.goals.saturating_add_signed(delta.goals);
        self.assists = self.assists.saturating_add_signed(delta.assists);
    }
}

/// A user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    pub name: String,

    #[serde(default)]
    pub role: Role,

    /// Team the user belongs to, if any
    pub team_id: Option<TeamId>,

    /// Primary declared position
    pub position: Option<Position>,

    pub jersey_number: Option<u32>,

    pub phone: Option<String>,

    #[serde(default)]
    pub stats: PlayerStats,
}

impl User {
    /// Whether this user may use the platform-admin surfaces.
    pub fn is_platform_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }
}
