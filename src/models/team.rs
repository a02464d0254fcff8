//! Team records as seen through the team collaborator.

use serde::{Deserialize, Serialize};

use super::{TeamId, UserId};

/// A team record.
///
/// Membership workflows live outside this service; the core reads teams for
/// admin checks and member enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,

    pub name: String,

    /// Founder; always an admin
    pub captain_id: UserId,

    /// Additional admins
    #[serde(default)]
    pub admin_ids: Vec<UserId>,

    /// Current members
    #[serde(default)]
    pub member_ids: Vec<UserId>,
}

impl Team {
    /// Whether a user administers this team (captain or listed admin).
    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.captain_id == *user_id || self.admin_ids.contains(user_id)
    }
}
