//! Individual registration rows for pickup/night matches and friendlies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MatchId, RegistrationId, Side, UserId};

/// Approval state of an individual registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
}

/// One user signed up for one match.
///
/// Created on sign-up, removed on cancellation, never soft-deleted. The ID is
/// derived from the `(match, user)` pair, so a duplicate sign-up collides
/// instead of silently doubling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,

    pub match_id: MatchId,

    pub user_id: UserId,

    pub status: RegistrationStatus,

    /// HOME/AWAY assignment, NONE until balanced or chosen
    pub side: Side,

    pub created_at: DateTime<Utc>,
}

impl Registration {
    /// Create an approved registration for a user in a match.
    pub fn new(match_id: MatchId, user_id: UserId, side: Side, now: DateTime<Utc>) -> Self {
        let id = RegistrationId::generate(&[match_id.as_str(), user_id.as_str()]);
        Self {
            id,
            match_id,
            user_id,
            status: RegistrationStatus::Approved,
            side,
            created_at: now,
        }
    }
}
