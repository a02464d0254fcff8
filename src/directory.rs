//! Collaborator interfaces.
//!
//! User profiles, team membership, notifications and the community feed are
//! owned by other services. The match core consumes them through these
//! traits; JSONL-backed implementations live in [`crate::store`].

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NotificationKind, StatsDelta, Team, TeamId, User, UserId};

/// Errors surfaced by a collaborator.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::store::StorageError),
}

/// Read and adjust user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, id: &UserId) -> Result<Option<User>, DirectoryError>;

    /// Apply a stats delta to one user as a single unit.
    /// Counters floor at zero; a missing user is a silent no-op.
    async fn adjust_stats(&self, id: &UserId, delta: StatsDelta) -> Result<(), DirectoryError>;
}

/// Read team records.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    async fn find(&self, id: &TeamId) -> Result<Option<Team>, DirectoryError>;

    /// Whether `user_id` administers the team (captain or listed admin).
    async fn is_admin(&self, team_id: &TeamId, user_id: &UserId) -> Result<bool, DirectoryError>;

    /// Resolve the team's current members to user records.
    async fn members(&self, team_id: &TeamId) -> Result<Vec<User>, DirectoryError>;
}

/// Deliver a notification to one user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        user_id: &UserId,
        title: &str,
        body: &str,
        kind: NotificationKind,
        related_id: Option<&str>,
    ) -> Result<(), DirectoryError>;
}

/// Publish a post into the community feed.
#[async_trait]
pub trait CommunityPublisher: Send + Sync {
    async fn publish(
        &self,
        author_id: &UserId,
        content: &str,
        images: &[String],
    ) -> Result<(), DirectoryError>;
}
