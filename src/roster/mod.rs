//! Registration ledgers and squad balancing.
//!
//! The functions here are the pure core of every roster mutation: they
//! validate state and permissions against data the orchestrator already
//! loaded, mutate the match and its rows in place, and report the stat
//! adjustments the caller should attempt. Nothing in this module touches
//! storage or collaborators.

pub mod balance;
pub mod individual;
pub mod team;

use thiserror::Error;

use crate::models::Team;

/// Domain errors, mapped to HTTP statuses at the API boundary.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Match is busy, please retry")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(#[from] crate::store::StorageError),

    #[error("Collaborator error: {0}")]
    Directory(#[from] crate::directory::DirectoryError),
}

/// The caller's team and their standing in it, resolved by the orchestrator.
#[derive(Debug, Clone)]
pub struct TeamRole {
    pub team: Team,
    pub is_admin: bool,
}
