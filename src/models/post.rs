//! Community feed rows produced by the publisher collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// A community post, e.g. a mirrored match report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,

    pub author_id: UserId,

    pub content: String,

    #[serde(default)]
    pub images: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        author_id: UserId,
        content: String,
        images: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            content,
            images,
            created_at: now,
        }
    }
}
