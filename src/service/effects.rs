//! Fire-and-forget side effects.
//!
//! Core mutations return a list of effects to attempt; the dispatcher runs
//! them after the primary state has been persisted and the match lock
//! released. A failed effect is logged and dropped; it never rolls back or
//! delays the operation that produced it.

use std::sync::Arc;

use tracing::warn;

use crate::directory::{CommunityPublisher, Notifier};
use crate::models::{NotificationKind, UserId};

/// One deferred side effect.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Notify one user.
    Notify {
        user_id: UserId,
        title: String,
        body: String,
        kind: NotificationKind,
        related_id: Option<String>,
    },
    /// Mirror content into the community feed.
    Publish {
        author_id: UserId,
        content: String,
        images: Vec<String>,
    },
}

/// Runs side effects against the notifier and community collaborators.
#[derive(Clone)]
pub struct EffectDispatcher {
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn CommunityPublisher>,
}

impl EffectDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, publisher: Arc<dyn CommunityPublisher>) -> Self {
        Self {
            notifier,
            publisher,
        }
    }

    /// Execute effects in order, logging failures.
    pub async fn run(&self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::Notify {
                    user_id,
                    title,
                    body,
                    kind,
                    related_id,
                } => {
                    if let Err(e) = self
                        .notifier
                        .send(&user_id, &title, &body, kind, related_id.as_deref())
                        .await
                    {
                        warn!("Failed to notify {}: {}", user_id, e);
                    }
                }
                SideEffect::Publish {
                    author_id,
                    content,
                    images,
                } => {
                    if let Err(e) = self.publisher.publish(&author_id, &content, &images).await {
                        warn!("Failed to publish community post: {}", e);
                    }
                }
            }
        }
    }

    /// Run effects on a detached task, after the caller's transaction.
    pub fn dispatch(&self, effects: Vec<SideEffect>) {
        if effects.is_empty() {
            return;
        }
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run(effects).await;
        });
    }
}
