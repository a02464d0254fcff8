//! JSONL-backed implementations of the collaborator interfaces.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{EntityType, JsonlReader, JsonlWriter, StorageConfig, StorageError};
use crate::directory::{CommunityPublisher, DirectoryError, Notifier, TeamDirectory, UserDirectory};
use crate::models::{
    Notification, NotificationKind, Post, StatsDelta, Team, TeamId, User, UserId,
};

/// User/team reads, stat writes, notifications and community posts, all
/// backed by JSONL files in the same data directory as the match store.
pub struct JsonlDirectory {
    config: StorageConfig,
    users: RwLock<HashMap<UserId, User>>,
    teams: RwLock<HashMap<TeamId, Team>>,
}

impl JsonlDirectory {
    /// Load users and teams from the data directory.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let users: Vec<User> = JsonlReader::for_entity(&config, EntityType::User).read_all()?;
        let teams: Vec<Team> = JsonlReader::for_entity(&config, EntityType::Team).read_all()?;

        info!("Loaded {} users, {} teams", users.len(), teams.len());

        Ok(Self {
            config,
            users: RwLock::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
            teams: RwLock::new(teams.into_iter().map(|t| (t.id.clone(), t)).collect()),
        })
    }

    fn persist_users(&self, users: &HashMap<UserId, User>) -> Result<(), StorageError> {
        let mut rows: Vec<&User> = users.values().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        let rows: Vec<User> = rows.into_iter().cloned().collect();
        JsonlWriter::for_entity(&self.config, EntityType::User).write_all(&rows)?;
        Ok(())
    }

    /// Test/seed helper: insert a user and persist.
    pub async fn put_user(&self, user: User) -> Result<(), StorageError> {
        let mut guard = self.users.write().await;
        guard.insert(user.id.clone(), user);
        self.persist_users(&guard)
    }

    /// Test/seed helper: insert a team and persist.
    pub async fn put_team(&self, team: Team) -> Result<(), StorageError> {
        let mut guard = self.teams.write().await;
        guard.insert(team.id.clone(), team);
        let mut rows: Vec<&Team> = guard.values().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        let rows: Vec<Team> = rows.into_iter().cloned().collect();
        JsonlWriter::for_entity(&self.config, EntityType::Team).write_all(&rows)?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for JsonlDirectory {
    async fn find(&self, id: &UserId) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn adjust_stats(&self, id: &UserId, delta: StatsDelta) -> Result<(), DirectoryError> {
        let mut guard = self.users.write().await;
        let Some(user) = guard.get_mut(id) else {
            debug!("Stat adjustment for unknown user {}", id);
            return Ok(());
        };
        user.stats.apply(delta);
        self.persist_users(&guard)?;
        Ok(())
    }
}

#[async_trait]
impl TeamDirectory for JsonlDirectory {
    async fn find(&self, id: &TeamId) -> Result<Option<Team>, DirectoryError> {
        Ok(self.teams.read().await.get(id).cloned())
    }

    async fn is_admin(&self, team_id: &TeamId, user_id: &UserId) -> Result<bool, DirectoryError> {
        Ok(self
            .teams
            .read()
            .await
            .get(team_id)
            .map(|t| t.is_admin(user_id))
            .unwrap_or(false))
    }

    async fn members(&self, team_id: &TeamId) -> Result<Vec<User>, DirectoryError> {
        let member_ids = match self.teams.read().await.get(team_id) {
            Some(team) => team.member_ids.clone(),
            None => return Ok(Vec::new()),
        };
        let users = self.users.read().await;
        Ok(member_ids
            .iter()
            .filter_map(|id| users.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl Notifier for JsonlDirectory {
    async fn send(
        &self,
        user_id: &UserId,
        title: &str,
        body: &str,
        kind: NotificationKind,
        related_id: Option<&str>,
    ) -> Result<(), DirectoryError> {
        let notification = Notification::new(
            user_id.clone(),
            title.to_string(),
            body.to_string(),
            kind,
            related_id.map(|s| s.to_string()),
            Utc::now(),
        );
        JsonlWriter::for_entity(&self.config, EntityType::Notification).append(&notification)?;
        Ok(())
    }
}

#[async_trait]
impl CommunityPublisher for JsonlDirectory {
    async fn publish(
        &self,
        author_id: &UserId,
        content: &str,
        images: &[String],
    ) -> Result<(), DirectoryError> {
        let post = Post::new(
            author_id.clone(),
            content.to_string(),
            images.to_vec(),
            Utc::now(),
        );
        JsonlWriter::for_entity(&self.config, EntityType::Post).append(&post)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlayerStats, Position, Role};

    fn user(id: &str, team: Option<&str>) -> User {
        User {
            id: id.into(),
            name: format!("User {}", id),
            role: Role::User,
            team_id: team.map(|t| t.into()),
            position: Some(Position::Midfielder),
            jersey_number: None,
            phone: None,
            stats: PlayerStats::default(),
        }
    }

    fn team(id: &str, captain: &str, members: &[&str]) -> Team {
        Team {
            id: id.into(),
            name: format!("Team {}", id),
            captain_id: captain.into(),
            admin_ids: vec![],
            member_ids: members.iter().map(|m| (*m).into()).collect(),
        }
    }

    async fn directory() -> (tempfile::TempDir, JsonlDirectory) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = JsonlDirectory::open(StorageConfig::new(tmp.path().to_path_buf())).unwrap();
        (tmp, dir)
    }

    #[tokio::test]
    async fn test_adjust_stats_persists() {
        let (tmp, dir) = directory().await;
        dir.put_user(user("u1", None)).await.unwrap();

        dir.adjust_stats(&"u1".into(), StatsDelta::matches(1))
            .await
            .unwrap();
        dir.adjust_stats(
            &"u1".into(),
            StatsDelta {
                matches: 0,
                goals: 2,
                assists: 0,
            },
        )
        .await
        .unwrap();

        let found = UserDirectory::find(&dir, &"u1".into()).await.unwrap().unwrap();
        assert_eq!(found.stats.matches, 1);
        assert_eq!(found.stats.goals, 2);

        // Reload from disk
        let reloaded =
            JsonlDirectory::open(StorageConfig::new(tmp.path().to_path_buf())).unwrap();
        let found = UserDirectory::find(&reloaded, &"u1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.stats.goals, 2);
    }

    #[tokio::test]
    async fn test_adjust_stats_unknown_user_is_noop() {
        let (_tmp, dir) = directory().await;
        assert!(dir
            .adjust_stats(&"ghost".into(), StatsDelta::matches(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_members_resolves_users() {
        let (_tmp, dir) = directory().await;
        dir.put_user(user("u1", Some("t1"))).await.unwrap();
        dir.put_user(user("u2", Some("t1"))).await.unwrap();
        dir.put_team(team("t1", "u1", &["u1", "u2", "missing"]))
            .await
            .unwrap();

        let members = dir.members(&"t1".into()).await.unwrap();
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn test_is_admin_unknown_team() {
        let (_tmp, dir) = directory().await;
        assert!(!dir.is_admin(&"t9".into(), &"u1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_notifications_append() {
        let (tmp, dir) = directory().await;
        dir.send(
            &"u1".into(),
            "Match report",
            "Published",
            NotificationKind::MatchReport,
            Some("m1"),
        )
        .await
        .unwrap();

        let reader = JsonlReader::<Notification>::for_entity(
            &StorageConfig::new(tmp.path().to_path_buf()),
            EntityType::Notification,
        );
        assert_eq!(reader.read_all().unwrap().len(), 1);
    }
}
