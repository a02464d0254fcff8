//! In-memory match state with write-through JSONL persistence.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;

use super::{EntityType, JsonlReader, JsonlWriter, StorageConfig, StorageError};
use crate::models::{Match, MatchId, Registration, TeamEntryId, TeamId, TeamRegistration};

/// Owns matches and their registration rows.
///
/// The in-memory maps are authoritative at runtime; every mutation rewrites
/// the backing JSONL file while still holding the write guard, so file
/// writers never interleave.
pub struct MatchStore {
    config: StorageConfig,
    matches: RwLock<HashMap<MatchId, Match>>,
    registrations: RwLock<Vec<Registration>>,
    entries: RwLock<Vec<TeamRegistration>>,
}

impl MatchStore {
    /// Load the store from the data directory.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let matches: Vec<Match> =
            JsonlReader::for_entity(&config, EntityType::Match).read_all()?;
        let registrations =
            JsonlReader::for_entity(&config, EntityType::Registration).read_all()?;
        let entries =
            JsonlReader::for_entity(&config, EntityType::TeamRegistration).read_all()?;

        info!(
            "Loaded {} matches, {} registrations, {} team entries",
            matches.len(),
            registrations.len(),
            entries.len()
        );

        Ok(Self {
            config,
            matches: RwLock::new(matches.into_iter().map(|m| (m.id.clone(), m)).collect()),
            registrations: RwLock::new(registrations),
            entries: RwLock::new(entries),
        })
    }

    fn persist_matches(&self, matches: &HashMap<MatchId, Match>) -> Result<(), StorageError> {
        let mut rows: Vec<&Match> = matches.values().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let rows: Vec<Match> = rows.into_iter().cloned().collect();
        JsonlWriter::for_entity(&self.config, EntityType::Match).write_all(&rows)?;
        Ok(())
    }

    fn persist_registrations(&self, rows: &[Registration]) -> Result<(), StorageError> {
        JsonlWriter::for_entity(&self.config, EntityType::Registration).write_all(rows)?;
        Ok(())
    }

    fn persist_entries(&self, rows: &[TeamRegistration]) -> Result<(), StorageError> {
        JsonlWriter::for_entity(&self.config, EntityType::TeamRegistration).write_all(rows)?;
        Ok(())
    }

    /// All matches, newest first.
    pub async fn matches(&self) -> Vec<Match> {
        let guard = self.matches.read().await;
        let mut rows: Vec<Match> = guard.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        rows
    }

    pub async fn find_match(&self, id: &MatchId) -> Option<Match> {
        self.matches.read().await.get(id).cloned()
    }

    /// Insert or replace a match and persist.
    pub async fn save_match(&self, m: Match) -> Result<(), StorageError> {
        let mut guard = self.matches.write().await;
        guard.insert(m.id.clone(), m);
        self.persist_matches(&guard)
    }

    /// Remove a match and cascade its registration rows of both kinds.
    pub async fn delete_match(&self, id: &MatchId) -> Result<(), StorageError> {
        let mut matches = self.matches.write().await;
        matches.remove(id);
        self.persist_matches(&matches)?;

        let mut regs = self.registrations.write().await;
        regs.retain(|r| r.match_id != *id);
        self.persist_registrations(&regs)?;

        let mut entries = self.entries.write().await;
        entries.retain(|e| e.match_id != *id);
        self.persist_entries(&entries)
    }

    pub async fn registrations_for(&self, match_id: &MatchId) -> Vec<Registration> {
        self.registrations
            .read()
            .await
            .iter()
            .filter(|r| r.match_id == *match_id)
            .cloned()
            .collect()
    }

    pub async fn all_registrations(&self) -> Vec<Registration> {
        self.registrations.read().await.clone()
    }

    /// Replace one match's individual rows with `rows` and persist.
    pub async fn replace_registrations(
        &self,
        match_id: &MatchId,
        rows: Vec<Registration>,
    ) -> Result<(), StorageError> {
        let mut guard = self.registrations.write().await;
        guard.retain(|r| r.match_id != *match_id);
        guard.extend(rows);
        self.persist_registrations(&guard)
    }

    pub async fn team_entries_for(&self, match_id: &MatchId) -> Vec<TeamRegistration> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.match_id == *match_id)
            .cloned()
            .collect()
    }

    /// All team entries, newest first.
    pub async fn all_team_entries(&self) -> Vec<TeamRegistration> {
        let mut rows = self.entries.read().await.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        rows
    }

    pub async fn find_team_entry(&self, id: &TeamEntryId) -> Option<TeamRegistration> {
        self.entries.read().await.iter().find(|e| e.id == *id).cloned()
    }

    pub async fn find_team_entry_for(
        &self,
        match_id: &MatchId,
        team_id: &TeamId,
    ) -> Option<TeamRegistration> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.match_id == *match_id && e.team_id == *team_id)
            .cloned()
    }

    /// Replace one match's team entries with `rows` and persist.
    pub async fn replace_team_entries(
        &self,
        match_id: &MatchId,
        rows: Vec<TeamRegistration>,
    ) -> Result<(), StorageError> {
        let mut guard = self.entries.write().await;
        guard.retain(|e| e.match_id != *match_id);
        guard.extend(rows);
        self.persist_entries(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchType, Side};
    use chrono::Utc;

    fn store() -> (tempfile::TempDir, MatchStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = MatchStore::open(StorageConfig::new(tmp.path().to_path_buf())).unwrap();
        (tmp, store)
    }

    fn make_match(title: &str) -> Match {
        Match::new(
            title.to_string(),
            MatchType::Pickup,
            "North Field".to_string(),
            "u1".into(),
            2,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(tmp.path().to_path_buf());

        let m = make_match("Sunday Pickup");
        let id = m.id.clone();
        {
            let store = MatchStore::open(config.clone()).unwrap();
            store.save_match(m).await.unwrap();
            store
                .replace_registrations(
                    &id,
                    vec![Registration::new(id.clone(), "u1".into(), Side::None, Utc::now())],
                )
                .await
                .unwrap();
        }

        // A fresh store sees the persisted state
        let store = MatchStore::open(config).unwrap();
        assert!(store.find_match(&id).await.is_some());
        assert_eq!(store.registrations_for(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (_tmp, store) = store();
        let m = make_match("Sunday Pickup");
        let id = m.id.clone();
        store.save_match(m).await.unwrap();
        store
            .replace_registrations(
                &id,
                vec![Registration::new(id.clone(), "u1".into(), Side::None, Utc::now())],
            )
            .await
            .unwrap();
        store
            .replace_team_entries(
                &id,
                vec![TeamRegistration::new(id.clone(), "t1".into(), vec![], Utc::now())],
            )
            .await
            .unwrap();

        store.delete_match(&id).await.unwrap();

        assert!(store.find_match(&id).await.is_none());
        assert!(store.registrations_for(&id).await.is_empty());
        assert!(store.team_entries_for(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_replace_scoped_to_match() {
        let (_tmp, store) = store();
        let a = make_match("A");
        let b = make_match("B");
        let (id_a, id_b) = (a.id.clone(), b.id.clone());
        store.save_match(a).await.unwrap();
        store.save_match(b).await.unwrap();

        store
            .replace_registrations(
                &id_a,
                vec![Registration::new(id_a.clone(), "u1".into(), Side::None, Utc::now())],
            )
            .await
            .unwrap();
        store
            .replace_registrations(
                &id_b,
                vec![Registration::new(id_b.clone(), "u2".into(), Side::None, Utc::now())],
            )
            .await
            .unwrap();

        // Clearing A's rows leaves B's untouched
        store.replace_registrations(&id_a, vec![]).await.unwrap();
        assert!(store.registrations_for(&id_a).await.is_empty());
        assert_eq!(store.registrations_for(&id_b).await.len(), 1);
    }

    #[tokio::test]
    async fn test_entry_lookup_by_pair() {
        let (_tmp, store) = store();
        let m = make_match("League");
        let id = m.id.clone();
        store.save_match(m).await.unwrap();

        let entry = TeamRegistration::new(id.clone(), "t1".into(), vec!["u1".into()], Utc::now());
        let entry_id = entry.id.clone();
        store.replace_team_entries(&id, vec![entry]).await.unwrap();

        assert!(store.find_team_entry(&entry_id).await.is_some());
        assert!(store.find_team_entry_for(&id, &"t1".into()).await.is_some());
        assert!(store.find_team_entry_for(&id, &"t2".into()).await.is_none());
    }
}
