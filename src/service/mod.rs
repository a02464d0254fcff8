//! Match orchestration façade.
//!
//! Every mutating operation funnels through [`MatchService`]: it takes the
//! per-match lock, loads the authoritative rows, delegates to the pure
//! ledger/balancer/reconciler functions, persists the match and its derived
//! counters in the same atomic unit, applies best-effort stat writes and
//! finally hands fire-and-forget effects to the dispatcher.

pub mod effects;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::directory::{CommunityPublisher, Notifier, TeamDirectory, UserDirectory};
use crate::models::{
    Match, MatchEvent, MatchId, MatchType, NotificationKind, Registration, Side, StatsDelta,
    Team, TeamEntryId, TeamEntryStatus, TeamRegistration, User, UserId,
};
use crate::roster::{balance, individual, team, LedgerError, TeamRole};
use crate::stats;
use crate::status;
use crate::store::MatchStore;
use effects::{EffectDispatcher, SideEffect};

/// Per-match lock acquisition policy.
#[derive(Debug, Clone)]
pub struct LockSettings {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 3,
        }
    }
}

/// Request body for creating a match.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMatchRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub match_type: MatchType,
    pub location: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub registration_start_time: Option<DateTime<Utc>>,
    pub registration_end_time: Option<DateTime<Utc>>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub max_teams: Option<u32>,
    /// Initiator's requested side for the automatic self-registration
    pub side: Option<Side>,
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPatch {
    pub title: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub registration_start_time: Option<DateTime<Utc>>,
    pub registration_end_time: Option<DateTime<Utc>>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub score: Option<String>,
    pub report_content: Option<String>,
    pub report_images: Option<Vec<String>>,
    pub events: Option<Vec<MatchEvent>>,
}

/// A team plus its resolved member records, for match detail views.
#[derive(Debug, Serialize)]
pub struct TeamSummary {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<User>,
}

/// A match enriched with its registration rows and team summaries.
#[derive(Debug, Serialize)]
pub struct MatchDetail {
    #[serde(flatten)]
    pub record: Match,
    pub registrations: Vec<Registration>,
    pub team_registrations: Vec<TeamRegistration>,
    pub home_team: Option<TeamSummary>,
    pub away_team: Option<TeamSummary>,
}

/// One row of the admin export.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub match_title: String,
    pub team_name: String,
    pub status: TeamEntryStatus,
    pub players: Vec<ExportPlayer>,
}

#[derive(Debug, Serialize)]
pub struct ExportPlayer {
    pub name: String,
    pub jersey_number: Option<u32>,
    pub phone: Option<String>,
}

/// Outcome of the counter repair pass.
#[derive(Debug, Serialize)]
pub struct RepairReport {
    pub checked: usize,
    pub repaired: usize,
}

/// The match lifecycle and roster management façade.
pub struct MatchService {
    store: Arc<MatchStore>,
    users: Arc<dyn UserDirectory>,
    teams: Arc<dyn TeamDirectory>,
    effects: EffectDispatcher,
    locking: LockSettings,
    locks: Mutex<HashMap<MatchId, Arc<Mutex<()>>>>,
}

impl MatchService {
    pub fn new(
        store: Arc<MatchStore>,
        users: Arc<dyn UserDirectory>,
        teams: Arc<dyn TeamDirectory>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn CommunityPublisher>,
        locking: LockSettings,
    ) -> Self {
        Self {
            store,
            users,
            teams,
            effects: EffectDispatcher::new(notifier, publisher),
            locking,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the per-match lock, retrying a bounded number of times before
    /// surfacing a retryable error.
    async fn lock_match(&self, id: &MatchId) -> Result<OwnedMutexGuard<()>, LedgerError> {
        let cell = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let attempts = self.locking.retries.max(1);
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.locking.timeout, cell.clone().lock_owned()).await {
                Ok(guard) => return Ok(guard),
                Err(_) => {
                    debug!("Lock attempt {}/{} timed out for match {}", attempt, attempts, id);
                }
            }
        }

        warn!("Giving up on lock for match {}", id);
        Err(LedgerError::Busy)
    }

    async fn require_user(&self, id: &UserId) -> Result<User, LedgerError> {
        self.users
            .find(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound("user does not exist".to_string()))
    }

    async fn require_match(&self, id: &MatchId) -> Result<Match, LedgerError> {
        self.store
            .find_match(id)
            .await
            .ok_or_else(|| LedgerError::NotFound("match does not exist".to_string()))
    }

    /// Resolve the caller's team and their standing in it, if any.
    async fn team_role_of(&self, user: &User) -> Result<Option<TeamRole>, LedgerError> {
        let Some(team_id) = &user.team_id else {
            return Ok(None);
        };
        let Some(team) = self.teams.find(team_id).await? else {
            return Ok(None);
        };
        let is_admin = self.teams.is_admin(&team.id, &user.id).await?;
        Ok(Some(TeamRole { team, is_admin }))
    }

    fn require_initiator_or_admin(&self, m: &Match, user: &User) -> Result<(), LedgerError> {
        if user.is_platform_admin() || m.initiator_id == user.id {
            Ok(())
        } else {
            Err(LedgerError::Forbidden(
                "only the initiator or a platform admin may do this".to_string(),
            ))
        }
    }

    /// Recompute the stored status and persist only on change.
    async fn refresh_status(&self, m: &mut Match, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if status::apply(m, now) {
            self.store.save_match(m.clone()).await?;
        }
        Ok(())
    }

    /// Best-effort stat writes; failures are logged, never surfaced.
    async fn apply_stats(&self, deltas: &[(UserId, StatsDelta)]) {
        for (user_id, delta) in deltas {
            if let Err(e) = self.users.adjust_stats(user_id, *delta).await {
                warn!("Failed to adjust stats for {}: {}", user_id, e);
            }
        }
    }

    /// All matches, status-resolved, newest first.
    pub async fn find_all(&self) -> Result<Vec<Match>, LedgerError> {
        let now = Utc::now();
        let mut matches = self.store.matches().await;
        for m in &mut matches {
            self.refresh_status(m, now).await?;
        }
        Ok(matches)
    }

    async fn team_summary(&self, id: &crate::models::TeamId) -> Result<Option<TeamSummary>, LedgerError> {
        let Some(team) = self.teams.find(id).await? else {
            return Ok(None);
        };
        let members = self.teams.members(id).await?;
        Ok(Some(TeamSummary { team, members }))
    }

    /// One match, status-resolved and enriched with rows and team summaries.
    pub async fn find_one(&self, id: &MatchId) -> Result<MatchDetail, LedgerError> {
        let mut m = self.require_match(id).await?;
        self.refresh_status(&mut m, Utc::now()).await?;

        let registrations = self.store.registrations_for(id).await;
        let team_registrations = self.store.team_entries_for(id).await;
        let home_team = match &m.home_team_id {
            Some(team_id) => self.team_summary(team_id).await?,
            None => None,
        };
        let away_team = match &m.away_team_id {
            Some(team_id) => self.team_summary(team_id).await?,
            None => None,
        };

        Ok(MatchDetail {
            record: m,
            registrations,
            team_registrations,
            home_team,
            away_team,
        })
    }

    /// Create a match. Leagues are platform-admin only; friendlies require a
    /// team admin and pin the caller's team as host. The initiator (or the
    /// whole host team) is auto-registered; a failure there is logged, not
    /// surfaced.
    pub async fn create(
        &self,
        user_id: &UserId,
        req: CreateMatchRequest,
    ) -> Result<Match, LedgerError> {
        let user = self.require_user(user_id).await?;
        let now = Utc::now();

        let mut home_team: Option<Team> = None;
        match req.match_type {
            MatchType::League => {
                if !user.is_platform_admin() {
                    return Err(LedgerError::Forbidden(
                        "only platform admins may create a league".to_string(),
                    ));
                }
            }
            MatchType::TeamFriendly => {
                let role = self.team_role_of(&user).await?.ok_or_else(|| {
                    LedgerError::InvalidState("you are not on a team".to_string())
                })?;
                if !role.is_admin {
                    return Err(LedgerError::Forbidden(
                        "only team admins may start a friendly".to_string(),
                    ));
                }
                home_team = Some(role.team);
            }
            _ => {}
        }

        let max_teams = req.max_teams.unwrap_or(match req.match_type {
            MatchType::League => 16,
            _ => 2,
        });

        let mut m = Match::new(
            req.title,
            req.match_type,
            req.location,
            user_id.clone(),
            max_teams,
            now,
        );
        m.start_time = req.start_time;
        m.end_time = req.end_time;
        m.registration_start_time = req.registration_start_time;
        m.registration_end_time = req.registration_end_time;
        m.min_players = req.min_players.unwrap_or(0);
        m.max_players = req.max_players.unwrap_or(0);
        if let Some(team) = &home_team {
            m.home_team_id = Some(team.id.clone());
        }

        self.store.save_match(m.clone()).await?;
        info!("Created {:?} match {} ({})", m.match_type, m.id, m.title);

        if let Err(e) = self
            .auto_join(&mut m, &user, home_team.as_ref(), req.side, now)
            .await
        {
            warn!("Auto-join after match creation failed: {}", e);
        }

        Ok(m)
    }

    async fn auto_join(
        &self,
        m: &mut Match,
        initiator: &User,
        home_team: Option<&Team>,
        side: Option<Side>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        match m.match_type {
            MatchType::Pickup | MatchType::Night => {
                let reg = Registration::new(
                    m.id.clone(),
                    initiator.id.clone(),
                    side.unwrap_or(Side::None),
                    now,
                );
                self.store.replace_registrations(&m.id, vec![reg]).await?;
                m.current_players = 1;
                self.store.save_match(m.clone()).await?;
                self.apply_stats(&[(initiator.id.clone(), StatsDelta::matches(1))])
                    .await;
            }
            MatchType::TeamFriendly => {
                let Some(team) = home_team else {
                    return Ok(());
                };
                let members = self.teams.members(&team.id).await?;
                if members.is_empty() {
                    return Ok(());
                }
                let regs: Vec<Registration> = members
                    .iter()
                    .map(|u| Registration::new(m.id.clone(), u.id.clone(), Side::Home, now))
                    .collect();
                m.current_players = regs.len() as u32;
                self.store.replace_registrations(&m.id, regs).await?;
                self.store.save_match(m.clone()).await?;
                let deltas: Vec<(UserId, StatsDelta)> = members
                    .iter()
                    .map(|u| (u.id.clone(), StatsDelta::matches(1)))
                    .collect();
                self.apply_stats(&deltas).await;
            }
            MatchType::League => {}
        }
        Ok(())
    }

    /// Apply a partial update. A new `events` list triggers stat
    /// reconciliation; a changed report mirrors to the community feed and
    /// notifies every participant except the editor.
    pub async fn update(
        &self,
        user_id: &UserId,
        id: &MatchId,
        patch: MatchPatch,
    ) -> Result<Match, LedgerError> {
        let _guard = self.lock_match(id).await?;
        let mut m = self.require_match(id).await?;
        let user = self.require_user(user_id).await?;
        self.require_initiator_or_admin(&m, &user)?;

        let now = Utc::now();
        let old_events = m.events.clone();

        if let Some(v) = patch.title {
            m.title = v;
        }
        if let Some(v) = patch.location {
            m.location = v;
        }
        if let Some(v) = patch.start_time {
            m.start_time = Some(v);
        }
        if let Some(v) = patch.end_time {
            m.end_time = Some(v);
        }
        if let Some(v) = patch.registration_start_time {
            m.registration_start_time = Some(v);
        }
        if let Some(v) = patch.registration_end_time {
            m.registration_end_time = Some(v);
        }
        if let Some(v) = patch.min_players {
            m.min_players = v;
        }
        if let Some(v) = patch.max_players {
            m.max_players = v;
        }
        if let Some(v) = patch.score {
            m.score = Some(v);
        }
        if let Some(v) = patch.report_images {
            m.report_images = v;
        }

        let mut stat_deltas = Vec::new();
        if let Some(new_events) = patch.events {
            stat_deltas = stats::reconcile(&old_events, &new_events);
            m.events = new_events;
        }

        let report_was_changed = match &patch.report_content {
            Some(content) => stats::report_changed(m.report_content.as_deref(), content),
            None => false,
        };
        if let Some(content) = patch.report_content {
            m.report_content = Some(content);
        }

        m.updated_at = now;
        self.store.save_match(m.clone()).await?;

        self.apply_stats(&stat_deltas).await;

        if report_was_changed {
            let effects = self.report_effects(&m, &user.id).await;
            self.effects.dispatch(effects);
        }

        Ok(m)
    }

    /// Build the community mirror and the participant notifications for a
    /// freshly changed report.
    async fn report_effects(&self, m: &Match, editor: &UserId) -> Vec<SideEffect> {
        let mut effects = vec![SideEffect::Publish {
            author_id: editor.clone(),
            content: stats::report_post_content(
                &m.title,
                m.score.as_deref(),
                m.report_content.as_deref().unwrap_or_default(),
            ),
            images: m.report_images.clone(),
        }];

        let regs = self.store.registrations_for(&m.id).await;
        let entries = self.store.team_entries_for(&m.id).await;
        for participant in stats::participant_ids(&regs, &entries) {
            if participant == *editor {
                continue;
            }
            effects.push(SideEffect::Notify {
                user_id: participant,
                title: "Match report".to_string(),
                body: format!("A report was published for \"{}\", go take a look!", m.title),
                kind: NotificationKind::MatchReport,
                related_id: Some(m.id.to_string()),
            });
        }

        effects
    }

    /// Delete a match and cascade its registration rows.
    pub async fn remove(&self, user_id: &UserId, id: &MatchId) -> Result<(), LedgerError> {
        let _guard = self.lock_match(id).await?;
        let m = self.require_match(id).await?;
        let user = self.require_user(user_id).await?;
        self.require_initiator_or_admin(&m, &user)?;

        self.store.delete_match(id).await?;
        info!("Removed match {} ({})", id, m.title);
        Ok(())
    }

    /// Sign the caller up; see the individual ledger for per-type behavior.
    pub async fn register(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
        requested: Option<Side>,
    ) -> Result<String, LedgerError> {
        let _guard = self.lock_match(match_id).await?;
        let now = Utc::now();
        let mut m = self.require_match(match_id).await?;
        self.refresh_status(&mut m, now).await?;

        let user = self.require_user(user_id).await?;
        let team_role = self.team_role_of(&user).await?;
        let mut regs = self.store.registrations_for(match_id).await;

        let outcome =
            individual::register(&mut m, &mut regs, &user, team_role.as_ref(), requested, now)?;

        self.store.replace_registrations(match_id, regs).await?;
        self.store.save_match(m).await?;
        self.apply_stats(&outcome.stats).await;

        Ok(outcome.message)
    }

    /// Cancel the caller's participation (or their team's entry/challenge).
    pub async fn cancel_registration(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
    ) -> Result<String, LedgerError> {
        let _guard = self.lock_match(match_id).await?;
        let now = Utc::now();
        let mut m = self.require_match(match_id).await?;
        self.refresh_status(&mut m, now).await?;

        let user = self.require_user(user_id).await?;
        let team_role = self.team_role_of(&user).await?;

        if m.match_type == MatchType::League {
            let mut entries = self.store.team_entries_for(match_id).await;
            let message = team::cancel(&mut m, &mut entries, team_role.as_ref())?;
            self.store.replace_team_entries(match_id, entries).await?;
            self.store.save_match(m).await?;
            return Ok(message);
        }

        let mut regs = self.store.registrations_for(match_id).await;
        let outcome = individual::cancel(&mut m, &mut regs, &user, team_role.as_ref())?;

        self.store.replace_registrations(match_id, regs).await?;
        self.store.save_match(m).await?;
        self.apply_stats(&outcome.stats).await;

        Ok(outcome.message)
    }

    /// Submit a chosen roster for a league match.
    pub async fn league_register(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
        player_ids: Vec<UserId>,
    ) -> Result<TeamRegistration, LedgerError> {
        let _guard = self.lock_match(match_id).await?;
        let now = Utc::now();
        let mut m = self.require_match(match_id).await?;
        self.refresh_status(&mut m, now).await?;

        if m.match_type != MatchType::League {
            return Err(LedgerError::InvalidState(
                "not a league match".to_string(),
            ));
        }

        let user = self.require_user(user_id).await?;
        let team_role = self.team_role_of(&user).await?;
        let mut entries = self.store.team_entries_for(match_id).await;

        let entry = team::submit(&mut m, &mut entries, team_role.as_ref(), player_ids, now)?;

        self.store.replace_team_entries(match_id, entries).await?;
        self.store.save_match(m).await?;

        Ok(entry)
    }

    /// Submit the team's full current member list as the roster.
    pub async fn auto_league_register(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
    ) -> Result<String, LedgerError> {
        let _guard = self.lock_match(match_id).await?;
        let now = Utc::now();
        let mut m = self.require_match(match_id).await?;
        self.refresh_status(&mut m, now).await?;

        if m.match_type != MatchType::League {
            return Err(LedgerError::InvalidState(
                "not a league match".to_string(),
            ));
        }

        let user = self.require_user(user_id).await?;
        let team_role = self.team_role_of(&user).await?;
        let Some(role) = &team_role else {
            return Err(LedgerError::InvalidState(
                "you are not on a team".to_string(),
            ));
        };

        let members = self.teams.members(&role.team.id).await?;
        if members.is_empty() {
            return Err(LedgerError::InvalidState(
                "team has no members".to_string(),
            ));
        }
        let roster: Vec<UserId> = members.iter().map(|u| u.id.clone()).collect();
        let count = roster.len();

        let mut entries = self.store.team_entries_for(match_id).await;
        team::submit(&mut m, &mut entries, team_role.as_ref(), roster, now)?;

        self.store.replace_team_entries(match_id, entries).await?;
        self.store.save_match(m).await?;

        Ok(format!("Roster synced, {} players submitted", count))
    }

    /// The caller's team entry for a match, if their team has one.
    pub async fn my_league_registration(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
    ) -> Result<Option<TeamRegistration>, LedgerError> {
        let user = self.require_user(user_id).await?;
        let Some(team_id) = &user.team_id else {
            return Ok(None);
        };
        Ok(self.store.find_team_entry_for(match_id, team_id).await)
    }

    /// All team entries, newest first (platform admin).
    pub async fn all_registrations(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TeamRegistration>, LedgerError> {
        let user = self.require_user(user_id).await?;
        if !user.is_platform_admin() {
            return Err(LedgerError::Forbidden(
                "admin access required".to_string(),
            ));
        }
        Ok(self.store.all_team_entries().await)
    }

    /// Record an audit verdict on one entry (platform admin).
    pub async fn audit_registration(
        &self,
        user_id: &UserId,
        entry_id: &TeamEntryId,
        status: TeamEntryStatus,
        feedback: Option<String>,
    ) -> Result<TeamRegistration, LedgerError> {
        let user = self.require_user(user_id).await?;
        if !user.is_platform_admin() {
            return Err(LedgerError::Forbidden(
                "admin access required".to_string(),
            ));
        }

        let match_id = self
            .store
            .find_team_entry(entry_id)
            .await
            .ok_or_else(|| LedgerError::NotFound("registration not found".to_string()))?
            .match_id;

        let _guard = self.lock_match(&match_id).await?;
        let mut m = self.require_match(&match_id).await?;
        let mut entries = self.store.team_entries_for(&match_id).await;

        let entry = team::audit(&mut m, &mut entries, entry_id, status, feedback, Utc::now())?;

        self.store.replace_team_entries(&match_id, entries).await?;
        self.store.save_match(m).await?;

        Ok(entry)
    }

    /// Flatten every team entry into export rows with player contact details
    /// (platform admin).
    pub async fn export_registrations(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ExportRow>, LedgerError> {
        let user = self.require_user(user_id).await?;
        if !user.is_platform_admin() {
            return Err(LedgerError::Forbidden(
                "admin access required".to_string(),
            ));
        }

        let entries = self.store.all_team_entries().await;
        let mut rows = Vec::with_capacity(entries.len());

        for entry in entries {
            let match_title = self
                .store
                .find_match(&entry.match_id)
                .await
                .map(|m| m.title)
                .unwrap_or_else(|| entry.match_id.to_string());
            let team_name = self
                .teams
                .find(&entry.team_id)
                .await?
                .map(|t| t.name)
                .unwrap_or_else(|| entry.team_id.to_string());

            let mut players = Vec::with_capacity(entry.player_ids.len());
            for player_id in &entry.player_ids {
                if let Some(player) = self.users.find(player_id).await? {
                    players.push(ExportPlayer {
                        name: player.name,
                        jersey_number: player.jersey_number,
                        phone: player.phone,
                    });
                }
            }

            rows.push(ExportRow {
                match_title,
                team_name,
                status: entry.status,
                players,
            });
        }

        Ok(rows)
    }

    /// Rebalance every individual registration across the two sides by
    /// position priority (initiator or platform admin).
    pub async fn distribute_teams(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
    ) -> Result<String, LedgerError> {
        let _guard = self.lock_match(match_id).await?;
        let m = self.require_match(match_id).await?;
        let user = self.require_user(user_id).await?;
        self.require_initiator_or_admin(&m, &user)?;

        let mut regs = self.store.registrations_for(match_id).await;
        if regs.is_empty() {
            return Ok("No players to distribute".to_string());
        }

        // Full re-balance: wipe sides first so a retry starts clean.
        for reg in &mut regs {
            reg.side = Side::None;
        }

        let mut players = Vec::with_capacity(regs.len());
        for reg in &regs {
            let position = self.users.find(&reg.user_id).await?.and_then(|u| u.position);
            players.push((reg.id.clone(), position));
        }

        for (reg_id, side) in balance::plan(&players) {
            if let Some(reg) = regs.iter_mut().find(|r| r.id == reg_id) {
                reg.side = side;
            }
        }

        self.store.replace_registrations(match_id, regs).await?;
        Ok("Teams distributed".to_string())
    }

    /// Add one player to a friendly's side (team-admin only).
    pub async fn add_player(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
        target_id: &UserId,
        side: Side,
    ) -> Result<String, LedgerError> {
        let _guard = self.lock_match(match_id).await?;
        let now = Utc::now();
        let mut m = self.require_match(match_id).await?;
        let caller = self.require_user(user_id).await?;
        let team_role = self.team_role_of(&caller).await?;
        let target = self
            .users
            .find(target_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound("player does not exist".to_string()))?;

        let mut regs = self.store.registrations_for(match_id).await;
        let outcome =
            individual::add_player(&mut m, &mut regs, team_role.as_ref(), &target, side, now)?;

        self.store.replace_registrations(match_id, regs).await?;
        self.store.save_match(m).await?;
        self.apply_stats(&outcome.stats).await;

        Ok(outcome.message)
    }

    /// Register every missing team member onto a side; returns the message
    /// and how many players were added.
    pub async fn sync_team_players(
        &self,
        user_id: &UserId,
        match_id: &MatchId,
        side: Side,
    ) -> Result<(String, u32), LedgerError> {
        let _guard = self.lock_match(match_id).await?;
        let now = Utc::now();
        let mut m = self.require_match(match_id).await?;
        let caller = self.require_user(user_id).await?;
        let team_role = self.team_role_of(&caller).await?;

        let members = match &team_role {
            Some(role) => self.teams.members(&role.team.id).await?,
            None => Vec::new(),
        };

        let mut regs = self.store.registrations_for(match_id).await;
        let outcome = individual::sync_team_players(
            &mut m,
            &mut regs,
            team_role.as_ref(),
            &members,
            side,
            now,
        )?;

        self.store.replace_registrations(match_id, regs).await?;
        self.store.save_match(m).await?;
        self.apply_stats(&outcome.stats).await;

        Ok((outcome.message, outcome.added_count))
    }

    /// Recompute denormalized counters from the authoritative row sets and
    /// report how many matches had drifted.
    pub async fn repair_counters(&self) -> Result<RepairReport, LedgerError> {
        let matches = self.store.matches().await;
        let checked = matches.len();
        let mut repaired = 0;

        for mut m in matches {
            let _guard = self.lock_match(&m.id).await?;
            let regs = self.store.registrations_for(&m.id).await;
            let entries = self.store.team_entries_for(&m.id).await;

            let players = regs.len() as u32;
            let teams = match m.match_type {
                MatchType::League => {
                    let count = entries.iter().filter(|e| e.countable()).count();
                    format!("{}/{}", count, m.max_teams)
                }
                MatchType::TeamFriendly => {
                    if m.away_team_id.is_some() { "2/2" } else { "1/2" }.to_string()
                }
                _ => m.teams.clone(),
            };

            if m.current_players != players || m.teams != teams {
                info!(
                    "Repairing counters for match {}: players {} -> {}, teams {} -> {}",
                    m.id, m.current_players, players, m.teams, teams
                );
                m.current_players = players;
                m.teams = teams;
                self.store.save_match(m).await?;
                repaired += 1;
            }
        }

        Ok(RepairReport { checked, repaired })
    }

    /// Notify participants of matches kicking off in roughly 24 hours.
    /// Each match is reminded once; returns how many were processed.
    pub async fn remind_upcoming(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let from = now + chrono::Duration::hours(23);
        let to = now + chrono::Duration::hours(25);
        let mut reminded = 0;

        for mut m in self.store.matches().await {
            if m.reminder_sent {
                continue;
            }
            let Some(start) = m.start_time else {
                continue;
            };
            if start < from || start > to {
                continue;
            }

            let match_id = m.id.clone();
            let guard = self.lock_match(&match_id).await?;
            let regs = self.store.registrations_for(&match_id).await;
            let entries: Vec<TeamRegistration> = self
                .store
                .team_entries_for(&match_id)
                .await
                .into_iter()
                .filter(|e| e.status == TeamEntryStatus::Approved)
                .collect();

            let effects: Vec<SideEffect> = stats::participant_ids(&regs, &entries)
                .into_iter()
                .map(|user_id| SideEffect::Notify {
                    user_id,
                    title: "Match reminder".to_string(),
                    body: format!("Your match \"{}\" starts in 24 hours.", m.title),
                    kind: NotificationKind::MatchReminder,
                    related_id: Some(match_id.to_string()),
                })
                .collect();

            m.reminder_sent = true;
            self.store.save_match(m).await?;
            drop(guard);
            reminded += 1;

            if !effects.is_empty() {
                info!("Sending {} reminders for match {}", effects.len(), match_id);
                self.effects.run(effects).await;
            }
        }

        Ok(reminded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchStatus, PlayerStats, Position, Role};
    use crate::store::{JsonlDirectory, StorageConfig};

    struct Fixture {
        _tmp: tempfile::TempDir,
        store: Arc<MatchStore>,
        dir: Arc<JsonlDirectory>,
        service: MatchService,
    }

    async fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(tmp.path().to_path_buf());
        let store = Arc::new(MatchStore::open(config.clone()).unwrap());
        let dir = Arc::new(JsonlDirectory::open(config).unwrap());
        let service = MatchService::new(
            store.clone(),
            dir.clone(),
            dir.clone(),
            dir.clone(),
            dir.clone(),
            LockSettings::default(),
        );
        Fixture {
            _tmp: tmp,
            store,
            dir,
            service,
        }
    }

    async fn seed_user(fx: &Fixture, id: &str, team: Option<&str>, position: Option<Position>) {
        fx.dir
            .put_user(User {
                id: id.into(),
                name: format!("User {}", id),
                role: Role::User,
                team_id: team.map(|t| t.into()),
                position,
                jersey_number: None,
                phone: None,
                stats: PlayerStats::default(),
            })
            .await
            .unwrap();
    }

    async fn seed_admin(fx: &Fixture, id: &str) {
        fx.dir
            .put_user(User {
                id: id.into(),
                name: format!("Admin {}", id),
                role: Role::Admin,
                team_id: None,
                position: None,
                jersey_number: None,
                phone: None,
                stats: PlayerStats::default(),
            })
            .await
            .unwrap();
    }

    async fn seed_team(fx: &Fixture, id: &str, captain: &str, members: &[&str]) {
        fx.dir
            .put_team(Team {
                id: id.into(),
                name: format!("Team {}", id),
                captain_id: captain.into(),
                admin_ids: vec![],
                member_ids: members.iter().map(|m| (*m).into()).collect(),
            })
            .await
            .unwrap();
    }

    fn pickup_request() -> CreateMatchRequest {
        CreateMatchRequest {
            title: "Sunday Pickup".to_string(),
            match_type: MatchType::Pickup,
            location: "North Field".to_string(),
            start_time: None,
            end_time: None,
            registration_start_time: None,
            registration_end_time: None,
            min_players: None,
            max_players: None,
            max_teams: None,
            side: None,
        }
    }

    async fn stats_of(fx: &Fixture, id: &str) -> PlayerStats {
        UserDirectory::find(fx.dir.as_ref(), &id.into())
            .await
            .unwrap()
            .unwrap()
            .stats
    }

    #[tokio::test]
    async fn test_create_pickup_auto_joins_initiator() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;

        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();

        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.current_players, 1);
        assert_eq!(detail.registrations.len(), 1);
        assert_eq!(detail.registrations[0].user_id.as_str(), "u1");
        assert_eq!(stats_of(&fx, "u1").await.matches, 1);
    }

    #[tokio::test]
    async fn test_register_cancel_round_trip() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        seed_user(&fx, "u2", None, None).await;
        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();

        fx.service.register(&"u2".into(), &m.id, None).await.unwrap();
        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.current_players, 2);
        assert_eq!(detail.registrations.len(), 2);
        assert_eq!(stats_of(&fx, "u2").await.matches, 1);

        fx.service.cancel_registration(&"u2".into(), &m.id).await.unwrap();
        let detail = fx.service.find_one(&m.id).await.unwrap();
        // Counter matches the live row count again
        assert_eq!(detail.record.current_players, 1);
        assert_eq!(detail.registrations.len(), 1);
        assert_eq!(stats_of(&fx, "u2").await.matches, 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        seed_user(&fx, "u2", None, None).await;
        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();

        fx.service.register(&"u2".into(), &m.id, None).await.unwrap();
        let err = fx.service.register(&"u2".into(), &m.id, None).await;
        assert!(matches!(err, Err(LedgerError::Conflict(_))));

        // Uniqueness held: still exactly one row per user
        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.registrations.len(), 2);
        assert_eq!(detail.record.current_players, 2);
    }

    #[tokio::test]
    async fn test_friendly_challenge_and_withdrawal() {
        let fx = fixture().await;
        seed_user(&fx, "u1", Some("t1"), None).await;
        seed_user(&fx, "u2", Some("t1"), None).await;
        seed_user(&fx, "u5", Some("t2"), None).await;
        seed_team(&fx, "t1", "u1", &["u1", "u2"]).await;
        seed_team(&fx, "t2", "u5", &["u5"]).await;

        let mut req = pickup_request();
        req.title = "Friendly".to_string();
        req.match_type = MatchType::TeamFriendly;
        let m = fx.service.create(&"u1".into(), req).await.unwrap();

        // Host roster auto-registered on HOME
        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.home_team_id, Some("t1".into()));
        assert_eq!(detail.record.current_players, 2);
        assert_eq!(detail.record.teams, "1/2");

        // Challenge accept by the away captain
        let message = fx.service.register(&"u5".into(), &m.id, None).await.unwrap();
        assert_eq!(message, "Challenge accepted");
        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.away_team_id, Some("t2".into()));
        assert_eq!(detail.record.status, MatchStatus::Ongoing);
        assert_eq!(detail.record.teams, "2/2");
        assert_eq!(detail.record.current_players, 3);

        // Withdrawal reverts the match immediately
        let message = fx
            .service
            .cancel_registration(&"u5".into(), &m.id)
            .await
            .unwrap();
        assert_eq!(message, "Challenge withdrawn");
        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.away_team_id, None);
        assert_eq!(detail.record.status, MatchStatus::Registering);
        assert_eq!(detail.record.teams, "1/2");
        assert_eq!(detail.record.current_players, 2);
    }

    #[tokio::test]
    async fn test_league_entry_audit_and_ratio() {
        let fx = fixture().await;
        seed_admin(&fx, "boss").await;
        for (user, team) in [("u1", "t1"), ("u2", "t2"), ("u3", "t3")] {
            seed_user(&fx, user, Some(team), None).await;
            seed_team(&fx, team, user, &[user]).await;
        }

        let mut req = pickup_request();
        req.title = "City League".to_string();
        req.match_type = MatchType::League;
        let m = fx.service.create(&"boss".into(), req).await.unwrap();
        assert_eq!(m.teams, "0/16");

        for user in ["u1", "u2", "u3"] {
            fx.service
                .league_register(&user.into(), &m.id, vec![user.into()])
                .await
                .unwrap();
        }
        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.teams, "3/16");

        // Rejecting one entry drops it from the ratio
        let entry = fx
            .service
            .my_league_registration(&"u3".into(), &m.id)
            .await
            .unwrap()
            .unwrap();
        fx.service
            .audit_registration(
                &"boss".into(),
                &entry.id,
                TeamEntryStatus::Rejected,
                Some("incomplete roster".to_string()),
            )
            .await
            .unwrap();
        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.teams, "2/16");

        // Individual sign-up is not a league channel
        let err = fx.service.register(&"u1".into(), &m.id, None).await;
        assert!(matches!(err, Err(LedgerError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_auto_league_register_uses_member_list() {
        let fx = fixture().await;
        seed_admin(&fx, "boss").await;
        seed_user(&fx, "u1", Some("t1"), None).await;
        seed_user(&fx, "u2", Some("t1"), None).await;
        seed_team(&fx, "t1", "u1", &["u1", "u2"]).await;

        let mut req = pickup_request();
        req.match_type = MatchType::League;
        let m = fx.service.create(&"boss".into(), req).await.unwrap();

        let message = fx
            .service
            .auto_league_register(&"u1".into(), &m.id)
            .await
            .unwrap();
        assert_eq!(message, "Roster synced, 2 players submitted");

        let entry = fx
            .service
            .my_league_registration(&"u1".into(), &m.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.player_ids.len(), 2);
        assert_eq!(entry.status, TeamEntryStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_distribute_teams_by_position() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, Some(Position::Goalkeeper)).await;
        seed_user(&fx, "gk2", None, Some(Position::Goalkeeper)).await;
        seed_user(&fx, "fw1", None, Some(Position::Forward)).await;
        seed_user(&fx, "fw2", None, Some(Position::Forward)).await;

        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();
        for user in ["gk2", "fw1", "fw2"] {
            fx.service
                .register(&user.into(), &m.id, Some(Side::Home))
                .await
                .unwrap();
        }

        fx.service.distribute_teams(&"u1".into(), &m.id).await.unwrap();

        let detail = fx.service.find_one(&m.id).await.unwrap();
        let side_of = |id: &str| {
            detail
                .registrations
                .iter()
                .find(|r| r.user_id.as_str() == id)
                .unwrap()
                .side
        };
        // Keepers split across sides, forwards split across sides
        assert_ne!(side_of("u1"), side_of("gk2"));
        assert_ne!(side_of("fw1"), side_of("fw2"));
        let home = detail
            .registrations
            .iter()
            .filter(|r| r.side == Side::Home)
            .count();
        let away = detail
            .registrations
            .iter()
            .filter(|r| r.side == Side::Away)
            .count();
        assert_eq!(home, 2);
        assert_eq!(away, 2);
    }

    #[tokio::test]
    async fn test_distribute_requires_initiator_or_admin() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        seed_user(&fx, "u2", None, None).await;
        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();

        let err = fx.service.distribute_teams(&"u2".into(), &m.id).await;
        assert!(matches!(err, Err(LedgerError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_event_replacement_reconciles_stats() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        seed_user(&fx, "u2", None, None).await;
        fx.dir
            .adjust_stats(
                &"u1".into(),
                StatsDelta {
                    matches: 0,
                    goals: 5,
                    assists: 0,
                },
            )
            .await
            .unwrap();

        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();

        let first = vec![MatchEvent {
            time: 10,
            player_id: Some("u1".into()),
            assist_player_id: None,
            side: Side::Home,
        }];
        fx.service
            .update(
                &"u1".into(),
                &m.id,
                MatchPatch {
                    events: Some(first.clone()),
                    ..MatchPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(stats_of(&fx, "u1").await.goals, 6);

        // Replace with a superset: existing scorer unchanged, new scorer +1
        let mut second = first;
        second.push(MatchEvent {
            time: 40,
            player_id: Some("u2".into()),
            assist_player_id: None,
            side: Side::Away,
        });
        fx.service
            .update(
                &"u1".into(),
                &m.id,
                MatchPatch {
                    events: Some(second.clone()),
                    ..MatchPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(stats_of(&fx, "u1").await.goals, 6);
        assert_eq!(stats_of(&fx, "u2").await.goals, 1);

        // Idempotence: replaying the same list changes nothing
        fx.service
            .update(
                &"u1".into(),
                &m.id,
                MatchPatch {
                    events: Some(second),
                    ..MatchPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(stats_of(&fx, "u1").await.goals, 6);
        assert_eq!(stats_of(&fx, "u2").await.goals, 1);
    }

    #[tokio::test]
    async fn test_report_change_mirrors_and_notifies_once() {
        use crate::models::{Notification, Post};
        use crate::store::{EntityType, JsonlReader};

        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        seed_user(&fx, "u2", None, None).await;
        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();
        fx.service.register(&"u2".into(), &m.id, None).await.unwrap();

        fx.service
            .update(
                &"u1".into(),
                &m.id,
                MatchPatch {
                    score: Some("3:2".to_string()),
                    report_content: Some("Great game".to_string()),
                    ..MatchPatch::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let config = StorageConfig::new(fx._tmp.path().to_path_buf());
        let posts: Vec<Post> = JsonlReader::for_entity(&config, EntityType::Post)
            .read_all()
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].content.contains("Great game"));
        assert!(posts[0].content.contains("3:2"));

        let notifications: Vec<Notification> =
            JsonlReader::for_entity(&config, EntityType::Notification)
                .read_all()
                .unwrap();
        // The editor is excluded; only the other participant is notified
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id.as_str(), "u2");

        // Re-submitting the same report is not a change
        fx.service
            .update(
                &"u1".into(),
                &m.id,
                MatchPatch {
                    report_content: Some("Great game".to_string()),
                    ..MatchPatch::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let posts: Vec<Post> = JsonlReader::for_entity(&config, EntityType::Post)
            .read_all()
            .unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_repair_counters_fixes_drift() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        seed_user(&fx, "u2", None, None).await;
        let m = fx.service.create(&"u1".into(), pickup_request()).await.unwrap();
        fx.service.register(&"u2".into(), &m.id, None).await.unwrap();

        // Inject drift directly into the stored match
        let mut drifted = fx.store.find_match(&m.id).await.unwrap();
        drifted.current_players = 99;
        fx.store.save_match(drifted).await.unwrap();

        let report = fx.service.repair_counters().await.unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.repaired, 1);
        assert_eq!(
            fx.store.find_match(&m.id).await.unwrap().current_players,
            2
        );

        // A clean second pass repairs nothing
        let report = fx.service.repair_counters().await.unwrap();
        assert_eq!(report.repaired, 0);
    }

    #[tokio::test]
    async fn test_status_resolved_on_read() {
        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        let mut req = pickup_request();
        let now = Utc::now();
        req.start_time = Some(now - chrono::Duration::hours(3));
        req.end_time = Some(now - chrono::Duration::hours(1));
        let m = fx.service.create(&"u1".into(), req).await.unwrap();
        assert_eq!(m.status, MatchStatus::Registering);

        let all = fx.service.find_all().await.unwrap();
        assert_eq!(all[0].status, MatchStatus::Finished);
        // The resolved status was persisted
        assert_eq!(
            fx.store.find_match(&m.id).await.unwrap().status,
            MatchStatus::Finished
        );
    }

    #[tokio::test]
    async fn test_remind_upcoming_once() {
        use crate::models::Notification;
        use crate::store::{EntityType, JsonlReader};

        let fx = fixture().await;
        seed_user(&fx, "u1", None, None).await;
        seed_user(&fx, "u2", None, None).await;
        let now = Utc::now();
        let mut req = pickup_request();
        req.start_time = Some(now + chrono::Duration::hours(24));
        req.end_time = Some(now + chrono::Duration::hours(26));
        let m = fx.service.create(&"u1".into(), req).await.unwrap();
        fx.service.register(&"u2".into(), &m.id, None).await.unwrap();

        let reminded = fx.service.remind_upcoming(now).await.unwrap();
        assert_eq!(reminded, 1);

        let config = StorageConfig::new(fx._tmp.path().to_path_buf());
        let notifications: Vec<Notification> =
            JsonlReader::for_entity(&config, EntityType::Notification)
                .read_all()
                .unwrap();
        assert_eq!(notifications.len(), 2);

        // Second pass is a no-op; the reminder flag is set
        let reminded = fx.service.remind_upcoming(now).await.unwrap();
        assert_eq!(reminded, 0);
    }

    #[tokio::test]
    async fn test_export_registrations_admin_only() {
        let fx = fixture().await;
        seed_admin(&fx, "boss").await;
        seed_user(&fx, "u1", Some("t1"), None).await;
        seed_team(&fx, "t1", "u1", &["u1"]).await;

        let mut req = pickup_request();
        req.match_type = MatchType::League;
        let m = fx.service.create(&"boss".into(), req).await.unwrap();
        fx.service
            .league_register(&"u1".into(), &m.id, vec!["u1".into()])
            .await
            .unwrap();

        let err = fx.service.export_registrations(&"u1".into()).await;
        assert!(matches!(err, Err(LedgerError::Forbidden(_))));

        let rows = fx.service.export_registrations(&"boss".into()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team_name, "Team t1");
        assert_eq!(rows[0].players.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_team_players_counts_new_rows() {
        let fx = fixture().await;
        seed_user(&fx, "u1", Some("t1"), None).await;
        seed_user(&fx, "u2", Some("t1"), None).await;
        seed_user(&fx, "u3", Some("t1"), None).await;
        seed_team(&fx, "t1", "u1", &["u1", "u2", "u3"]).await;

        let mut req = pickup_request();
        req.match_type = MatchType::TeamFriendly;
        let m = fx.service.create(&"u1".into(), req).await.unwrap();
        // All three members were auto-registered at creation
        let (_, added) = fx
            .service
            .sync_team_players(&"u1".into(), &m.id, Side::Home)
            .await
            .unwrap();
        assert_eq!(added, 0);

        // A new member joins the team and gets synced in
        seed_user(&fx, "u4", Some("t1"), None).await;
        seed_team(&fx, "t1", "u1", &["u1", "u2", "u3", "u4"]).await;
        let (_, added) = fx
            .service
            .sync_team_players(&"u1".into(), &m.id, Side::Home)
            .await
            .unwrap();
        assert_eq!(added, 1);

        let detail = fx.service.find_one(&m.id).await.unwrap();
        assert_eq!(detail.record.current_players, 4);
        assert_eq!(detail.registrations.len(), 4);
    }
}
