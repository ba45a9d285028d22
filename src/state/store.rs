//! Store trait and the in-memory implementation.
//!
//! The trait is the persistence seam: the manager layer only ever talks to a
//! `dyn TournamentStore`, so tests run against [`MemoryStore`] while
//! deployments use the Postgres implementation.

use super::errors::{StoreError, StoreResult};
use super::models::{MatchRecord, PlayerCareerStats, TournamentSnapshot};
use crate::format::{ParticipantId, TournamentId};
use crate::tournament::TournamentStatus;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence operations the state manager depends on.
#[async_trait]
pub trait TournamentStore: Send + Sync {
    /// Insert or replace the snapshot for a tournament.
    async fn save_snapshot(&self, snapshot: &TournamentSnapshot) -> StoreResult<()>;

    /// Load the latest snapshot for a tournament.
    async fn load_snapshot(&self, tournament_id: TournamentId) -> StoreResult<TournamentSnapshot>;

    /// Snapshots of every tournament not yet completed or cancelled.
    async fn load_active(&self) -> StoreResult<Vec<TournamentSnapshot>>;

    /// Append one completed match to history.
    async fn record_match(&self, record: &MatchRecord) -> StoreResult<()>;

    /// Completed matches for a tournament, in completion order.
    async fn match_history(&self, tournament_id: TournamentId) -> StoreResult<Vec<MatchRecord>>;

    async fn load_player_stats(
        &self,
        participant_id: &str,
    ) -> StoreResult<Option<PlayerCareerStats>>;

    async fn save_player_stats(&self, stats: &PlayerCareerStats) -> StoreResult<()>;
}

/// Map-backed store. The default for tests and single-process deployments
/// that can afford to lose state on restart.
#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<TournamentId, TournamentSnapshot>>,
    matches: RwLock<HashMap<TournamentId, Vec<MatchRecord>>>,
    player_stats: RwLock<HashMap<ParticipantId, PlayerCareerStats>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentStore for MemoryStore {
    async fn save_snapshot(&self, snapshot: &TournamentSnapshot) -> StoreResult<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.tournament_id, snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self, tournament_id: TournamentId) -> StoreResult<TournamentSnapshot> {
        self.snapshots
            .read()
            .await
            .get(&tournament_id)
            .cloned()
            .ok_or(StoreError::SnapshotNotFound(tournament_id))
    }

    async fn load_active(&self) -> StoreResult<Vec<TournamentSnapshot>> {
        let snapshots = self.snapshots.read().await;
        let mut active: Vec<TournamentSnapshot> = snapshots
            .values()
            .filter(|s| {
                matches!(
                    s.status,
                    TournamentStatus::Registration | TournamentStatus::Active
                )
            })
            .cloned()
            .collect();
        active.sort_by_key(|s| s.created_at);
        Ok(active)
    }

    async fn record_match(&self, record: &MatchRecord) -> StoreResult<()> {
        self.matches
            .write()
            .await
            .entry(record.tournament_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn match_history(&self, tournament_id: TournamentId) -> StoreResult<Vec<MatchRecord>> {
        Ok(self
            .matches
            .read()
            .await
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_player_stats(
        &self,
        participant_id: &str,
    ) -> StoreResult<Option<PlayerCareerStats>> {
        Ok(self.player_stats.read().await.get(participant_id).cloned())
    }

    async fn save_player_stats(&self, stats: &PlayerCareerStats) -> StoreResult<()> {
        self.player_stats
            .write()
            .await
            .insert(stats.participant_id.clone(), stats.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::BracketSummary;
    use crate::state::models::SNAPSHOT_VERSION;
    use crate::tournament::TournamentConfig;
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot(status: TournamentStatus) -> TournamentSnapshot {
        TournamentSnapshot {
            version: SNAPSHOT_VERSION,
            tournament_id: Uuid::new_v4(),
            name: "test cup".to_string(),
            config: TournamentConfig::default(),
            status,
            players: Vec::new(),
            spectators: Vec::new(),
            summary: BracketSummary::empty(),
            standings: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_snapshot() {
        let store = MemoryStore::new();
        let snap = snapshot(TournamentStatus::Registration);
        store.save_snapshot(&snap).await.unwrap();
        let loaded = store.load_snapshot(snap.tournament_id).await.unwrap();
        assert_eq!(loaded, snap);
    }

    #[tokio::test]
    async fn test_missing_snapshot_errors() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.load_snapshot(id).await,
            Err(StoreError::SnapshotNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_load_active_excludes_finished() {
        let store = MemoryStore::new();
        store
            .save_snapshot(&snapshot(TournamentStatus::Active))
            .await
            .unwrap();
        store
            .save_snapshot(&snapshot(TournamentStatus::Registration))
            .await
            .unwrap();
        store
            .save_snapshot(&snapshot(TournamentStatus::Completed))
            .await
            .unwrap();
        store
            .save_snapshot(&snapshot(TournamentStatus::Cancelled))
            .await
            .unwrap();

        assert_eq!(store.load_active().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_match_history_in_order() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        for i in 0..3 {
            store
                .record_match(&MatchRecord {
                    tournament_id: id,
                    match_id: format!("m{i}"),
                    bracket: crate::format::BracketTag::Main,
                    round: 1,
                    match_type: crate::format::MatchType::Standard,
                    participants: vec!["p1".to_string(), "p2".to_string()],
                    winner: Some("p1".to_string()),
                    result: None,
                    completed_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let history = store.match_history(id).await.unwrap();
        let ids: Vec<&str> = history.iter().map(|r| r.match_id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1", "m2"]);
    }
}
