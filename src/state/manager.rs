//! State manager: write-through cache over a [`TournamentStore`] plus the
//! autosave loop.
//!
//! Lifecycle transitions go through `save_now` so durable state is current
//! before any caller observes the transition. Cheap, frequent updates (per
//! match completion) go through `mark_dirty` and rely on the autosave flush.
//! A failed flush is logged and retried next cycle; the in-memory snapshot
//! stays authoritative throughout.

use super::errors::StoreResult;
use super::models::{MatchRecord, PlayerCareerStats, TournamentSnapshot};
use super::store::TournamentStore;
use crate::format::{Standing, TournamentId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub struct TournamentStateManager {
    store: Arc<dyn TournamentStore>,
    cache: RwLock<HashMap<TournamentId, TournamentSnapshot>>,
    dirty: RwLock<HashSet<TournamentId>>,
}

impl TournamentStateManager {
    pub fn new(store: Arc<dyn TournamentStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            dirty: RwLock::new(HashSet::new()),
        }
    }

    /// Persist a snapshot immediately. Errors propagate so callers can refuse
    /// to expose a transition that was never made durable.
    pub async fn save_now(&self, snapshot: TournamentSnapshot) -> StoreResult<()> {
        self.store.save_snapshot(&snapshot).await?;
        let id = snapshot.tournament_id;
        self.cache.write().await.insert(id, snapshot);
        self.dirty.write().await.remove(&id);
        Ok(())
    }

    /// Update the cached snapshot and defer persistence to the next flush.
    pub async fn mark_dirty(&self, snapshot: TournamentSnapshot) {
        let id = snapshot.tournament_id;
        self.cache.write().await.insert(id, snapshot);
        self.dirty.write().await.insert(id);
    }

    /// Write every dirty snapshot to the store. Failed writes stay dirty.
    pub async fn flush(&self) -> usize {
        let pending: Vec<TournamentId> = self.dirty.read().await.iter().copied().collect();
        let mut flushed = 0;
        for id in pending {
            let snapshot = self.cache.read().await.get(&id).cloned();
            let Some(snapshot) = snapshot else {
                self.dirty.write().await.remove(&id);
                continue;
            };
            match self.store.save_snapshot(&snapshot).await {
                Ok(()) => {
                    self.dirty.write().await.remove(&id);
                    flushed += 1;
                }
                Err(err) => {
                    log::warn!("autosave failed for tournament {id}, will retry: {err}");
                }
            }
        }
        flushed
    }

    /// Spawn the periodic flush task.
    pub fn spawn_autosave(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let flushed = manager.flush().await;
                if flushed > 0 {
                    log::debug!("autosave flushed {flushed} snapshots");
                }
            }
        })
    }

    pub async fn snapshot(&self, tournament_id: TournamentId) -> StoreResult<TournamentSnapshot> {
        if let Some(snapshot) = self.cache.read().await.get(&tournament_id) {
            return Ok(snapshot.clone());
        }
        self.store.load_snapshot(tournament_id).await
    }

    pub async fn load_active(&self) -> StoreResult<Vec<TournamentSnapshot>> {
        self.store.load_active().await
    }

    pub async fn record_match(&self, record: MatchRecord) -> StoreResult<()> {
        self.store.record_match(&record).await
    }

    pub async fn match_history(&self, tournament_id: TournamentId) -> StoreResult<Vec<MatchRecord>> {
        self.store.match_history(tournament_id).await
    }

    pub async fn player_stats(
        &self,
        participant_id: &str,
    ) -> StoreResult<Option<PlayerCareerStats>> {
        self.store.load_player_stats(participant_id).await
    }

    /// Fold final standings into every participant's career record.
    pub async fn record_tournament_result(
        &self,
        format: &str,
        standings: &[Standing],
    ) -> StoreResult<()> {
        for standing in standings {
            let mut stats = self
                .store
                .load_player_stats(&standing.participant_id)
                .await?
                .unwrap_or_else(|| {
                    PlayerCareerStats::new(standing.participant_id.clone(), standing.name.clone())
                });
            stats.record_tournament(format, standing);
            self.store.save_player_stats(&stats).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::BracketSummary;
    use crate::state::models::SNAPSHOT_VERSION;
    use crate::state::store::MemoryStore;
    use crate::tournament::{TournamentConfig, TournamentStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot(id: TournamentId) -> TournamentSnapshot {
        TournamentSnapshot {
            version: SNAPSHOT_VERSION,
            tournament_id: id,
            name: "flush test".to_string(),
            config: TournamentConfig::default(),
            status: TournamentStatus::Active,
            players: Vec::new(),
            spectators: Vec::new(),
            summary: BracketSummary::empty(),
            standings: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_now_clears_dirty() {
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentStateManager::new(store.clone());
        let id = Uuid::new_v4();

        manager.mark_dirty(snapshot(id)).await;
        manager.save_now(snapshot(id)).await.unwrap();
        assert_eq!(manager.flush().await, 0);
        assert!(store.load_snapshot(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_dirty_snapshot_flushes() {
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentStateManager::new(store.clone());
        let id = Uuid::new_v4();

        manager.mark_dirty(snapshot(id)).await;
        assert!(store.load_snapshot(id).await.is_err());
        assert_eq!(manager.flush().await, 1);
        assert!(store.load_snapshot(id).await.is_ok());
        assert_eq!(manager.flush().await, 0);
    }

    #[tokio::test]
    async fn test_cached_snapshot_wins_over_store() {
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentStateManager::new(store.clone());
        let id = Uuid::new_v4();

        manager.save_now(snapshot(id)).await.unwrap();
        let mut updated = snapshot(id);
        updated.status = TournamentStatus::Completed;
        manager.mark_dirty(updated).await;

        let seen = manager.snapshot(id).await.unwrap();
        assert_eq!(seen.status, TournamentStatus::Completed);
    }

    #[tokio::test]
    async fn test_career_records_from_standings() {
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentStateManager::new(store);
        let standings = vec![
            Standing {
                position: 1,
                participant_id: "p1".to_string(),
                name: "Player 1".to_string(),
                points: 10,
                wins: 3,
                losses: 0,
            },
            Standing {
                position: 2,
                participant_id: "p2".to_string(),
                name: "Player 2".to_string(),
                points: 7,
                wins: 2,
                losses: 1,
            },
        ];
        manager
            .record_tournament_result("single_elimination", &standings)
            .await
            .unwrap();

        let winner = manager.player_stats("p1").await.unwrap().unwrap();
        assert_eq!(winner.tournaments_won, 1);
        assert_eq!(winner.best_finish, Some(1));
        let runner_up = manager.player_stats("p2").await.unwrap().unwrap();
        assert_eq!(runner_up.tournaments_won, 0);
        assert_eq!(runner_up.best_finish, Some(2));
    }
}
