//! Tournament lifecycle orchestrator.
//!
//! Owns registration, start, result routing, completion and cancellation for
//! every tournament in the process. Bracket mechanics are delegated to
//! [`BracketManager`], durability to [`TournamentStateManager`], and
//! announcements go through the injected [`EventSink`].
//!
//! Lifecycle transitions persist before they are exposed: the snapshot write
//! happens on a cloned tournament, and the in-memory map only picks up the
//! new state once the write succeeded.

use super::errors::{TournamentError, TournamentResult};
use super::models::{Tournament, TournamentConfig, TournamentStats, TournamentStatus};
use crate::bracket::{BracketManager, BracketSummary};
use crate::events::{EventSink, RoomRequest, TournamentEvent};
use crate::format::{
    FormatConfig, MatchId, MatchOutcome, MatchStart, PlayerEntry, RaceResult, Standing,
    TournamentId,
};
use crate::state::{MatchRecord, SNAPSHOT_VERSION, TournamentSnapshot, TournamentStateManager};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct TournamentManager {
    tournaments: RwLock<HashMap<TournamentId, Tournament>>,
    brackets: RwLock<BracketManager>,
    /// Routes incoming results: match id -> owning tournament. Entries exist
    /// only while a non-bye match is in flight.
    active_matches: RwLock<HashMap<MatchId, TournamentId>>,
    state: Arc<TournamentStateManager>,
    events: Arc<dyn EventSink>,
}

impl TournamentManager {
    pub fn new(state: Arc<TournamentStateManager>, events: Arc<dyn EventSink>) -> Self {
        Self {
            tournaments: RwLock::new(HashMap::new()),
            brackets: RwLock::new(BracketManager::new()),
            active_matches: RwLock::new(HashMap::new()),
            state,
            events,
        }
    }

    pub fn state(&self) -> Arc<TournamentStateManager> {
        Arc::clone(&self.state)
    }

    /// Create a tournament in the registration state.
    pub async fn create_tournament(
        &self,
        name: impl Into<String>,
        config: TournamentConfig,
    ) -> TournamentResult<TournamentId> {
        config.validate()?;
        let tournament = Tournament::new(name.into(), config);
        let id = tournament.id;

        self.state
            .save_now(self.snapshot_of(&tournament, BracketSummary::empty(), None))
            .await?;
        self.tournaments.write().await.insert(id, tournament.clone());

        self.events.emit(TournamentEvent::Created {
            tournament_id: id,
            name: tournament.name,
        });
        Ok(id)
    }

    /// Register a player. Starts the tournament automatically once the
    /// minimum is met and either capacity or the deadline closes the window.
    pub async fn register_player(
        &self,
        tournament_id: TournamentId,
        player: PlayerEntry,
    ) -> TournamentResult<()> {
        let (updated, start_now) = {
            let tournaments = self.tournaments.read().await;
            let tournament = tournaments
                .get(&tournament_id)
                .ok_or(TournamentError::NotFound(tournament_id))?;

            if tournament.status != TournamentStatus::Registration {
                return Err(TournamentError::InvalidState {
                    expected: TournamentStatus::Registration,
                    actual: tournament.status,
                });
            }
            // Deadlines are checked cooperatively, on the next interaction.
            if tournament.config.deadline_passed(Utc::now()) {
                if tournament.players.len() >= tournament.config.min_players {
                    let id = tournament.id;
                    drop(tournaments);
                    self.start_tournament(id).await?;
                }
                return Err(TournamentError::RegistrationClosed);
            }
            if tournament.is_full() {
                return Err(TournamentError::TournamentFull);
            }
            if tournament.has_player(&player.id) {
                return Err(TournamentError::AlreadyRegistered(player.id));
            }

            let mut updated = tournament.clone();
            updated.players.push(player);
            let start_now = updated.is_full() && updated.players.len() >= updated.config.min_players;
            (updated, start_now)
        };

        self.state
            .save_now(self.snapshot_of(&updated, BracketSummary::empty(), None))
            .await?;
        self.tournaments
            .write()
            .await
            .insert(tournament_id, updated);

        if start_now {
            self.start_tournament(tournament_id).await?;
        }
        Ok(())
    }

    pub async fn unregister_player(
        &self,
        tournament_id: TournamentId,
        participant_id: &str,
    ) -> TournamentResult<()> {
        let updated = {
            let tournaments = self.tournaments.read().await;
            let tournament = tournaments
                .get(&tournament_id)
                .ok_or(TournamentError::NotFound(tournament_id))?;

            if tournament.status != TournamentStatus::Registration {
                return Err(TournamentError::InvalidState {
                    expected: TournamentStatus::Registration,
                    actual: tournament.status,
                });
            }
            if !tournament.has_player(participant_id) {
                return Err(TournamentError::NotRegistered(participant_id.to_string()));
            }

            let mut updated = tournament.clone();
            updated.players.retain(|p| p.id != participant_id);
            updated
        };

        self.state
            .save_now(self.snapshot_of(&updated, BracketSummary::empty(), None))
            .await?;
        self.tournaments
            .write()
            .await
            .insert(tournament_id, updated);
        Ok(())
    }

    pub async fn add_spectator(
        &self,
        tournament_id: TournamentId,
        participant_id: impl Into<String>,
    ) -> TournamentResult<()> {
        let participant_id = participant_id.into();
        let mut tournaments = self.tournaments.write().await;
        let tournament = tournaments
            .get_mut(&tournament_id)
            .ok_or(TournamentError::NotFound(tournament_id))?;

        if !tournament.config.allow_spectators {
            return Err(TournamentError::SpectatorsDisabled);
        }
        if tournament.spectators.len() >= tournament.config.max_spectators {
            return Err(TournamentError::SpectatorsFull);
        }
        if tournament.has_spectator(&participant_id) {
            return Err(TournamentError::AlreadySpectating(participant_id));
        }

        tournament.spectators.push(participant_id);
        let snapshot = self.snapshot_of(tournament, BracketSummary::empty(), None);
        drop(tournaments);
        self.state.mark_dirty(snapshot).await;
        Ok(())
    }

    pub async fn remove_spectator(
        &self,
        tournament_id: TournamentId,
        participant_id: &str,
    ) -> TournamentResult<()> {
        let mut tournaments = self.tournaments.write().await;
        let tournament = tournaments
            .get_mut(&tournament_id)
            .ok_or(TournamentError::NotFound(tournament_id))?;

        if !tournament.has_spectator(participant_id) {
            return Err(TournamentError::NotSpectating(participant_id.to_string()));
        }
        tournament.spectators.retain(|s| s != participant_id);
        let snapshot = self.snapshot_of(tournament, BracketSummary::empty(), None);
        drop(tournaments);
        self.state.mark_dirty(snapshot).await;
        Ok(())
    }

    /// Freeze the roster, build the bracket and go active.
    pub async fn start_tournament(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        let tournament = {
            let tournaments = self.tournaments.read().await;
            tournaments
                .get(&tournament_id)
                .cloned()
                .ok_or(TournamentError::NotFound(tournament_id))?
        };

        if tournament.status != TournamentStatus::Registration {
            return Err(TournamentError::InvalidState {
                expected: TournamentStatus::Registration,
                actual: tournament.status,
            });
        }
        if tournament.players.len() < tournament.config.min_players {
            return Err(TournamentError::InsufficientPlayers {
                needed: tournament.config.min_players,
                current: tournament.players.len(),
            });
        }

        let format_config = FormatConfig {
            players_per_race: tournament.config.players_per_race,
            seeding: tournament.config.seeding,
        };
        let summary = self.brackets.write().await.create_bracket(
            tournament_id,
            tournament.config.format,
            format_config,
            tournament.players.clone(),
        )?;

        let mut updated = tournament;
        updated.status = TournamentStatus::Active;
        updated.started_at = Some(Utc::now());

        let snapshot = self.snapshot_of(&updated, summary.clone(), None);
        if let Err(err) = self.state.save_now(snapshot).await {
            self.brackets.write().await.remove(&tournament_id);
            return Err(err.into());
        }
        self.tournaments
            .write()
            .await
            .insert(tournament_id, updated);

        self.events.emit(TournamentEvent::Started {
            tournament_id,
            summary,
        });
        Ok(())
    }

    /// Start the next pending match and ask for a room. A bye resolves
    /// immediately and is reported through the completion path instead.
    pub async fn start_next_match(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<MatchStart>> {
        let race_time_limit_secs = {
            let tournaments = self.tournaments.read().await;
            let tournament = tournaments
                .get(&tournament_id)
                .ok_or(TournamentError::NotFound(tournament_id))?;
            if tournament.status != TournamentStatus::Active {
                return Err(TournamentError::InvalidState {
                    expected: TournamentStatus::Active,
                    actual: tournament.status,
                });
            }
            tournament.config.race_time_limit_secs
        };

        let start = self
            .brackets
            .write()
            .await
            .start_next_match(&tournament_id)?;
        let Some(start) = start else {
            return Ok(None);
        };

        match &start.bye_outcome {
            Some(outcome) => {
                self.record_completed_match(tournament_id, &start.match_record.id)
                    .await?;
                self.handle_outcome(tournament_id, outcome.clone()).await?;
            }
            None => {
                self.active_matches
                    .write()
                    .await
                    .insert(start.match_record.id.clone(), tournament_id);
                let summary = self.brackets.read().await.bracket_summary(&tournament_id);
                self.events.emit(TournamentEvent::MatchStarted {
                    tournament_id,
                    room_request: RoomRequest {
                        match_id: start.match_record.id.clone(),
                        participants: start.match_record.participant_ids(),
                        race_time_limit_secs,
                    },
                    summary,
                });
            }
        }
        Ok(Some(start))
    }

    /// Record the race room the server assigned to an active match.
    pub async fn bind_room(
        &self,
        match_id: &str,
        room: impl Into<String>,
    ) -> TournamentResult<()> {
        let tournament_id = self
            .active_matches
            .read()
            .await
            .get(match_id)
            .copied()
            .ok_or_else(|| TournamentError::MatchNotFound(match_id.to_string()))?;
        self.brackets
            .write()
            .await
            .bind_room(&tournament_id, match_id, room.into())?;
        Ok(())
    }

    /// Deliver a race result. Results for matches no longer routed (finished
    /// or cancelled tournaments) are rejected with `MatchNotFound`.
    pub async fn submit_match_result(
        &self,
        match_id: &str,
        result: RaceResult,
    ) -> TournamentResult<MatchOutcome> {
        let tournament_id = self
            .active_matches
            .read()
            .await
            .get(match_id)
            .copied()
            .ok_or_else(|| TournamentError::MatchNotFound(match_id.to_string()))?;

        let outcome = self
            .brackets
            .write()
            .await
            .complete_match(&tournament_id, match_id, result)?;
        self.active_matches.write().await.remove(match_id);

        self.record_completed_match(tournament_id, match_id).await?;
        self.handle_outcome(tournament_id, outcome.clone()).await?;
        Ok(outcome)
    }

    /// Cancel a tournament and tear its bracket down synchronously, so no
    /// in-flight match can land a result afterwards.
    pub async fn cancel_tournament(
        &self,
        tournament_id: TournamentId,
        reason: impl Into<String>,
    ) -> TournamentResult<()> {
        let reason = reason.into();
        let updated = {
            let tournaments = self.tournaments.read().await;
            let tournament = tournaments
                .get(&tournament_id)
                .ok_or(TournamentError::NotFound(tournament_id))?;
            if matches!(
                tournament.status,
                TournamentStatus::Completed | TournamentStatus::Cancelled
            ) {
                return Err(TournamentError::InvalidState {
                    expected: TournamentStatus::Active,
                    actual: tournament.status,
                });
            }
            let mut updated = tournament.clone();
            updated.status = TournamentStatus::Cancelled;
            updated.finished_at = Some(Utc::now());
            updated
        };

        let summary = self.brackets.read().await.bracket_summary(&tournament_id);
        self.state
            .save_now(self.snapshot_of(&updated, summary, None))
            .await?;

        self.brackets.write().await.remove(&tournament_id);
        self.active_matches
            .write()
            .await
            .retain(|_, owner| *owner != tournament_id);
        self.tournaments
            .write()
            .await
            .insert(tournament_id, updated);

        self.events.emit(TournamentEvent::Cancelled {
            tournament_id,
            reason,
        });
        Ok(())
    }

    pub async fn tournament(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        self.tournaments
            .read()
            .await
            .get(&tournament_id)
            .cloned()
            .ok_or(TournamentError::NotFound(tournament_id))
    }

    /// Tournaments matching the status filter, newest first.
    pub async fn list_tournaments(&self, filter: Option<TournamentStatus>) -> Vec<Tournament> {
        let tournaments = self.tournaments.read().await;
        let mut listed: Vec<Tournament> = tournaments
            .values()
            .filter(|t| filter.is_none_or(|status| t.status == status))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed
    }

    pub async fn stats(&self) -> TournamentStats {
        let tournaments = self.tournaments.read().await;
        let mut stats = TournamentStats {
            total: tournaments.len(),
            ..TournamentStats::default()
        };
        for tournament in tournaments.values() {
            match tournament.status {
                TournamentStatus::Registration => stats.registration += 1,
                TournamentStatus::Active => stats.active += 1,
                TournamentStatus::Completed => stats.completed += 1,
                TournamentStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    pub async fn bracket_summary(&self, tournament_id: TournamentId) -> BracketSummary {
        self.brackets.read().await.bracket_summary(&tournament_id)
    }

    /// Final standings: live from the bracket while active, from the
    /// snapshot once the tournament finished.
    pub async fn final_standings(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<Vec<Standing>>> {
        if let Some(standings) = self.brackets.read().await.final_standings(&tournament_id) {
            return Ok(Some(standings));
        }
        match self.state.snapshot(tournament_id).await {
            Ok(snapshot) => Ok(snapshot.standings),
            Err(crate::state::StoreError::SnapshotNotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reload every unfinished tournament from the store. Active brackets are
    /// rebuilt from the frozen roster and completed matches are replayed by
    /// participant set; an unmatched record is logged and skipped.
    pub async fn restore_active(&self) -> TournamentResult<usize> {
        let snapshots = self.state.load_active().await?;
        let mut restored = 0;

        for snapshot in snapshots {
            let tournament = Tournament {
                id: snapshot.tournament_id,
                name: snapshot.name.clone(),
                config: snapshot.config.clone(),
                status: snapshot.status,
                players: snapshot.players.clone(),
                spectators: snapshot.spectators.clone(),
                created_at: snapshot.created_at,
                started_at: None,
                finished_at: None,
            };
            let tournament_id = tournament.id;
            let is_active = tournament.status == TournamentStatus::Active;
            self.tournaments
                .write()
                .await
                .insert(tournament_id, tournament.clone());

            if is_active {
                let format_config = FormatConfig {
                    players_per_race: tournament.config.players_per_race,
                    seeding: tournament.config.seeding,
                };
                self.brackets.write().await.create_bracket(
                    tournament_id,
                    tournament.config.format,
                    format_config,
                    tournament.players.clone(),
                )?;
                self.replay_history(tournament_id).await?;
            }
            restored += 1;
            log::info!("restored tournament {tournament_id} ({})", snapshot.status);
        }
        Ok(restored)
    }

    /// Re-apply stored match results to a freshly rebuilt bracket. Matches
    /// are located by participant set since match ids are not stable across
    /// a rebuild.
    async fn replay_history(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        let records = self.state.match_history(tournament_id).await?;
        for record in records {
            let mut wanted: Vec<&str> = record.participants.iter().map(String::as_str).collect();
            wanted.sort_unstable();

            let mut brackets = self.brackets.write().await;
            let summary = brackets.bracket_summary(&tournament_id);
            let target = summary
                .rounds
                .iter()
                .flat_map(|round| round.matches.iter())
                .find(|m| {
                    m.status == crate::format::MatchStatus::Pending && {
                        let mut ids: Vec<&str> =
                            m.participants.iter().map(String::as_str).collect();
                        ids.sort_unstable();
                        ids == wanted
                    }
                })
                .map(|m| m.id.clone());

            let Some(match_id) = target else {
                log::warn!(
                    "replay: no pending match for recorded participants {:?} in tournament {tournament_id}",
                    record.participants
                );
                continue;
            };

            let start = brackets.start_match(&tournament_id, &match_id)?;
            if start.bye_outcome.is_some() {
                continue;
            }
            match record.result.clone() {
                Some(result) => {
                    brackets.complete_match(&tournament_id, &match_id, result)?;
                }
                None => {
                    log::warn!("replay: record for match {} has no result", record.match_id);
                }
            }
        }
        Ok(())
    }

    /// Persist the completed match as a history record.
    async fn record_completed_match(
        &self,
        tournament_id: TournamentId,
        match_id: &str,
    ) -> TournamentResult<()> {
        let snapshot = self
            .brackets
            .read()
            .await
            .match_snapshot(&tournament_id, match_id);
        let Some(record) = snapshot else {
            log::warn!("completed match {match_id} vanished before it was recorded");
            return Ok(());
        };
        self.state
            .record_match(MatchRecord {
                tournament_id,
                match_id: record.id.clone(),
                bracket: record.bracket,
                round: record.round,
                match_type: record.match_type,
                participants: record.participant_ids(),
                winner: record.winner.clone(),
                result: record.results.clone(),
                completed_at: record.completed_at.unwrap_or_else(Utc::now),
            })
            .await?;
        Ok(())
    }

    /// Shared completion handling: events, round notifications, and the
    /// finish transition when the bracket reports the tournament done.
    async fn handle_outcome(
        &self,
        tournament_id: TournamentId,
        outcome: MatchOutcome,
    ) -> TournamentResult<()> {
        let summary = self.brackets.read().await.bracket_summary(&tournament_id);
        let round = outcome.round;
        let round_complete = outcome.round_complete;
        let tournament_complete = outcome.tournament_complete;

        self.events.emit(TournamentEvent::MatchCompleted {
            tournament_id,
            outcome,
            summary: summary.clone(),
        });
        if round_complete {
            self.events.emit(TournamentEvent::RoundCompleted {
                tournament_id,
                round,
                summary: summary.clone(),
            });
        }

        if tournament_complete {
            self.finish_tournament(tournament_id, summary).await?;
        } else {
            let tournament = self.tournament(tournament_id).await?;
            self.state
                .mark_dirty(self.snapshot_of(&tournament, summary, None))
                .await;
        }
        Ok(())
    }

    async fn finish_tournament(
        &self,
        tournament_id: TournamentId,
        summary: BracketSummary,
    ) -> TournamentResult<()> {
        let standings = self
            .brackets
            .read()
            .await
            .final_standings(&tournament_id)
            .unwrap_or_default();

        let updated = {
            let tournaments = self.tournaments.read().await;
            let tournament = tournaments
                .get(&tournament_id)
                .ok_or(TournamentError::NotFound(tournament_id))?;
            let mut updated = tournament.clone();
            updated.status = TournamentStatus::Completed;
            updated.finished_at = Some(Utc::now());
            updated
        };

        let format = updated.config.format;
        self.state
            .save_now(self.snapshot_of(&updated, summary.clone(), Some(standings.clone())))
            .await?;
        self.state
            .record_tournament_result(format.as_str(), &standings)
            .await?;

        self.tournaments
            .write()
            .await
            .insert(tournament_id, updated);
        self.brackets.write().await.remove(&tournament_id);
        self.active_matches
            .write()
            .await
            .retain(|_, owner| *owner != tournament_id);

        self.events.emit(TournamentEvent::Completed {
            tournament_id,
            standings,
            summary,
        });
        Ok(())
    }

    fn snapshot_of(
        &self,
        tournament: &Tournament,
        summary: BracketSummary,
        standings: Option<Vec<Standing>>,
    ) -> TournamentSnapshot {
        TournamentSnapshot {
            version: SNAPSHOT_VERSION,
            tournament_id: tournament.id,
            name: tournament.name.clone(),
            config: tournament.config.clone(),
            status: tournament.status,
            players: tournament.players.clone(),
            spectators: tournament.spectators.clone(),
            summary,
            standings,
            created_at: tournament.created_at,
            updated_at: Utc::now(),
        }
    }
}
