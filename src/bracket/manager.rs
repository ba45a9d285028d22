//! Bracket orchestrator: one live format instance per tournament behind a
//! format-agnostic facade.

use super::summary::BracketSummary;
use crate::format::{
    DoubleElimination, FormatConfig, FormatError, FormatKind, FormatName, FormatResult, Match,
    MatchOutcome, MatchStart, PlayerEntry, RaceResult, RoundRobin, SingleElimination, Standing,
    TournamentFormat, TournamentId,
};
use std::collections::HashMap;

/// Constructor registered per format name.
pub type FormatBuilder = fn(TournamentId, FormatConfig) -> FormatKind;

fn build_single_elimination(id: TournamentId, config: FormatConfig) -> FormatKind {
    FormatKind::from(SingleElimination::new(id, config))
}

fn build_double_elimination(id: TournamentId, config: FormatConfig) -> FormatKind {
    FormatKind::from(DoubleElimination::new(id, config))
}

fn build_round_robin(id: TournamentId, config: FormatConfig) -> FormatKind {
    FormatKind::from(RoundRobin::new(id, config))
}

/// Owns the format-name registry and the live format instances.
///
/// Summary and standings lookups on unknown tournaments return fallbacks
/// rather than erroring, since display consumers poll opportunistically.
/// Result submission is strict: a result for a tournament with no live
/// format is rejected, which is what retires stale results after cleanup.
pub struct BracketManager {
    registry: HashMap<String, FormatBuilder>,
    active: HashMap<TournamentId, FormatKind>,
}

impl BracketManager {
    pub fn new() -> Self {
        let mut registry: HashMap<String, FormatBuilder> = HashMap::new();
        registry.insert(
            FormatName::SingleElimination.as_str().to_string(),
            build_single_elimination as FormatBuilder,
        );
        registry.insert(
            FormatName::DoubleElimination.as_str().to_string(),
            build_double_elimination as FormatBuilder,
        );
        registry.insert(
            FormatName::RoundRobin.as_str().to_string(),
            build_round_robin as FormatBuilder,
        );
        Self {
            registry,
            active: HashMap::new(),
        }
    }

    /// Register an additional format constructor under a name.
    pub fn register_format(&mut self, name: impl Into<String>, builder: FormatBuilder) {
        self.registry.insert(name.into(), builder);
    }

    pub fn supported_formats(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_bracket(&self, tournament_id: &TournamentId) -> bool {
        self.active.contains_key(tournament_id)
    }

    /// Instantiate a format for the tournament, seed the roster and generate
    /// the initial schedule. Replaces any previous instance: brackets are
    /// always (re-)built from the finalized roster.
    pub fn create_bracket(
        &mut self,
        tournament_id: TournamentId,
        format: FormatName,
        config: FormatConfig,
        players: Vec<PlayerEntry>,
    ) -> FormatResult<BracketSummary> {
        let builder = self.registry.get(format.as_str()).ok_or_else(|| {
            FormatError::Inconsistent(format!("no registered builder for format {format}"))
        })?;

        let mut instance = builder(tournament_id, config);
        instance.initialize(players)?;
        instance.generate_bracket()?;

        let summary = BracketSummary::from_view(&instance.bracket_view(), instance.is_complete());
        self.active.insert(tournament_id, instance);
        log::info!("created {format} bracket for tournament {tournament_id}");
        Ok(summary)
    }

    /// Start the next pending match, if a format is live and has one.
    pub fn start_next_match(
        &mut self,
        tournament_id: &TournamentId,
    ) -> FormatResult<Option<MatchStart>> {
        let Some(format) = self.active.get_mut(tournament_id) else {
            return Ok(None);
        };
        let Some(record) = format.next_match() else {
            return Ok(None);
        };
        format.start_match(&record.id).map(Some)
    }

    /// Start a specific pending match, used when replaying history.
    pub fn start_match(
        &mut self,
        tournament_id: &TournamentId,
        match_id: &str,
    ) -> FormatResult<MatchStart> {
        let format = self
            .active
            .get_mut(tournament_id)
            .ok_or_else(|| FormatError::MatchNotFound(match_id.to_string()))?;
        format.start_match(match_id)
    }

    /// Feed a race result to the live format.
    pub fn complete_match(
        &mut self,
        tournament_id: &TournamentId,
        match_id: &str,
        result: RaceResult,
    ) -> FormatResult<MatchOutcome> {
        let format = self
            .active
            .get_mut(tournament_id)
            .ok_or_else(|| FormatError::MatchNotFound(match_id.to_string()))?;
        format.complete_match(match_id, result)
    }

    /// Record the externally-assigned room on an active match.
    pub fn bind_room(
        &mut self,
        tournament_id: &TournamentId,
        match_id: &str,
        room: String,
    ) -> FormatResult<()> {
        let format = self
            .active
            .get_mut(tournament_id)
            .ok_or_else(|| FormatError::MatchNotFound(match_id.to_string()))?;
        format.core_mut().bind_room(match_id, room)
    }

    pub fn match_snapshot(&self, tournament_id: &TournamentId, match_id: &str) -> Option<Match> {
        self.active
            .get(tournament_id)
            .and_then(|format| format.core().match_snapshot(match_id).ok())
    }

    /// Current bracket summary, or the fallback when no format is live.
    pub fn bracket_summary(&self, tournament_id: &TournamentId) -> BracketSummary {
        match self.active.get(tournament_id) {
            Some(format) => {
                BracketSummary::from_view(&format.bracket_view(), format.is_complete())
            }
            None => BracketSummary::empty(),
        }
    }

    pub fn final_standings(&self, tournament_id: &TournamentId) -> Option<Vec<Standing>> {
        self.active
            .get(tournament_id)
            .map(|format| format.final_standings())
    }

    pub fn is_complete(&self, tournament_id: &TournamentId) -> bool {
        self.active
            .get(tournament_id)
            .map(|format| format.is_complete())
            .unwrap_or(false)
    }

    /// Tear down the live format instance, if any.
    pub fn remove(&mut self, tournament_id: &TournamentId) -> Option<FormatKind> {
        self.active.remove(tournament_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for BracketManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FinishEntry, SeedingStrategy};
    use uuid::Uuid;

    fn roster(n: usize) -> Vec<PlayerEntry> {
        (1..=n)
            .map(|i| PlayerEntry::new(format!("p{i}"), format!("Player {i}")))
            .collect()
    }

    fn config() -> FormatConfig {
        FormatConfig {
            players_per_race: 2,
            seeding: SeedingStrategy::Ranked,
        }
    }

    fn in_order_result(record: &Match) -> RaceResult {
        RaceResult::new(
            record
                .participants
                .iter()
                .enumerate()
                .map(|(i, slot)| FinishEntry {
                    participant_id: slot.participant_id.clone(),
                    finish_position: (i + 1) as u32,
                    race_time_ms: 100_000 + i as u64 * 800,
                })
                .collect(),
        )
    }

    #[test]
    fn test_registry_lists_builtin_formats() {
        let manager = BracketManager::new();
        assert_eq!(
            manager.supported_formats(),
            vec!["double_elimination", "round_robin", "single_elimination"]
        );
    }

    #[test]
    fn test_summary_fallback_without_bracket() {
        let manager = BracketManager::new();
        let id = Uuid::new_v4();
        let summary = manager.bracket_summary(&id);
        assert_eq!(summary, BracketSummary::empty());
        assert!(!manager.is_complete(&id));
        assert!(manager.final_standings(&id).is_none());
    }

    #[test]
    fn test_start_next_without_bracket_is_none() {
        let mut manager = BracketManager::new();
        assert!(manager.start_next_match(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_stale_result_is_rejected() {
        let mut manager = BracketManager::new();
        let id = Uuid::new_v4();
        manager
            .create_bracket(id, FormatName::SingleElimination, config(), roster(4))
            .unwrap();
        let start = manager.start_next_match(&id).unwrap().unwrap();
        manager.remove(&id);

        let result = in_order_result(&start.match_record);
        assert!(matches!(
            manager.complete_match(&id, &start.match_record.id, result),
            Err(FormatError::MatchNotFound(_))
        ));
    }

    #[test]
    fn test_summary_idempotent_between_completions() {
        let mut manager = BracketManager::new();
        let id = Uuid::new_v4();
        manager
            .create_bracket(id, FormatName::SingleElimination, config(), roster(8))
            .unwrap();

        let first = manager.bracket_summary(&id);
        let second = manager.bracket_summary(&id);
        assert_eq!(first, second);

        let start = manager.start_next_match(&id).unwrap().unwrap();
        let result = in_order_result(&start.match_record);
        manager
            .complete_match(&id, &start.match_record.id, result)
            .unwrap();
        let third = manager.bracket_summary(&id);
        assert_eq!(third.completed_matches, first.completed_matches + 1);
    }

    #[test]
    fn test_drive_tournament_through_facade() {
        let mut manager = BracketManager::new();
        let id = Uuid::new_v4();
        manager
            .create_bracket(id, FormatName::SingleElimination, config(), roster(8))
            .unwrap();

        let mut completed = 0;
        while let Some(start) = manager.start_next_match(&id).unwrap() {
            if start.bye_outcome.is_some() {
                completed += 1;
                continue;
            }
            let result = in_order_result(&start.match_record);
            manager
                .complete_match(&id, &start.match_record.id, result)
                .unwrap();
            completed += 1;
            assert!(completed <= 64);
        }

        assert_eq!(completed, 7);
        assert!(manager.is_complete(&id));
        let standings = manager.final_standings(&id).unwrap();
        assert_eq!(standings.len(), 8);
    }

    #[test]
    fn test_independent_tournaments_do_not_interfere() {
        let mut manager = BracketManager::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        manager
            .create_bracket(a, FormatName::SingleElimination, config(), roster(4))
            .unwrap();
        manager
            .create_bracket(b, FormatName::RoundRobin, config(), roster(4))
            .unwrap();

        let start = manager.start_next_match(&a).unwrap().unwrap();
        let result = in_order_result(&start.match_record);
        manager
            .complete_match(&a, &start.match_record.id, result)
            .unwrap();

        assert_eq!(manager.bracket_summary(&b).completed_matches, 0);
        assert_eq!(manager.active_count(), 2);
    }
}
