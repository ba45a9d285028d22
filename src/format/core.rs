//! Shared bookkeeping composed by every format strategy.
//!
//! `FormatCore` owns the participant and match maps for one tournament,
//! allocates match ids, resolves byes, splits results into winners/losers and
//! accumulates per-player statistics. Format strategies layer their scheduling
//! and advancement rules on top of it.

use super::errors::{FormatError, FormatResult};
use super::models::{
    BracketTag, FinishRecord, Match, MatchId, MatchSlot, MatchStatus, MatchType, Participant,
    ParticipantId, PlayerEntry, PlayerStats, RaceResult, ResultSplit, RoundView, SeedingStrategy,
    TournamentId,
};
use chrono::Utc;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Per-format configuration shared by all strategies.
#[derive(Debug, Clone, Copy)]
pub struct FormatConfig {
    /// Participants per race, 2..=6 at the orchestrator boundary
    pub players_per_race: usize,
    pub seeding: SeedingStrategy,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            players_per_race: 2,
            seeding: SeedingStrategy::Random,
        }
    }
}

/// Completion counters for one (bracket, round) segment.
#[derive(Debug, Clone, Copy, Default)]
struct RoundCounter {
    total: usize,
    completed: usize,
}

/// Result of attempting to start a match.
#[derive(Debug, Clone)]
pub enum StartAction {
    /// Match transitioned pending -> active
    Started(Match),
    /// Match is a bye; the synthetic result must be fed through the format's
    /// completion path without the match ever going active
    Bye(RaceResult),
}

/// Shared participant/match/statistics state for one tournament.
#[derive(Debug)]
pub struct FormatCore {
    tournament_id: TournamentId,
    config: FormatConfig,
    participants: HashMap<ParticipantId, Participant>,
    /// Participant ids in current seed order
    seed_order: Vec<ParticipantId>,
    matches: HashMap<MatchId, Match>,
    stats: HashMap<ParticipantId, PlayerStats>,
    rounds: HashMap<(BracketTag, u32), RoundCounter>,
    total_matches: usize,
    completed_matches: usize,
    next_seq: u64,
}

impl FormatCore {
    pub fn new(tournament_id: TournamentId, config: FormatConfig) -> Self {
        Self {
            tournament_id,
            config,
            participants: HashMap::new(),
            seed_order: Vec::new(),
            matches: HashMap::new(),
            stats: HashMap::new(),
            rounds: HashMap::new(),
            total_matches: 0,
            completed_matches: 0,
            next_seq: 0,
        }
    }

    pub fn tournament_id(&self) -> TournamentId {
        self.tournament_id
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    pub fn players_per_race(&self) -> usize {
        self.config.players_per_race
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn total_matches(&self) -> usize {
        self.total_matches
    }

    pub fn completed_matches(&self) -> usize {
        self.completed_matches
    }

    /// Reset all participant and statistics maps and assign seeds.
    ///
    /// Seeds start in input order, then the configured seeding strategy
    /// reorders them; the registration-order seed is frozen as
    /// `original_seed`.
    pub fn initialize_participants(&mut self, players: Vec<PlayerEntry>) -> FormatResult<()> {
        if players.is_empty() {
            return Err(FormatError::EmptyRoster);
        }

        self.participants.clear();
        self.seed_order.clear();
        self.matches.clear();
        self.stats.clear();
        self.rounds.clear();
        self.total_matches = 0;
        self.completed_matches = 0;
        self.next_seq = 0;

        for (index, entry) in players.into_iter().enumerate() {
            let participant = Participant {
                id: entry.id.clone(),
                name: entry.name,
                seed: index + 1,
                original_seed: index + 1,
                rating: entry.rating,
                eliminated: false,
                wins: 0,
                losses: 0,
                byes: 0,
            };
            self.stats.insert(entry.id.clone(), PlayerStats::default());
            self.seed_order.push(entry.id.clone());
            self.participants.insert(entry.id, participant);
        }

        self.apply_seeding();
        Ok(())
    }

    fn apply_seeding(&mut self) {
        match self.config.seeding {
            SeedingStrategy::Random => {
                self.seed_order.shuffle(&mut rand::rng());
            }
            SeedingStrategy::Ranked => {
                self.sort_by_rating();
            }
            SeedingStrategy::Balanced => {
                self.sort_by_rating();
                let ranked = std::mem::take(&mut self.seed_order);
                let mut front = 0usize;
                let mut back = ranked.len();
                let mut interleaved = Vec::with_capacity(ranked.len());
                // Alternate best-remaining / worst-remaining off the ranked order
                while front < back {
                    interleaved.push(ranked[front].clone());
                    front += 1;
                    if front < back {
                        back -= 1;
                        interleaved.push(ranked[back].clone());
                    }
                }
                self.seed_order = interleaved;
            }
        }

        for (index, id) in self.seed_order.iter().enumerate() {
            if let Some(participant) = self.participants.get_mut(id) {
                participant.seed = index + 1;
            }
        }
    }

    fn sort_by_rating(&mut self) {
        let participants = &self.participants;
        self.seed_order.sort_by(|a, b| {
            let rating = |id: &ParticipantId| {
                participants
                    .get(id)
                    .and_then(|p| p.rating)
                    .unwrap_or(i32::MIN)
            };
            let order = |id: &ParticipantId| {
                participants.get(id).map(|p| p.original_seed).unwrap_or(0)
            };
            rating(b)
                .cmp(&rating(a))
                .then_with(|| order(a).cmp(&order(b)))
        });
    }

    /// Participant ids in current seed order.
    pub fn seeded_order(&self) -> Vec<ParticipantId> {
        self.seed_order.clone()
    }

    pub fn participant(&self, id: &str) -> FormatResult<&Participant> {
        self.participants
            .get(id)
            .ok_or_else(|| FormatError::ParticipantNotFound(id.to_string()))
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn stats_for(&self, id: &str) -> Option<&PlayerStats> {
        self.stats.get(id)
    }

    pub fn mark_eliminated(&mut self, id: &str) -> FormatResult<()> {
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| FormatError::ParticipantNotFound(id.to_string()))?;
        participant.eliminated = true;
        Ok(())
    }

    pub fn grant_bye(&mut self, id: &str) -> FormatResult<()> {
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| FormatError::ParticipantNotFound(id.to_string()))?;
        participant.byes += 1;
        Ok(())
    }

    /// Allocate a match with a globally-unique id and register it pending.
    ///
    /// The id embeds tournament, bracket and round plus a random suffix so
    /// rapid creation cannot collide.
    pub fn create_match(
        &mut self,
        round: u32,
        players: Vec<ParticipantId>,
        match_type: MatchType,
        bracket: BracketTag,
    ) -> FormatResult<MatchId> {
        let mut slots = Vec::with_capacity(players.len());
        for id in players {
            let participant = self.participant(&id)?;
            slots.push(MatchSlot {
                participant_id: id,
                seed: participant.seed,
            });
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let match_id = format!(
            "{}-{}-r{}-{}",
            self.tournament_id.simple(),
            bracket,
            round,
            &suffix[..8]
        );

        let record = Match {
            id: match_id.clone(),
            tournament_id: self.tournament_id,
            round,
            match_type,
            bracket,
            participants: slots,
            status: MatchStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            winner: None,
            losers: Vec::new(),
            results: None,
            room: None,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.total_matches += 1;
        self.rounds.entry((bracket, round)).or_default().total += 1;
        self.matches.insert(match_id.clone(), record);
        Ok(match_id)
    }

    pub fn match_snapshot(&self, id: &str) -> FormatResult<Match> {
        self.matches
            .get(id)
            .cloned()
            .ok_or_else(|| FormatError::MatchNotFound(id.to_string()))
    }

    /// First pending match in creation order, if any.
    pub fn next_pending(&self) -> Option<Match> {
        self.matches
            .values()
            .filter(|m| m.status == MatchStatus::Pending)
            .min_by_key(|m| m.seq)
            .cloned()
    }

    /// Any match in the given bracket not yet completed?
    pub fn has_open_matches(&self, bracket: BracketTag) -> bool {
        self.matches
            .values()
            .any(|m| m.bracket == bracket && m.status != MatchStatus::Completed)
    }

    /// Start a pending match, or hand back the synthetic result for a bye.
    pub fn start_match(&mut self, id: &str) -> FormatResult<StartAction> {
        let record = self
            .matches
            .get_mut(id)
            .ok_or_else(|| FormatError::MatchNotFound(id.to_string()))?;
        if record.status != MatchStatus::Pending {
            return Err(FormatError::InvalidMatchStatus {
                match_id: id.to_string(),
                expected: MatchStatus::Pending,
                actual: record.status,
            });
        }

        if record.is_bye() {
            let sole = record
                .participants
                .first()
                .map(|slot| slot.participant_id.clone())
                .ok_or_else(|| {
                    FormatError::Inconsistent(format!("bye match {id} has no participants"))
                })?;
            return Ok(StartAction::Bye(RaceResult::bye(sole)));
        }

        record.status = MatchStatus::Active;
        record.started_at = Some(Utc::now());
        Ok(StartAction::Started(record.clone()))
    }

    pub fn bind_room(&mut self, id: &str, room: String) -> FormatResult<()> {
        let record = self
            .matches
            .get_mut(id)
            .ok_or_else(|| FormatError::MatchNotFound(id.to_string()))?;
        record.room = Some(room);
        Ok(())
    }

    /// Record a race result against a match and split finishers into
    /// winners/losers at the format's advancement count.
    ///
    /// Finishers are sorted by position ascending; points are
    /// `max(1, N - position + 1)`. Win/loss counters use the top half of the
    /// field so they stay meaningful for formats where everyone advances.
    pub fn record_result(
        &mut self,
        id: &str,
        result: RaceResult,
        advancement: usize,
    ) -> FormatResult<ResultSplit> {
        let record = self
            .matches
            .get(id)
            .ok_or_else(|| FormatError::MatchNotFound(id.to_string()))?;

        let bye = record.is_bye();
        let status_ok = record.status == MatchStatus::Active
            || (bye && record.status == MatchStatus::Pending);
        if !status_ok {
            return Err(FormatError::InvalidMatchStatus {
                match_id: id.to_string(),
                expected: MatchStatus::Active,
                actual: record.status,
            });
        }

        if result.finishers.len() != record.participants.len() {
            return Err(FormatError::MalformedResult(format!(
                "expected {} finishers, got {}",
                record.participants.len(),
                result.finishers.len()
            )));
        }
        let mut seen = HashSet::new();
        let mut positions = HashSet::new();
        for entry in &result.finishers {
            if !record.has_participant(&entry.participant_id) {
                return Err(FormatError::MalformedResult(format!(
                    "finisher {} is not in match {id}",
                    entry.participant_id
                )));
            }
            if !seen.insert(entry.participant_id.as_str()) {
                return Err(FormatError::MalformedResult(format!(
                    "finisher {} listed more than once",
                    entry.participant_id
                )));
            }
            // Positions must be a permutation of 1..=N
            if entry.finish_position == 0
                || entry.finish_position as usize > result.finishers.len()
                || !positions.insert(entry.finish_position)
            {
                return Err(FormatError::MalformedResult(format!(
                    "finish position {} is out of range or repeated",
                    entry.finish_position
                )));
            }
        }

        let mut ordered = result.finishers.clone();
        ordered.sort_by_key(|entry| entry.finish_position);

        let field = ordered.len();
        let top_half = field.div_ceil(2);
        let mut order = Vec::with_capacity(field);
        for (index, entry) in ordered.iter().enumerate() {
            let position = entry.finish_position;
            let points = (field as i64 - i64::from(position) + 1).max(1) as u32;
            order.push(FinishRecord {
                participant_id: entry.participant_id.clone(),
                position,
                race_time_ms: entry.race_time_ms,
                points,
            });

            if let Some(stats) = self.stats.get_mut(&entry.participant_id) {
                stats.record_finish(position, entry.race_time_ms, points);
                if !bye {
                    if index < top_half {
                        stats.wins += 1;
                    } else {
                        stats.losses += 1;
                    }
                }
            }
            if let Some(participant) = self.participants.get_mut(&entry.participant_id) {
                if bye {
                    participant.byes += 1;
                } else if index < top_half {
                    participant.wins += 1;
                } else {
                    participant.losses += 1;
                }
            }
        }

        let winners: Vec<ParticipantId> = order
            .iter()
            .take(advancement)
            .map(|f| f.participant_id.clone())
            .collect();
        let losers: Vec<ParticipantId> = order
            .iter()
            .skip(advancement)
            .map(|f| f.participant_id.clone())
            .collect();

        // Mutate the match only after validation passed
        let record = self
            .matches
            .get_mut(id)
            .ok_or_else(|| FormatError::MatchNotFound(id.to_string()))?;
        record.status = MatchStatus::Completed;
        record.completed_at = Some(Utc::now());
        record.winner = order.first().map(|f| f.participant_id.clone());
        record.losers = losers.clone();
        record.results = Some(result);
        let round = record.round;
        let bracket = record.bracket;
        let match_type = record.match_type;

        self.completed_matches += 1;
        let counter = self.rounds.entry((bracket, round)).or_default();
        counter.completed += 1;
        let round_complete = counter.completed >= counter.total;

        Ok(ResultSplit {
            match_id: id.to_string(),
            round,
            bracket,
            match_type,
            winners,
            losers,
            order,
            round_complete,
        })
    }

    pub fn round_complete(&self, bracket: BracketTag, round: u32) -> bool {
        self.rounds
            .get(&(bracket, round))
            .map(|c| c.total > 0 && c.completed >= c.total)
            .unwrap_or(false)
    }

    pub fn round_exists(&self, bracket: BracketTag, round: u32) -> bool {
        self.rounds.contains_key(&(bracket, round))
    }

    /// Matches grouped into ordered (bracket, round) segments.
    pub fn round_views(&self) -> Vec<RoundView> {
        let mut keys: Vec<(BracketTag, u32)> = self.rounds.keys().copied().collect();
        keys.sort();

        keys.into_iter()
            .map(|(bracket, round)| {
                let mut matches: Vec<Match> = self
                    .matches
                    .values()
                    .filter(|m| m.bracket == bracket && m.round == round)
                    .cloned()
                    .collect();
                matches.sort_by_key(|m| m.seq);
                let counter = self.rounds.get(&(bracket, round)).copied().unwrap_or_default();
                RoundView {
                    bracket,
                    round,
                    completed_matches: counter.completed,
                    total_matches: counter.total,
                    matches,
                }
            })
            .collect()
    }
}
