//! Single-elimination format: lose once (outside the advancing half) and you
//! are out.
//!
//! The bracket is sized to the next power of two; the best seeds absorb the
//! byes so uneven fields never reward weak entrants with a free round. Rounds
//! are generated lazily from the advanced-player queue, never from a re-scan
//! of the field.

use super::TournamentFormat;
use super::core::{FormatConfig, FormatCore};
use super::errors::{FormatError, FormatResult};
use super::models::{
    BracketTag, BracketView, EliminationRecord, FormatName, Match, MatchOutcome, MatchType,
    ParticipantId, PlayerEntry, RaceResult, ResultSplit, Standing, TournamentId,
};
use std::collections::HashMap;

pub struct SingleElimination {
    core: FormatCore,
    bracket_size: usize,
    total_rounds: u32,
    current_round: u32,
    /// Winners queued for the next round (plus initial bye seeds)
    advanced: Vec<ParticipantId>,
    eliminations: HashMap<ParticipantId, EliminationRecord>,
    champion: Option<ParticipantId>,
    complete: bool,
}

impl SingleElimination {
    pub fn new(tournament_id: TournamentId, config: FormatConfig) -> Self {
        Self {
            core: FormatCore::new(tournament_id, config),
            bracket_size: 0,
            total_rounds: 0,
            current_round: 0,
            advanced: Vec::new(),
            eliminations: HashMap::new(),
            champion: None,
            complete: false,
        }
    }

    pub fn bracket_size(&self) -> usize {
        self.bracket_size
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn champion(&self) -> Option<&ParticipantId> {
        self.champion.as_ref()
    }

    /// Winners advance; the rest of the field is out with no second chance.
    fn advancement_count(record: &Match) -> usize {
        if record.is_bye() {
            1
        } else {
            record.participants.len().div_ceil(2)
        }
    }

    /// Slice a player list into race-sized matches; a trailing singleton
    /// becomes a bye into the next round rather than being discarded.
    fn build_round(&mut self, round: u32, players: Vec<ParticipantId>) -> FormatResult<()> {
        self.current_round = round;
        let per_race = self.core.players_per_race();
        for chunk in players.chunks(per_race) {
            let match_type = if chunk.len() == 1 {
                MatchType::Bye
            } else {
                MatchType::Standard
            };
            self.core
                .create_match(round, chunk.to_vec(), match_type, BracketTag::Main)?;
        }
        Ok(())
    }

    fn apply_split(&mut self, split: ResultSplit) -> FormatResult<MatchOutcome> {
        self.advanced.extend(split.winners.clone());

        let mut eliminated = Vec::new();
        for loser in &split.losers {
            self.core.mark_eliminated(loser)?;
            let finish = split
                .order
                .iter()
                .find(|f| &f.participant_id == loser)
                .ok_or_else(|| {
                    FormatError::Inconsistent(format!("loser {loser} missing from finish order"))
                })?;
            self.eliminations.insert(
                loser.clone(),
                EliminationRecord {
                    bracket: BracketTag::Main,
                    round: split.round,
                    finish_position: finish.position,
                    race_time_ms: finish.race_time_ms,
                },
            );
            eliminated.push(loser.clone());
        }

        if split.round_complete {
            let queue = std::mem::take(&mut self.advanced);
            if queue.len() == 1 && split.round >= self.total_rounds {
                self.champion = queue.into_iter().next();
                self.complete = true;
            } else {
                self.build_round(split.round + 1, queue)?;
            }
        }

        Ok(MatchOutcome {
            match_id: split.match_id,
            round: split.round,
            bracket: split.bracket,
            winner: split.winners.first().cloned(),
            eliminated,
            round_complete: split.round_complete,
            tournament_complete: self.complete,
        })
    }
}

impl TournamentFormat for SingleElimination {
    fn format_name(&self) -> FormatName {
        FormatName::SingleElimination
    }

    fn initialize(&mut self, players: Vec<PlayerEntry>) -> FormatResult<()> {
        self.core.initialize_participants(players)?;
        self.bracket_size = 0;
        self.total_rounds = 0;
        self.current_round = 0;
        self.advanced.clear();
        self.eliminations.clear();
        self.champion = None;
        self.complete = false;
        Ok(())
    }

    fn generate_bracket(&mut self) -> FormatResult<()> {
        let n = self.core.participant_count();
        if n < 2 {
            return Err(FormatError::NotEnoughParticipants {
                needed: 2,
                current: n,
            });
        }

        self.bracket_size = n.next_power_of_two();
        self.total_rounds = self.bracket_size.ilog2();

        let seeded = self.core.seeded_order();
        let bye_count = self.bracket_size - n;

        // Byes go to the best seeds, straight into the round-2 queue
        for id in &seeded[..bye_count] {
            self.core.grant_bye(id)?;
            self.advanced.push(id.clone());
        }

        self.build_round(1, seeded[bye_count..].to_vec())
    }

    fn next_match(&self) -> Option<Match> {
        self.core.next_pending()
    }

    fn complete_match(&mut self, match_id: &str, result: RaceResult) -> FormatResult<MatchOutcome> {
        let record = self.core.match_snapshot(match_id)?;
        let advancement = Self::advancement_count(&record);
        let split = self.core.record_result(match_id, result, advancement)?;
        self.apply_split(split)
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    /// Position 1 is the finalist winner; everyone else ranks by elimination
    /// round descending, then finish position and race time within the round.
    fn final_standings(&self) -> Vec<Standing> {
        let mut entries: Vec<&super::models::Participant> = self.core.participants().collect();
        entries.sort_by(|a, b| {
            let champ = |p: &super::models::Participant| self.champion.as_deref() == Some(&p.id);
            champ(b).cmp(&champ(a)).then_with(|| {
                match (self.eliminations.get(&a.id), self.eliminations.get(&b.id)) {
                    // Still active players rank above eliminated ones
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, None) => a.seed.cmp(&b.seed),
                    (Some(ea), Some(eb)) => eb
                        .round
                        .cmp(&ea.round)
                        .then_with(|| ea.finish_position.cmp(&eb.finish_position))
                        .then_with(|| ea.race_time_ms.cmp(&eb.race_time_ms)),
                }
            })
        });

        entries
            .into_iter()
            .enumerate()
            .map(|(index, p)| {
                let stats = self.core.stats_for(&p.id).cloned().unwrap_or_default();
                Standing {
                    position: index + 1,
                    participant_id: p.id.clone(),
                    name: p.name.clone(),
                    points: stats.total_points,
                    wins: p.wins,
                    losses: p.losses,
                }
            })
            .collect()
    }

    fn bracket_view(&self) -> BracketView {
        BracketView {
            format: FormatName::SingleElimination,
            rounds: self.core.round_views(),
        }
    }

    fn core(&self) -> &FormatCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FormatCore {
        &mut self.core
    }
}
