//! Double-elimination format: a winners-bracket loss drops you to the losers
//! bracket, a losers-bracket loss is final.
//!
//! Both bracket champions funnel into grand finals. If the losers-bracket
//! champion takes grand finals, the winners-bracket entrant has only just
//! suffered their first loss, so a reset match decides the title.

use super::TournamentFormat;
use super::core::{FormatConfig, FormatCore};
use super::errors::{FormatError, FormatResult};
use super::models::{
    BracketTag, BracketView, EliminationRecord, FormatName, Match, MatchOutcome, MatchType,
    Participant, ParticipantId, PlayerEntry, RaceResult, ResultSplit, Standing, TournamentId,
};
use std::collections::{HashMap, HashSet};

/// Which elimination track a participant currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Winners,
    Losers,
    Out,
}

pub struct DoubleElimination {
    core: FormatCore,
    bracket_size: usize,
    winners_rounds: u32,
    /// Capacity bound, not an exact count: enough rounds to absorb every
    /// winners-bracket drop plus internal losers-bracket eliminations
    losers_rounds: u32,
    /// Entrants accumulated for upcoming winners rounds
    winners_queue: HashMap<u32, Vec<ParticipantId>>,
    /// Entrants accumulated for upcoming losers rounds
    losers_pool: HashMap<u32, Vec<ParticipantId>>,
    generated_losers: HashSet<u32>,
    /// Both bracket champions land here; grand finals is created at size 2
    grand_finals_queue: Vec<ParticipantId>,
    winners_champion: Option<ParticipantId>,
    losers_champion: Option<ParticipantId>,
    side: HashMap<ParticipantId, Side>,
    eliminations: HashMap<ParticipantId, EliminationRecord>,
    grand_finals_created: bool,
    /// Present only if the losers-bracket champion won grand finals
    reset_match: Option<String>,
    champion: Option<ParticipantId>,
    runner_up: Option<ParticipantId>,
    complete: bool,
}

impl DoubleElimination {
    pub fn new(tournament_id: TournamentId, config: FormatConfig) -> Self {
        Self {
            core: FormatCore::new(tournament_id, config),
            bracket_size: 0,
            winners_rounds: 0,
            losers_rounds: 0,
            winners_queue: HashMap::new(),
            losers_pool: HashMap::new(),
            generated_losers: HashSet::new(),
            grand_finals_queue: Vec::new(),
            winners_champion: None,
            losers_champion: None,
            side: HashMap::new(),
            eliminations: HashMap::new(),
            grand_finals_created: false,
            reset_match: None,
            champion: None,
            runner_up: None,
            complete: false,
        }
    }

    pub fn winners_rounds(&self) -> u32 {
        self.winners_rounds
    }

    pub fn losers_rounds(&self) -> u32 {
        self.losers_rounds
    }

    pub fn champion(&self) -> Option<&ParticipantId> {
        self.champion.as_ref()
    }

    pub fn reset_match_id(&self) -> Option<&String> {
        self.reset_match.as_ref()
    }

    /// Losers round receiving the drops from a winners round.
    fn losers_round_from_winners_round(round: u32) -> u32 {
        if round <= 1 { 1 } else { 2 * (round - 1) }
    }

    /// Winners round feeding drops into a losers round, where one exists.
    fn feeding_winners_round(losers_round: u32) -> Option<u32> {
        if losers_round == 1 {
            Some(1)
        } else if losers_round % 2 == 0 {
            Some(losers_round / 2 + 1)
        } else {
            None
        }
    }

    fn advancement_count(record: &Match) -> usize {
        if record.is_bye() {
            1
        } else {
            record.participants.len().div_ceil(2)
        }
    }

    fn build_round(
        &mut self,
        bracket: BracketTag,
        round: u32,
        players: Vec<ParticipantId>,
    ) -> FormatResult<()> {
        let per_race = self.core.players_per_race();
        for chunk in players.chunks(per_race) {
            let match_type = if chunk.len() == 1 {
                MatchType::Bye
            } else {
                MatchType::Standard
            };
            self.core
                .create_match(round, chunk.to_vec(), match_type, bracket)?;
        }
        Ok(())
    }

    fn apply_winners(&mut self, split: &ResultSplit) -> FormatResult<()> {
        self.winners_queue
            .entry(split.round + 1)
            .or_default()
            .extend(split.winners.iter().cloned());

        // One loss from the winners bracket is a drop, never an elimination
        for loser in &split.losers {
            self.side.insert(loser.clone(), Side::Losers);
            self.losers_pool
                .entry(Self::losers_round_from_winners_round(split.round))
                .or_default()
                .push(loser.clone());
        }

        if split.round_complete {
            let next = self
                .winners_queue
                .remove(&(split.round + 1))
                .unwrap_or_default();
            match next.len() {
                0 => {
                    return Err(FormatError::Inconsistent(format!(
                        "winners round {} completed with no advancing players",
                        split.round
                    )));
                }
                1 => {
                    let champ = next.into_iter().next();
                    if let Some(champ) = champ {
                        self.grand_finals_queue.push(champ.clone());
                        self.winners_champion = Some(champ);
                    }
                }
                _ => self.build_round(BracketTag::Winners, split.round + 1, next)?,
            }
        }
        Ok(())
    }

    fn apply_losers(&mut self, split: &ResultSplit) -> FormatResult<Vec<ParticipantId>> {
        self.losers_pool
            .entry(split.round + 1)
            .or_default()
            .extend(split.winners.iter().cloned());

        let mut eliminated = Vec::new();
        for loser in &split.losers {
            self.core.mark_eliminated(loser)?;
            self.side.insert(loser.clone(), Side::Out);
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
                    bracket: BracketTag::Losers,
                    round: split.round,
                    finish_position: finish.position,
                    race_time_ms: finish.race_time_ms,
                },
            );
            eliminated.push(loser.clone());
        }
        Ok(eliminated)
    }

    fn apply_grand_finals(&mut self, split: &ResultSplit) -> FormatResult<()> {
        let winner = split.winners.first().cloned().ok_or_else(|| {
            FormatError::Inconsistent("grand finals completed without a winner".to_string())
        })?;
        let loser = split.losers.first().cloned();

        match split.match_type {
            MatchType::GrandFinals => {
                if Some(&winner) == self.winners_champion.as_ref() {
                    // Winners-bracket champion stays undefeated in the set
                    self.finish(winner, loser);
                } else {
                    // First loss for the winners-bracket entrant: the set
                    // resets and must be won a second time
                    let pair = vec![
                        self.winners_champion.clone().ok_or_else(|| {
                            FormatError::Inconsistent(
                                "grand finals ran before a winners champion was known".to_string(),
                            )
                        })?,
                        winner,
                    ];
                    let id = self.core.create_match(
                        2,
                        pair,
                        MatchType::GrandFinalsReset,
                        BracketTag::GrandFinals,
                    )?;
                    self.reset_match = Some(id);
                }
            }
            MatchType::GrandFinalsReset => {
                self.finish(winner, loser);
            }
            _ => {
                return Err(FormatError::Inconsistent(format!(
                    "match {} in grand finals bracket has type {:?}",
                    split.match_id, split.match_type
                )));
            }
        }
        Ok(())
    }

    fn finish(&mut self, champion: ParticipantId, runner_up: Option<ParticipantId>) {
        if let Some(loser) = &runner_up {
            self.side.insert(loser.clone(), Side::Out);
        }
        self.side.insert(champion.clone(), Side::Out);
        self.champion = Some(champion);
        self.runner_up = runner_up;
        self.complete = true;
    }

    fn losers_round_settled(&self, round: u32) -> bool {
        self.generated_losers.contains(&round)
            && (!self.core.round_exists(BracketTag::Losers, round)
                || self.core.round_complete(BracketTag::Losers, round))
    }

    fn winners_round_done(&self, round: u32) -> bool {
        self.winners_champion.is_some() || self.core.round_complete(BracketTag::Winners, round)
    }

    /// Generate any losers rounds whose feeders have finished dropping.
    fn generate_ready_losers_rounds(&mut self) -> FormatResult<()> {
        for round in 1..=self.losers_rounds {
            if self.generated_losers.contains(&round) {
                continue;
            }
            if round > 1 && !self.losers_round_settled(round - 1) {
                break;
            }
            if let Some(feeder) = Self::feeding_winners_round(round)
                && !self.winners_round_done(feeder)
            {
                break;
            }

            let pool = self.losers_pool.remove(&round).unwrap_or_default();
            match pool.len() {
                0 => {
                    self.generated_losers.insert(round);
                }
                1 => {
                    // Sole survivor waits for company in the next round
                    let sole = pool.into_iter().next();
                    if let Some(sole) = sole {
                        self.core.grant_bye(&sole)?;
                        self.losers_pool.entry(round + 1).or_default().push(sole);
                    }
                    self.generated_losers.insert(round);
                }
                _ => {
                    self.build_round(BracketTag::Losers, round, pool)?;
                    self.generated_losers.insert(round);
                }
            }
        }
        Ok(())
    }

    fn check_losers_champion(&mut self) {
        if self.losers_champion.is_some()
            || self.winners_champion.is_none()
            || self.core.has_open_matches(BracketTag::Losers)
        {
            return;
        }
        let alive: Vec<ParticipantId> = self
            .side
            .iter()
            .filter(|(_, side)| **side == Side::Losers)
            .map(|(id, _)| id.clone())
            .collect();
        if alive.len() == 1 {
            let champ = alive.into_iter().next();
            if let Some(champ) = champ {
                self.grand_finals_queue.push(champ.clone());
                self.losers_champion = Some(champ);
            }
        }
    }

    fn maybe_create_grand_finals(&mut self) -> FormatResult<()> {
        if !self.grand_finals_created && self.grand_finals_queue.len() == 2 {
            self.core.create_match(
                1,
                self.grand_finals_queue.clone(),
                MatchType::GrandFinals,
                BracketTag::GrandFinals,
            )?;
            self.grand_finals_created = true;
        }
        Ok(())
    }

    /// Run after every completion: schedule ready losers rounds, detect the
    /// losers-bracket champion and create grand finals once both champions
    /// are known.
    fn advance_schedule(&mut self) -> FormatResult<()> {
        self.generate_ready_losers_rounds()?;
        self.check_losers_champion();
        self.maybe_create_grand_finals()
    }

    fn standing_rank(&self, participant: &Participant) -> u8 {
        if self.champion.as_deref() == Some(&participant.id) {
            0
        } else if self.runner_up.as_deref() == Some(&participant.id) {
            1
        } else {
            match self.side.get(&participant.id) {
                Some(Side::Winners) => 2,
                Some(Side::Losers) => 3,
                _ => 4,
            }
        }
    }
}

impl TournamentFormat for DoubleElimination {
    fn format_name(&self) -> FormatName {
        FormatName::DoubleElimination
    }

    fn initialize(&mut self, players: Vec<PlayerEntry>) -> FormatResult<()> {
        self.core.initialize_participants(players)?;
        self.bracket_size = 0;
        self.winners_rounds = 0;
        self.losers_rounds = 0;
        self.winners_queue.clear();
        self.losers_pool.clear();
        self.generated_losers.clear();
        self.grand_finals_queue.clear();
        self.winners_champion = None;
        self.losers_champion = None;
        self.side.clear();
        self.eliminations.clear();
        self.grand_finals_created = false;
        self.reset_match = None;
        self.champion = None;
        self.runner_up = None;
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
        self.winners_rounds = self.bracket_size.ilog2();
        self.losers_rounds = 2 * self.winners_rounds - 1;

        let seeded = self.core.seeded_order();
        for id in &seeded {
            self.side.insert(id.clone(), Side::Winners);
        }

        let bye_count = self.bracket_size - n;
        for id in &seeded[..bye_count] {
            self.core.grant_bye(id)?;
            self.winners_queue.entry(2).or_default().push(id.clone());
        }

        self.build_round(BracketTag::Winners, 1, seeded[bye_count..].to_vec())
    }

    fn next_match(&self) -> Option<Match> {
        self.core.next_pending()
    }

    fn complete_match(&mut self, match_id: &str, result: RaceResult) -> FormatResult<MatchOutcome> {
        let record = self.core.match_snapshot(match_id)?;
        let advancement = Self::advancement_count(&record);
        let split = self.core.record_result(match_id, result, advancement)?;

        let eliminated = match split.bracket {
            BracketTag::Winners => {
                self.apply_winners(&split)?;
                Vec::new()
            }
            BracketTag::Losers => self.apply_losers(&split)?,
            BracketTag::GrandFinals => {
                self.apply_grand_finals(&split)?;
                Vec::new()
            }
            BracketTag::Main => {
                return Err(FormatError::Inconsistent(format!(
                    "double elimination has no main bracket, match {match_id}"
                )));
            }
        };

        if !self.complete {
            self.advance_schedule()?;
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

    fn is_complete(&self) -> bool {
        self.complete
    }

    /// Champion, runner-up, then eliminations grouped by depth: falling later
    /// in the losers bracket ranks above falling earlier.
    fn final_standings(&self) -> Vec<Standing> {
        let mut entries: Vec<&Participant> = self.core.participants().collect();
        entries.sort_by(|a, b| {
            self.standing_rank(a)
                .cmp(&self.standing_rank(b))
                .then_with(|| {
                    match (self.eliminations.get(&a.id), self.eliminations.get(&b.id)) {
                        (Some(ea), Some(eb)) => eb
                            .round
                            .cmp(&ea.round)
                            .then_with(|| ea.finish_position.cmp(&eb.finish_position))
                            .then_with(|| ea.race_time_ms.cmp(&eb.race_time_ms)),
                        _ => a.seed.cmp(&b.seed),
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
            format: FormatName::DoubleElimination,
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
