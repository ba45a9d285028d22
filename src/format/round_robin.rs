//! Round-robin format: nobody is ever eliminated, standings decide everything.
//!
//! When the whole field fits in one race the tournament is a single match.
//! Otherwise a multi-round schedule is generated greedily up front, grouping
//! players who have faced each other the least until every pair has met the
//! minimum number of times. The heuristic is deliberately approximate; some
//! pairs may meet more often than others before the threshold is reached.

use super::TournamentFormat;
use super::core::{FormatConfig, FormatCore};
use super::errors::{FormatError, FormatResult};
use super::models::{
    BracketTag, BracketView, FormatName, Match, MatchOutcome, MatchType, ParticipantId,
    PlayerEntry, RaceResult, Standing, TournamentId,
};
use std::collections::HashMap;

/// Hard cap on the estimated schedule; the greedy scheduler degrades for very
/// large fields.
pub const MAX_SCHEDULED_MATCHES: usize = 200;

/// Cumulative record between one unordered pair of players.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadToHead {
    /// Wins for the lexicographically smaller id of the pair
    pub first_wins: u32,
    /// Wins for the larger id
    pub second_wins: u32,
}

fn pair_key(a: &str, b: &str) -> (ParticipantId, ParticipantId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

pub struct RoundRobin {
    core: FormatCore,
    rounds_generated: u32,
    /// Scheduled meetings per unordered pair, filled at generation time
    pair_meetings: HashMap<(ParticipantId, ParticipantId), u32>,
    /// Completed-race results per unordered pair
    head_to_head: HashMap<(ParticipantId, ParticipantId), HeadToHead>,
    standings: Vec<Standing>,
}

impl RoundRobin {
    pub fn new(tournament_id: TournamentId, config: FormatConfig) -> Self {
        Self {
            core: FormatCore::new(tournament_id, config),
            rounds_generated: 0,
            pair_meetings: HashMap::new(),
            head_to_head: HashMap::new(),
            standings: Vec::new(),
        }
    }

    pub fn rounds_generated(&self) -> u32 {
        self.rounds_generated
    }

    /// Times the pair was scheduled together.
    pub fn meetings(&self, a: &str, b: &str) -> u32 {
        self.pair_meetings.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    pub fn head_to_head(&self, a: &str, b: &str) -> HeadToHead {
        self.head_to_head
            .get(&pair_key(a, b))
            .copied()
            .unwrap_or_default()
    }

    /// Minimum number of times every pair must meet.
    fn pairing_target(n: usize, players_per_race: usize) -> u32 {
        ((n - 1).div_ceil(players_per_race - 1)) as u32
    }

    fn min_pair_meetings(&self, ids: &[ParticipantId]) -> u32 {
        let mut min = u32::MAX;
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                min = min.min(self.meetings(a, b));
            }
        }
        min
    }

    fn total_meetings(&self, id: &str, ids: &[ParticipantId]) -> u32 {
        ids.iter()
            .filter(|other| other.as_str() != id)
            .map(|other| self.meetings(id, other))
            .sum()
    }

    /// Greedily partition the field into race-sized groups, preferring
    /// opponents faced the least. A leftover single player sits the round out.
    fn build_round_groups(&self, ids: &[ParticipantId]) -> Vec<Vec<ParticipantId>> {
        let per_race = self.core.players_per_race();
        let mut remaining: Vec<ParticipantId> = ids.to_vec();
        remaining.sort_by_key(|id| {
            (
                self.total_meetings(id, ids),
                self.core.participant(id).map(|p| p.seed).unwrap_or(0),
            )
        });

        let mut groups = Vec::new();
        while remaining.len() >= 2 {
            let mut group = vec![remaining.remove(0)];
            while group.len() < per_race && !remaining.is_empty() {
                let mut best_index = 0;
                let mut best_cost = u32::MAX;
                for (index, candidate) in remaining.iter().enumerate() {
                    let cost: u32 = group
                        .iter()
                        .map(|member| self.meetings(member, candidate))
                        .sum();
                    if cost < best_cost {
                        best_cost = cost;
                        best_index = index;
                    }
                }
                group.push(remaining.remove(best_index));
            }
            groups.push(group);
        }
        groups
    }

    fn schedule_round(&mut self, round: u32, groups: Vec<Vec<ParticipantId>>) -> FormatResult<()> {
        for group in groups {
            for (i, a) in group.iter().enumerate() {
                for b in &group[i + 1..] {
                    *self.pair_meetings.entry(pair_key(a, b)).or_default() += 1;
                }
            }
            self.core
                .create_match(round, group, MatchType::Standard, BracketTag::Main)?;
        }
        self.rounds_generated = round;
        Ok(())
    }

    fn record_head_to_head(&mut self, order: &[ParticipantId]) {
        for (i, ahead) in order.iter().enumerate() {
            for behind in &order[i + 1..] {
                let key = pair_key(ahead, behind);
                let entry = self.head_to_head.entry(key.clone()).or_default();
                if *ahead == key.0 {
                    entry.first_wins += 1;
                } else {
                    entry.second_wins += 1;
                }
            }
        }
    }

    /// Net head-to-head score of `a` against `b`: positive means `a` leads.
    fn head_to_head_edge(&self, a: &str, b: &str) -> i64 {
        let key = pair_key(a, b);
        let record = self.head_to_head.get(&key).copied().unwrap_or_default();
        let (a_wins, b_wins) = if a == key.0.as_str() {
            (record.first_wins, record.second_wins)
        } else {
            (record.second_wins, record.first_wins)
        };
        i64::from(a_wins) - i64::from(b_wins)
    }

    /// Recompute standings: points, win rate, average finish, best finish,
    /// head-to-head between the tied pair, average race time.
    fn recompute_standings(&mut self) {
        let mut ids: Vec<ParticipantId> = self.core.seeded_order();
        ids.sort_by(|a, b| {
            let sa = self.core.stats_for(a).cloned().unwrap_or_default();
            let sb = self.core.stats_for(b).cloned().unwrap_or_default();
            sb.total_points
                .cmp(&sa.total_points)
                .then_with(|| sb.win_rate().total_cmp(&sa.win_rate()))
                .then_with(|| {
                    let fa = if sa.matches_played == 0 { f64::MAX } else { sa.average_finish };
                    let fb = if sb.matches_played == 0 { f64::MAX } else { sb.average_finish };
                    fa.total_cmp(&fb)
                })
                .then_with(|| {
                    sa.best_finish
                        .unwrap_or(u32::MAX)
                        .cmp(&sb.best_finish.unwrap_or(u32::MAX))
                })
                .then_with(|| self.head_to_head_edge(b, a).cmp(&self.head_to_head_edge(a, b)))
                .then_with(|| sa.average_time_ms().total_cmp(&sb.average_time_ms()))
        });

        self.standings = ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                let stats = self.core.stats_for(&id).cloned().unwrap_or_default();
                let name = self
                    .core
                    .participant(&id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                Standing {
                    position: index + 1,
                    participant_id: id,
                    name,
                    points: stats.total_points,
                    wins: stats.wins,
                    losses: stats.losses,
                }
            })
            .collect();
    }
}

impl TournamentFormat for RoundRobin {
    fn format_name(&self) -> FormatName {
        FormatName::RoundRobin
    }

    fn initialize(&mut self, players: Vec<PlayerEntry>) -> FormatResult<()> {
        self.core.initialize_participants(players)?;
        self.rounds_generated = 0;
        self.pair_meetings.clear();
        self.head_to_head.clear();
        self.standings.clear();
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

        let per_race = self.core.players_per_race();
        let ids = self.core.seeded_order();

        // Whole field fits in one race: one match, one round
        if per_race >= n {
            self.schedule_round(1, vec![ids])?;
            self.recompute_standings();
            return Ok(());
        }

        let target = Self::pairing_target(n, per_race);
        let estimated = target as usize * n.div_ceil(per_race);
        if estimated > MAX_SCHEDULED_MATCHES {
            return Err(FormatError::ScheduleTooLarge {
                estimated,
                cap: MAX_SCHEDULED_MATCHES,
            });
        }

        // Safety cap prevents runaway generation on pathological inputs
        let max_rounds = (2 * n) as u32;
        let mut round = 0;
        while self.min_pair_meetings(&ids) < target && round < max_rounds {
            round += 1;
            let groups = self.build_round_groups(&ids);
            self.schedule_round(round, groups)?;
        }

        self.recompute_standings();
        Ok(())
    }

    fn next_match(&self) -> Option<Match> {
        self.core.next_pending()
    }

    fn complete_match(&mut self, match_id: &str, result: RaceResult) -> FormatResult<MatchOutcome> {
        let record = self.core.match_snapshot(match_id)?;
        // Everyone continues: advancement is the full field
        let advancement = record.participants.len();
        let split = self.core.record_result(match_id, result, advancement)?;

        let order: Vec<ParticipantId> = split
            .order
            .iter()
            .map(|f| f.participant_id.clone())
            .collect();
        self.record_head_to_head(&order);
        self.recompute_standings();

        Ok(MatchOutcome {
            match_id: split.match_id,
            round: split.round,
            bracket: split.bracket,
            winner: split.winners.first().cloned(),
            eliminated: Vec::new(),
            round_complete: split.round_complete,
            tournament_complete: self.is_complete(),
        })
    }

    fn is_complete(&self) -> bool {
        self.core.total_matches() > 0
            && self.core.completed_matches() >= self.core.total_matches()
    }

    fn final_standings(&self) -> Vec<Standing> {
        self.standings.clone()
    }

    fn bracket_view(&self) -> BracketView {
        BracketView {
            format: FormatName::RoundRobin,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::models::{FinishEntry, SeedingStrategy};
    use uuid::Uuid;

    fn roster(n: usize) -> Vec<PlayerEntry> {
        (1..=n)
            .map(|i| {
                PlayerEntry::new(format!("p{i}"), format!("Player {i}"))
                    .with_rating((n - i + 1) as i32)
            })
            .collect()
    }

    fn format_with(n: usize, players_per_race: usize) -> RoundRobin {
        let mut format = RoundRobin::new(
            Uuid::new_v4(),
            FormatConfig {
                players_per_race,
                seeding: SeedingStrategy::Ranked,
            },
        );
        format.initialize(roster(n)).unwrap();
        format.generate_bracket().unwrap();
        format
    }

    fn numeric_suffix(id: &str) -> usize {
        id.trim_start_matches('p').parse().unwrap_or(usize::MAX)
    }

    /// Lowest suffix finishes first with a slightly faster time.
    fn favor_low(record: &Match) -> RaceResult {
        let mut ids = record.participant_ids();
        ids.sort_by_key(|id| numeric_suffix(id));
        RaceResult::new(
            ids.into_iter()
                .enumerate()
                .map(|(i, id)| FinishEntry {
                    participant_id: id,
                    finish_position: (i + 1) as u32,
                    race_time_ms: 80_000 + i as u64 * 900,
                })
                .collect(),
        )
    }

    fn run_to_completion(format: &mut RoundRobin) -> usize {
        let mut completed = 0;
        while let Some(record) = format.next_match() {
            let start = format.start_match(&record.id).unwrap();
            let result = favor_low(&start.match_record);
            format.complete_match(&record.id, result).unwrap();
            completed += 1;
            assert!(completed <= MAX_SCHEDULED_MATCHES, "runaway schedule");
        }
        completed
    }

    #[test]
    fn test_small_field_is_one_match() {
        let format = format_with(4, 6);
        assert_eq!(format.core().total_matches(), 1);
        assert_eq!(format.rounds_generated(), 1);
        let view = format.bracket_view();
        assert_eq!(view.rounds[0].matches[0].participants.len(), 4);
    }

    #[test]
    fn test_every_pair_meets_under_the_round_cap() {
        let format = format_with(6, 2);
        // Head-to-head target of 5 meetings per pair cannot fit under the
        // 2xN round cap; the scheduler stops at the cap with full coverage
        assert_eq!(format.rounds_generated(), 12);
        for i in 1..=6 {
            for j in (i + 1)..=6 {
                let a = format!("p{i}");
                let b = format!("p{j}");
                assert!(
                    format.meetings(&a, &b) >= 1,
                    "{a} and {b} never share a race"
                );
            }
        }
    }

    #[test]
    fn test_every_pair_shares_a_match_with_multi_player_races() {
        let format = format_with(7, 3);
        for i in 1..=7 {
            for j in (i + 1)..=7 {
                assert!(
                    format.meetings(&format!("p{i}"), &format!("p{j}")) >= 1,
                    "p{i} and p{j} never share a race"
                );
            }
        }
    }

    #[test]
    fn test_points_follow_finish_order() {
        let mut format = format_with(3, 6);
        let record = format.next_match().unwrap();
        format.start_match(&record.id).unwrap();
        format
            .complete_match(&record.id, favor_low(&record))
            .unwrap();

        // 3 finishers: points are N - position + 1
        assert_eq!(format.core().stats_for("p1").unwrap().total_points, 3);
        assert_eq!(format.core().stats_for("p2").unwrap().total_points, 2);
        assert_eq!(format.core().stats_for("p3").unwrap().total_points, 1);
    }

    #[test]
    fn test_nobody_is_ever_eliminated() {
        let mut format = format_with(5, 2);
        run_to_completion(&mut format);
        assert!(format.is_complete());
        assert!(format.core().participants().all(|p| !p.eliminated));
    }

    #[test]
    fn test_standings_order_by_points() {
        let mut format = format_with(4, 2);
        run_to_completion(&mut format);
        let standings = format.final_standings();
        assert_eq!(standings.len(), 4);
        // p1 wins every race it enters
        assert_eq!(standings[0].participant_id, "p1");
        for pair in standings.windows(2) {
            assert!(pair[0].points >= pair[1].points);
        }
    }

    #[test]
    fn test_head_to_head_ledger_is_symmetric() {
        let mut format = format_with(4, 4);
        let record = format.next_match().unwrap();
        format.start_match(&record.id).unwrap();
        format
            .complete_match(&record.id, favor_low(&record))
            .unwrap();

        let record = format.head_to_head("p1", "p2");
        let mirrored = format.head_to_head("p2", "p1");
        assert_eq!(record.first_wins, mirrored.first_wins);
        assert_eq!(record.second_wins, mirrored.second_wins);
        assert_eq!(format.head_to_head_edge("p1", "p2"), 1);
        assert_eq!(format.head_to_head_edge("p2", "p1"), -1);
    }

    #[test]
    fn test_oversized_schedule_is_rejected() {
        let mut format = RoundRobin::new(
            Uuid::new_v4(),
            FormatConfig {
                players_per_race: 2,
                seeding: SeedingStrategy::Ranked,
            },
        );
        format.initialize(roster(32)).unwrap();
        assert!(matches!(
            format.generate_bracket(),
            Err(FormatError::ScheduleTooLarge { .. })
        ));
    }

    #[test]
    fn test_odd_field_sit_outs_keep_full_coverage() {
        let format = format_with(5, 2);
        for i in 1..=5 {
            for j in (i + 1)..=5 {
                assert!(
                    format.meetings(&format!("p{i}"), &format!("p{j}")) >= 1,
                    "p{i} vs p{j}"
                );
            }
        }
    }

    #[test]
    fn test_summary_counts_stable_without_completion() {
        let format = format_with(4, 2);
        let first = format.bracket_view();
        let second = format.bracket_view();
        assert_eq!(first.rounds.len(), second.rounds.len());
        assert_eq!(
            first.rounds[0].total_matches,
            second.rounds[0].total_matches
        );
    }
}
