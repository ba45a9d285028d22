//! Shared data models for tournament formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tournament ID type
pub type TournamentId = Uuid;

/// Participant ID type (external identity, opaque to the engine)
pub type ParticipantId = String;

/// Match ID type
pub type MatchId = String;

/// Room ID type (assigned by the external room/transport system)
pub type RoomId = String;

/// Roster entry handed to a format at initialization.
///
/// The optional rating is only consulted by the ranked and balanced seeding
/// strategies; registration order is preserved as the original seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: ParticipantId,
    pub name: String,
    pub rating: Option<i32>,
}

impl PlayerEntry {
    pub fn new(id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// A competitor inside one tournament, owned by the active format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    /// Current seed, may be rewritten by the seeding strategy
    pub seed: usize,
    /// Registration-order seed, immutable once assigned
    pub original_seed: usize,
    pub rating: Option<i32>,
    pub eliminated: bool,
    pub wins: u32,
    pub losses: u32,
    /// Bye rounds received
    pub byes: u32,
}

/// Seeding strategies selectable per tournament.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedingStrategy {
    /// Uniform shuffle
    #[default]
    Random,
    /// Sort by external rating, best first
    Ranked,
    /// Alternating top/bottom interleave of the ranked order
    Balanced,
}

/// Supported tournament formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatName {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
}

impl FormatName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatName::SingleElimination => "single_elimination",
            FormatName::DoubleElimination => "double_elimination",
            FormatName::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for FormatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FormatName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_elimination" => Ok(FormatName::SingleElimination),
            "double_elimination" => Ok(FormatName::DoubleElimination),
            "round_robin" => Ok(FormatName::RoundRobin),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

/// Match type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Standard,
    /// Single non-bye participant, resolves without a real contest
    Bye,
    GrandFinals,
    /// Rematch created when the losers-bracket champion wins grand finals
    GrandFinalsReset,
}

/// Bracket segment a match belongs to.
///
/// Declaration order doubles as display order when brackets are flattened
/// into one round list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketTag {
    /// Linear bracket used by single-elimination and round-robin
    Main,
    Winners,
    Losers,
    GrandFinals,
}

impl fmt::Display for BracketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            BracketTag::Main => "main",
            BracketTag::Winners => "winners",
            BracketTag::Losers => "losers",
            BracketTag::GrandFinals => "grand_finals",
        };
        f.write_str(tag)
    }
}

/// Match lifecycle status. Transitions strictly pending -> active -> completed;
/// byes are the one sanctioned shortcut and resolve on start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Active,
    Completed,
}

/// A participant slot inside a match, with the seed frozen at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSlot {
    pub participant_id: ParticipantId,
    pub seed: usize,
}

/// One finisher in a race result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishEntry {
    pub participant_id: ParticipantId,
    /// 1-indexed finishing position
    pub finish_position: u32,
    pub race_time_ms: u64,
}

/// Ordered race result delivered by the external race engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub finishers: Vec<FinishEntry>,
}

impl RaceResult {
    pub fn new(finishers: Vec<FinishEntry>) -> Self {
        Self { finishers }
    }

    /// Zero-duration, zero-opponent result recorded for a resolved bye.
    pub fn bye(participant_id: ParticipantId) -> Self {
        Self {
            finishers: vec![FinishEntry {
                participant_id,
                finish_position: 1,
                race_time_ms: 0,
            }],
        }
    }
}

/// A scheduled contest between participants.
///
/// Matches are retained after completion so standings can be reconstructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round: u32,
    pub match_type: MatchType,
    pub bracket: BracketTag,
    pub participants: Vec<MatchSlot>,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub winner: Option<ParticipantId>,
    /// Non-winning finishers in finish order
    pub losers: Vec<ParticipantId>,
    pub results: Option<RaceResult>,
    /// Externally-bound room reference
    pub room: Option<RoomId>,
    /// Creation sequence number, used to hand out pending matches in order
    pub(crate) seq: u64,
}

impl Match {
    /// A match with exactly one non-bye participant is a bye.
    pub fn is_bye(&self) -> bool {
        self.participants.len() <= 1 || self.match_type == MatchType::Bye
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .map(|slot| slot.participant_id.clone())
            .collect()
    }

    pub fn has_participant(&self, id: &str) -> bool {
        self.participants
            .iter()
            .any(|slot| slot.participant_id == id)
    }
}

/// Per-player cumulative statistics within one tournament.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub matches_played: u32,
    pub total_points: u32,
    pub wins: u32,
    pub losses: u32,
    pub best_finish: Option<u32>,
    pub worst_finish: Option<u32>,
    /// Running mean of finishing positions
    pub average_finish: f64,
    pub total_time_ms: u64,
}

impl PlayerStats {
    /// Fold one finish into the running statistics.
    pub fn record_finish(&mut self, position: u32, time_ms: u64, points: u32) {
        self.matches_played += 1;
        self.total_points += points;
        self.total_time_ms += time_ms;
        self.best_finish = Some(match self.best_finish {
            Some(best) => best.min(position),
            None => position,
        });
        self.worst_finish = Some(match self.worst_finish {
            Some(worst) => worst.max(position),
            None => position,
        });
        let played = f64::from(self.matches_played);
        self.average_finish = (self.average_finish * (played - 1.0) + f64::from(position)) / played;
    }

    pub fn win_rate(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.matches_played)
        }
    }

    pub fn average_time_ms(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.total_time_ms as f64 / f64::from(self.matches_played)
        }
    }
}

/// One row of (final or in-progress) standings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-indexed standing position
    pub position: usize,
    pub participant_id: ParticipantId,
    pub name: String,
    pub points: u32,
    pub wins: u32,
    pub losses: u32,
}

/// One finisher after result processing, with the points awarded.
#[derive(Debug, Clone)]
pub struct FinishRecord {
    pub participant_id: ParticipantId,
    pub position: u32,
    pub race_time_ms: u64,
    pub points: u32,
}

/// Outcome of recording a result in the format core, before the format's own
/// advancement bookkeeping runs.
#[derive(Debug, Clone)]
pub struct ResultSplit {
    pub match_id: MatchId,
    pub round: u32,
    pub bracket: BracketTag,
    pub match_type: MatchType,
    /// Finishers that continue, per the format's advancement count
    pub winners: Vec<ParticipantId>,
    /// Finishers that do not advance, in finish order
    pub losers: Vec<ParticipantId>,
    /// Full finish order with awarded points
    pub order: Vec<FinishRecord>,
    /// True when this completion closed out its (bracket, round) segment
    pub round_complete: bool,
}

/// Outcome of a completed match, surfaced to the orchestrator layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub round: u32,
    pub bracket: BracketTag,
    pub winner: Option<ParticipantId>,
    /// Participants eliminated by this completion
    pub eliminated: Vec<ParticipantId>,
    pub round_complete: bool,
    pub tournament_complete: bool,
}

/// Result of starting a match. Byes resolve synchronously, in which case the
/// full completion outcome rides along.
#[derive(Debug, Clone)]
pub struct MatchStart {
    pub match_record: Match,
    pub bye_outcome: Option<MatchOutcome>,
}

/// Where and when a participant was knocked out, kept for standings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliminationRecord {
    pub bracket: BracketTag,
    pub round: u32,
    pub finish_position: u32,
    pub race_time_ms: u64,
}

/// A format's raw bracket shape: single-elimination and round-robin produce one
/// linear `Main` sequence, double-elimination produces winners + losers +
/// grand-finals segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketView {
    pub format: FormatName,
    pub rounds: Vec<RoundView>,
}

/// An ordered collection of matches sharing a round number and bracket tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundView {
    pub bracket: BracketTag,
    pub round: u32,
    pub completed_matches: usize,
    pub total_matches: usize,
    pub matches: Vec<Match>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name_round_trip() {
        for name in [
            FormatName::SingleElimination,
            FormatName::DoubleElimination,
            FormatName::RoundRobin,
        ] {
            let parsed: FormatName = name.as_str().parse().unwrap();
            assert_eq!(parsed, name);
        }
        assert!("swiss".parse::<FormatName>().is_err());
    }

    #[test]
    fn test_bracket_tag_display_order() {
        assert!(BracketTag::Main < BracketTag::Winners);
        assert!(BracketTag::Winners < BracketTag::Losers);
        assert!(BracketTag::Losers < BracketTag::GrandFinals);
        assert_eq!(BracketTag::GrandFinals.to_string(), "grand_finals");
    }

    #[test]
    fn test_player_stats_running_average() {
        let mut stats = PlayerStats::default();
        stats.record_finish(1, 60_000, 4);
        stats.record_finish(3, 70_000, 2);
        assert_eq!(stats.matches_played, 2);
        assert_eq!(stats.total_points, 6);
        assert_eq!(stats.best_finish, Some(1));
        assert_eq!(stats.worst_finish, Some(3));
        assert!((stats.average_finish - 2.0).abs() < f64::EPSILON);
        assert!((stats.average_time_ms() - 65_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bye_result_is_zero_duration() {
        let result = RaceResult::bye("p1".to_string());
        assert_eq!(result.finishers.len(), 1);
        assert_eq!(result.finishers[0].finish_position, 1);
        assert_eq!(result.finishers[0].race_time_ms, 0);
    }
}
