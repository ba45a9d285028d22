//! Legacy-shaped bracket summary for display consumers.
//!
//! Every format's heterogeneous bracket shape is normalized into one flat
//! round list: single-elimination and round-robin contribute their linear
//! `main` rounds, double-elimination contributes winners, losers and
//! grand-finals segments in that order.

use crate::format::{BracketView, FormatName, Match, MatchStatus, MatchType, ParticipantId};
use serde::{Deserialize, Serialize};

/// Condensed view of one match for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: String,
    pub match_type: MatchType,
    pub status: MatchStatus,
    pub participants: Vec<ParticipantId>,
    pub winner: Option<ParticipantId>,
}

impl From<&Match> for MatchSummary {
    fn from(record: &Match) -> Self {
        Self {
            id: record.id.clone(),
            match_type: record.match_type,
            status: record.status,
            participants: record.participant_ids(),
            winner: record.winner.clone(),
        }
    }
}

/// One flattened round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub bracket: crate::format::BracketTag,
    pub round: u32,
    pub completed_matches: usize,
    pub total_matches: usize,
    pub matches: Vec<MatchSummary>,
}

/// Format-agnostic bracket summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketSummary {
    /// None in the fallback summary, when no format is active
    pub format: Option<FormatName>,
    pub rounds: Vec<RoundSummary>,
    pub total_matches: usize,
    pub completed_matches: usize,
    pub total_rounds: usize,
    /// First flattened round that is not fully complete (1-indexed), or the
    /// last round once everything finished
    pub current_round: usize,
    pub complete: bool,
}

impl BracketSummary {
    /// Fallback for callers polling a tournament with no active format.
    pub fn empty() -> Self {
        Self {
            format: None,
            rounds: Vec::new(),
            total_matches: 0,
            completed_matches: 0,
            total_rounds: 0,
            current_round: 0,
            complete: false,
        }
    }

    pub fn from_view(view: &BracketView, complete: bool) -> Self {
        let rounds: Vec<RoundSummary> = view
            .rounds
            .iter()
            .map(|round| RoundSummary {
                bracket: round.bracket,
                round: round.round,
                completed_matches: round.completed_matches,
                total_matches: round.total_matches,
                matches: round.matches.iter().map(MatchSummary::from).collect(),
            })
            .collect();

        let total_matches = rounds.iter().map(|r| r.total_matches).sum();
        let completed_matches = rounds.iter().map(|r| r.completed_matches).sum();
        let current_round = rounds
            .iter()
            .position(|r| r.completed_matches < r.total_matches)
            .map(|index| index + 1)
            .unwrap_or(rounds.len());

        Self {
            format: Some(view.format),
            total_rounds: rounds.len(),
            total_matches,
            completed_matches,
            current_round,
            complete,
            rounds,
        }
    }
}
