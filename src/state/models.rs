//! Persistent state models.
//!
//! Snapshots are versioned so old rows can be migrated if the shape ever
//! changes. Match records and career stats are append-oriented history kept
//! beyond the life of any single tournament.

use crate::bracket::BracketSummary;
use crate::format::{
    BracketTag, MatchType, ParticipantId, PlayerEntry, RaceResult, Standing, TournamentId,
};
use crate::tournament::{TournamentConfig, TournamentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bump when the snapshot shape changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full durable state of one tournament at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentSnapshot {
    pub version: u32,
    pub tournament_id: TournamentId,
    pub name: String,
    pub config: TournamentConfig,
    pub status: TournamentStatus,
    pub players: Vec<PlayerEntry>,
    pub spectators: Vec<ParticipantId>,
    pub summary: BracketSummary,
    /// Present once the tournament completed
    pub standings: Option<Vec<Standing>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One completed match, as recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub tournament_id: TournamentId,
    pub match_id: String,
    pub bracket: BracketTag,
    pub round: u32,
    pub match_type: MatchType,
    pub participants: Vec<ParticipantId>,
    pub winner: Option<ParticipantId>,
    pub result: Option<RaceResult>,
    pub completed_at: DateTime<Utc>,
}

/// Cross-tournament lifetime statistics for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCareerStats {
    pub participant_id: ParticipantId,
    pub name: String,
    pub tournaments_played: u32,
    pub tournaments_won: u32,
    pub matches_played: u32,
    pub matches_won: u32,
    /// Best final standing across all tournaments (1 = a title)
    pub best_finish: Option<u32>,
    /// Tournaments entered per format name
    pub format_counts: HashMap<String, u32>,
    pub updated_at: DateTime<Utc>,
}

impl PlayerCareerStats {
    pub fn new(participant_id: ParticipantId, name: String) -> Self {
        Self {
            participant_id,
            name,
            tournaments_played: 0,
            tournaments_won: 0,
            matches_played: 0,
            matches_won: 0,
            best_finish: None,
            format_counts: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Fold one tournament outcome into the career record.
    pub fn record_tournament(&mut self, format: &str, standing: &Standing) {
        let position = standing.position as u32;
        self.tournaments_played += 1;
        if position == 1 {
            self.tournaments_won += 1;
        }
        self.matches_played += standing.wins + standing.losses;
        self.matches_won += standing.wins;
        self.best_finish = Some(match self.best_finish {
            Some(best) => best.min(position),
            None => position,
        });
        *self.format_counts.entry(format.to_string()).or_insert(0) += 1;
        self.updated_at = Utc::now();
    }

    /// Format the player has entered most often.
    pub fn favorite_format(&self) -> Option<&str> {
        self.format_counts
            .iter()
            .max_by_key(|(name, count)| (**count, std::cmp::Reverse(name.as_str())))
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(position: usize, wins: u32, losses: u32) -> Standing {
        Standing {
            position,
            participant_id: "p1".to_string(),
            name: "Player 1".to_string(),
            points: 0,
            wins,
            losses,
        }
    }

    #[test]
    fn test_career_stats_accumulate() {
        let mut stats = PlayerCareerStats::new("p1".to_string(), "Player 1".to_string());
        stats.record_tournament("single_elimination", &standing(3, 2, 1));
        stats.record_tournament("single_elimination", &standing(1, 3, 0));
        stats.record_tournament("round_robin", &standing(5, 1, 4));

        assert_eq!(stats.tournaments_played, 3);
        assert_eq!(stats.tournaments_won, 1);
        assert_eq!(stats.matches_played, 11);
        assert_eq!(stats.matches_won, 6);
        assert_eq!(stats.best_finish, Some(1));
        assert_eq!(stats.favorite_format(), Some("single_elimination"));
    }

    #[test]
    fn test_favorite_format_empty() {
        let stats = PlayerCareerStats::new("p1".to_string(), "Player 1".to_string());
        assert!(stats.favorite_format().is_none());
    }
}
