//! Tournament configuration and lifecycle models.

use super::errors::{TournamentError, TournamentResult};
use crate::format::{FormatName, ParticipantId, PlayerEntry, SeedingStrategy, TournamentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_PLAYER_BOUND: usize = 4;
pub const MAX_PLAYER_BOUND: usize = 64;

/// Host-supplied tournament settings, validated on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub format: FormatName,
    pub min_players: usize,
    pub max_players: usize,
    pub players_per_race: usize,
    pub race_time_limit_secs: u32,
    pub seeding: SeedingStrategy,
    pub allow_spectators: bool,
    pub max_spectators: usize,
    /// Carried through to events only; wager settlement lives elsewhere
    pub allow_betting: bool,
    pub registration_deadline: Option<DateTime<Utc>>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            format: FormatName::SingleElimination,
            min_players: 4,
            max_players: 16,
            players_per_race: 2,
            race_time_limit_secs: 300,
            seeding: SeedingStrategy::Random,
            allow_spectators: true,
            max_spectators: 50,
            allow_betting: false,
            registration_deadline: None,
        }
    }
}

impl TournamentConfig {
    pub fn validate(&self) -> TournamentResult<()> {
        if self.min_players < MIN_PLAYER_BOUND
            || self.max_players > MAX_PLAYER_BOUND
            || self.min_players > self.max_players
        {
            return Err(TournamentError::InvalidPlayerBounds {
                min: self.min_players,
                max: self.max_players,
            });
        }
        if !(2..=6).contains(&self.players_per_race) {
            return Err(TournamentError::InvalidPlayersPerRace(self.players_per_race));
        }
        if !(60..=900).contains(&self.race_time_limit_secs) {
            return Err(TournamentError::InvalidRaceTimeLimit(
                self.race_time_limit_secs,
            ));
        }
        Ok(())
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.registration_deadline
            .is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    Registration,
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Registration => "registration",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One tournament as tracked by the manager. Finished tournaments are
/// archived in place, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub config: TournamentConfig,
    pub status: TournamentStatus,
    pub players: Vec<PlayerEntry>,
    pub spectators: Vec<ParticipantId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Tournament {
    pub fn new(name: String, config: TournamentConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name,
            config,
            status: TournamentStatus::Registration,
            players: Vec::new(),
            spectators: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    pub fn has_player(&self, participant_id: &str) -> bool {
        self.players.iter().any(|p| p.id == participant_id)
    }

    pub fn has_spectator(&self, participant_id: &str) -> bool {
        self.spectators.iter().any(|s| s == participant_id)
    }
}

/// Manager-level counts for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentStats {
    pub total: usize,
    pub registration: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
}
