//! Tournament lifecycle error taxonomy.

use super::models::TournamentStatus;
use crate::format::{FormatError, TournamentId};
use crate::state::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Match not found: {0}")]
    MatchNotFound(String),

    #[error("Tournament not in correct state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("Invalid player bounds: min {min}, max {max} (allowed 4..=64, min <= max)")]
    InvalidPlayerBounds { min: usize, max: usize },

    #[error("Invalid players per race: {0} (allowed 2..=6)")]
    InvalidPlayersPerRace(usize),

    #[error("Invalid race time limit: {0}s (allowed 60..=900)")]
    InvalidRaceTimeLimit(u32),

    #[error("Tournament is full")]
    TournamentFull,

    #[error("Player already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Player not registered: {0}")]
    NotRegistered(String),

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Spectators are not allowed")]
    SpectatorsDisabled,

    #[error("Spectator capacity reached")]
    SpectatorsFull,

    #[error("Already spectating: {0}")]
    AlreadySpectating(String),

    #[error("Not spectating: {0}")]
    NotSpectating(String),

    #[error("Insufficient players: need {needed}, have {current}")]
    InsufficientPlayers { needed: usize, current: usize },

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type TournamentResult<T> = Result<T, TournamentError>;
