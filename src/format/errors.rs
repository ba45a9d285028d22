//! Format-level error types.

use super::models::{MatchId, MatchStatus, ParticipantId};
use thiserror::Error;

/// Errors produced by format strategies and the shared format core.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Match id is unknown to the active format
    #[error("match not found: {0}")]
    MatchNotFound(MatchId),

    /// Participant id is unknown to the active format
    #[error("participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    /// Operation requires the match to be in a different lifecycle status
    #[error("match {match_id} not in expected status: expected {expected:?}, got {actual:?}")]
    InvalidMatchStatus {
        match_id: MatchId,
        expected: MatchStatus,
        actual: MatchStatus,
    },

    /// Formats cannot be initialized with an empty roster
    #[error("cannot initialize format with an empty roster")]
    EmptyRoster,

    /// Too few participants for the format to build a bracket
    #[error("not enough participants: need {needed}, have {current}")]
    NotEnoughParticipants { needed: usize, current: usize },

    /// Result payload does not line up with the match participants
    #[error("malformed race result: {0}")]
    MalformedResult(String),

    /// Estimated schedule exceeds the scheduler's safety cap
    #[error("schedule too large: estimated {estimated} matches, cap is {cap}")]
    ScheduleTooLarge { estimated: usize, cap: usize },

    /// Internal bookkeeping disagreement; the operation is failed rather than
    /// leaving a round partially advanced
    #[error("bracket inconsistency: {0}")]
    Inconsistent(String),
}

/// Result type for format operations
pub type FormatResult<T> = Result<T, FormatError>;
