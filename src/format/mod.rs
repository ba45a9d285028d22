//! Tournament format strategies.
//!
//! Three structurally different schedulers sit behind one contract:
//! - [`SingleElimination`]: lose outside the advancing half once and you're out
//! - [`DoubleElimination`]: winners and losers brackets, grand finals, reset
//! - [`RoundRobin`]: nobody is eliminated, standings decide everything
//!
//! All three compose [`FormatCore`] for participant bookkeeping, match
//! creation, bye resolution and statistics. Dispatch goes through
//! `enum_dispatch`, so the orchestrator holds a [`FormatKind`] without paying
//! for dynamic dispatch.

pub mod core;
pub mod double_elimination;
pub mod errors;
pub mod models;
pub mod round_robin;
pub mod single_elimination;

pub use self::core::{FormatConfig, FormatCore, StartAction};
pub use double_elimination::DoubleElimination;
pub use errors::{FormatError, FormatResult};
pub use models::{
    BracketTag, BracketView, EliminationRecord, FinishEntry, FinishRecord, FormatName, Match,
    MatchId, MatchOutcome, MatchSlot, MatchStart, MatchStatus, MatchType, Participant,
    ParticipantId, PlayerEntry, PlayerStats, RaceResult, ResultSplit, RoomId, RoundView,
    SeedingStrategy, Standing, TournamentId,
};
pub use round_robin::{HeadToHead, MAX_SCHEDULED_MATCHES, RoundRobin};
pub use single_elimination::SingleElimination;

use enum_dispatch::enum_dispatch;

/// Contract every format strategy implements.
///
/// The engine is reactive: `start_match` marks a match active and returns,
/// and nothing moves until a result arrives through `complete_match`.
#[enum_dispatch]
pub trait TournamentFormat {
    fn format_name(&self) -> FormatName;

    /// Reset participant state and assign seeds from the (finalized) roster.
    fn initialize(&mut self, players: Vec<PlayerEntry>) -> FormatResult<()>;

    /// Build the initial schedule. Must run after `initialize`.
    fn generate_bracket(&mut self) -> FormatResult<()>;

    /// Next pending match in creation order, if any.
    fn next_match(&self) -> Option<Match>;

    /// Start a pending match. A bye resolves synchronously: the sole
    /// participant is recorded as winner with a zero-duration result and the
    /// completion outcome is returned alongside the match.
    fn start_match(&mut self, match_id: &str) -> FormatResult<MatchStart> {
        match self.core_mut().start_match(match_id)? {
            StartAction::Started(record) => Ok(MatchStart {
                match_record: record,
                bye_outcome: None,
            }),
            StartAction::Bye(result) => {
                let outcome = self.complete_match(match_id, result)?;
                Ok(MatchStart {
                    match_record: self.core().match_snapshot(match_id)?,
                    bye_outcome: Some(outcome),
                })
            }
        }
    }

    /// Absorb a race result: update statistics and standings, advance or
    /// eliminate participants and extend the schedule where a round closed.
    fn complete_match(&mut self, match_id: &str, result: RaceResult) -> FormatResult<MatchOutcome>;

    fn is_complete(&self) -> bool;

    /// Current ranking of the full field; final once `is_complete` is true.
    fn final_standings(&self) -> Vec<Standing>;

    /// The format's bracket shape as ordered (bracket, round) segments.
    fn bracket_view(&self) -> BracketView;

    fn core(&self) -> &FormatCore;
    fn core_mut(&mut self) -> &mut FormatCore;
}

/// The three interchangeable format strategies.
#[enum_dispatch(TournamentFormat)]
pub enum FormatKind {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
}
