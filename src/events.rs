//! Tournament lifecycle events.
//!
//! The manager publishes through an [`EventSink`] handed in at construction,
//! so the embedding server decides where events go. [`LogSink`] writes to the
//! log facade, [`ChannelSink`] fans out over a tokio channel.

use crate::bracket::BracketSummary;
use crate::format::{MatchOutcome, ParticipantId, Standing, TournamentId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Ask the embedding server to open a race room for a started match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRequest {
    pub match_id: String,
    pub participants: Vec<ParticipantId>,
    pub race_time_limit_secs: u32,
}

/// Everything the manager announces. Each variant carries the bracket summary
/// as of the moment the event fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TournamentEvent {
    Created {
        tournament_id: TournamentId,
        name: String,
    },
    Started {
        tournament_id: TournamentId,
        summary: BracketSummary,
    },
    MatchStarted {
        tournament_id: TournamentId,
        room_request: RoomRequest,
        summary: BracketSummary,
    },
    MatchCompleted {
        tournament_id: TournamentId,
        outcome: MatchOutcome,
        summary: BracketSummary,
    },
    RoundCompleted {
        tournament_id: TournamentId,
        round: u32,
        summary: BracketSummary,
    },
    Completed {
        tournament_id: TournamentId,
        standings: Vec<Standing>,
        summary: BracketSummary,
    },
    Cancelled {
        tournament_id: TournamentId,
        reason: String,
    },
}

impl TournamentEvent {
    pub fn tournament_id(&self) -> TournamentId {
        match self {
            Self::Created { tournament_id, .. }
            | Self::Started { tournament_id, .. }
            | Self::MatchStarted { tournament_id, .. }
            | Self::MatchCompleted { tournament_id, .. }
            | Self::RoundCompleted { tournament_id, .. }
            | Self::Completed { tournament_id, .. }
            | Self::Cancelled { tournament_id, .. } => *tournament_id,
        }
    }
}

/// Sink for manager events. Emission must not block or fail the operation
/// that produced the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TournamentEvent);
}

/// Writes every event to the log facade. The default sink.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: TournamentEvent) {
        match &event {
            TournamentEvent::Created { tournament_id, name } => {
                log::info!("tournament {tournament_id} created: {name}");
            }
            TournamentEvent::Started { tournament_id, .. } => {
                log::info!("tournament {tournament_id} started");
            }
            TournamentEvent::MatchStarted {
                tournament_id,
                room_request,
                ..
            } => {
                log::info!(
                    "tournament {tournament_id} match {} started with {} racers",
                    room_request.match_id,
                    room_request.participants.len()
                );
            }
            TournamentEvent::MatchCompleted {
                tournament_id,
                outcome,
                ..
            } => {
                log::info!(
                    "tournament {tournament_id} match {} completed, winner {:?}",
                    outcome.match_id,
                    outcome.winner
                );
            }
            TournamentEvent::RoundCompleted {
                tournament_id,
                round,
                ..
            } => {
                log::info!("tournament {tournament_id} round {round} completed");
            }
            TournamentEvent::Completed { tournament_id, .. } => {
                log::info!("tournament {tournament_id} completed");
            }
            TournamentEvent::Cancelled {
                tournament_id,
                reason,
            } => {
                log::warn!("tournament {tournament_id} cancelled: {reason}");
            }
        }
    }
}

/// Forwards events over an unbounded tokio channel. Dropped receivers are
/// tolerated so a shutting-down consumer cannot wedge the manager.
pub struct ChannelSink {
    sender: UnboundedSender<TournamentEvent>,
}

impl ChannelSink {
    pub fn new(sender: UnboundedSender<TournamentEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TournamentEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("event receiver dropped, discarding event");
        }
    }
}
