//! # Race Brackets
//!
//! A tournament bracket engine for racing games: single-elimination,
//! double-elimination and round-robin formats behind one polymorphic
//! contract, with lifecycle orchestration and persistent state.
//!
//! ## Architecture
//!
//! - [`format`]: the `TournamentFormat` contract (dispatched with
//!   `enum_dispatch`), the shared [`format::FormatCore`] bookkeeping, and the
//!   three format strategies
//! - [`bracket`]: the [`bracket::BracketManager`] facade mapping tournament
//!   ids to live format instances, plus the normalized bracket summary
//! - [`tournament`]: the [`tournament::TournamentManager`] lifecycle
//!   orchestrator (registration, start, result routing, cancellation)
//! - [`state`]: the [`state::TournamentStore`] persistence seam with
//!   in-memory and Postgres implementations, snapshots and career stats
//! - [`events`]: lifecycle events published through an injected sink
//!
//! The engine is reactive: it never drives timers or transports itself. The
//! embedding server starts matches, runs the races and delivers results.
//!
//! ## Example
//!
//! ```no_run
//! use race_brackets::events::LogSink;
//! use race_brackets::format::PlayerEntry;
//! use race_brackets::state::{MemoryStore, TournamentStateManager};
//! use race_brackets::tournament::{TournamentConfig, TournamentManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = Arc::new(TournamentStateManager::new(Arc::new(MemoryStore::new())));
//!     let manager = TournamentManager::new(state, Arc::new(LogSink));
//!
//!     let id = manager
//!         .create_tournament("Friday Night Cup", TournamentConfig::default())
//!         .await?;
//!     for i in 1..=4 {
//!         let player = PlayerEntry::new(format!("p{i}"), format!("Player {i}"));
//!         manager.register_player(id, player).await?;
//!     }
//!     manager.start_tournament(id).await?;
//!
//!     Ok(())
//! }
//! ```

/// Bracket orchestration: format registry and normalized summaries.
pub mod bracket;
pub use bracket::{BracketManager, BracketSummary};

/// Lifecycle events and sinks.
pub mod events;
pub use events::{EventSink, TournamentEvent};

/// Format strategies and the shared format contract.
pub mod format;
pub use format::{FormatKind, FormatName, PlayerEntry, RaceResult, TournamentFormat};

/// Persistent tournament state.
pub mod state;
pub use state::{MemoryStore, PostgresStore, TournamentStateManager, TournamentStore};

/// Tournament lifecycle orchestration.
pub mod tournament;
pub use tournament::{TournamentConfig, TournamentManager, TournamentStatus};
