//! Tournament lifecycle orchestration.
//!
//! [`TournamentManager`] drives the registration window, the start
//! transition, match result routing, completion and cancellation. Bracket
//! mechanics live in [`crate::bracket`], persistence in [`crate::state`].
//!
//! ## Example
//!
//! ```no_run
//! use race_brackets::events::LogSink;
//! use race_brackets::state::{MemoryStore, TournamentStateManager};
//! use race_brackets::tournament::{TournamentConfig, TournamentManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = Arc::new(TournamentStateManager::new(Arc::new(MemoryStore::new())));
//!     let manager = TournamentManager::new(state, Arc::new(LogSink));
//!
//!     let tournament_id = manager
//!         .create_tournament("Friday Night Cup", TournamentConfig::default())
//!         .await?;
//!     println!("Created tournament: {tournament_id}");
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{TournamentError, TournamentResult};
pub use manager::TournamentManager;
pub use models::{
    MAX_PLAYER_BOUND, MIN_PLAYER_BOUND, Tournament, TournamentConfig, TournamentStats,
    TournamentStatus,
};
