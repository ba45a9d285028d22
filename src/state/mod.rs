//! Persistent tournament state.
//!
//! [`TournamentStore`] is the persistence seam with two implementations:
//! [`MemoryStore`] for tests and ephemeral deployments, [`PostgresStore`] for
//! durable ones. [`TournamentStateManager`] sits on top with a write-through
//! cache, a dirty set and a periodic autosave task.

pub mod errors;
pub mod manager;
pub mod models;
pub mod postgres;
pub mod store;

pub use errors::{StoreError, StoreResult};
pub use manager::TournamentStateManager;
pub use models::{MatchRecord, PlayerCareerStats, SNAPSHOT_VERSION, TournamentSnapshot};
pub use postgres::PostgresStore;
pub use store::{MemoryStore, TournamentStore};
