//! Bracket orchestration layer.
//!
//! [`BracketManager`] maps tournament ids to live format instances and exposes
//! the format-agnostic operations the tournament lifecycle drives. Display
//! consumers get a normalized [`BracketSummary`] regardless of format.

pub mod manager;
pub mod summary;

pub use manager::{BracketManager, FormatBuilder};
pub use summary::{BracketSummary, MatchSummary, RoundSummary};
