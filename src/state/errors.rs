//! Persistence error taxonomy.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No snapshot stored for tournament {0}")]
    SnapshotNotFound(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;
