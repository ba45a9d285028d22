//! PostgreSQL implementation of [`TournamentStore`].
//!
//! Snapshots and career stats are stored as JSONB documents keyed by id, with
//! the status duplicated into a plain column so `load_active` can filter
//! without deserializing every row. Match records get their own append table.

use super::errors::StoreResult;
use super::models::{MatchRecord, PlayerCareerStats, TournamentSnapshot};
use super::store::TournamentStore;
use crate::format::TournamentId;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tournament_snapshots (
    tournament_id UUID PRIMARY KEY,
    status TEXT NOT NULL,
    snapshot JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS tournament_matches (
    id BIGSERIAL PRIMARY KEY,
    tournament_id UUID NOT NULL,
    match_id TEXT NOT NULL,
    record JSONB NOT NULL,
    completed_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tournament_matches_tournament
    ON tournament_matches (tournament_id, id);

CREATE TABLE IF NOT EXISTS player_career_stats (
    participant_id TEXT PRIMARY KEY,
    stats JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TournamentStore for PostgresStore {
    async fn save_snapshot(&self, snapshot: &TournamentSnapshot) -> StoreResult<()> {
        let body = serde_json::to_value(snapshot)?;
        let status = serde_json::to_value(snapshot.status)?
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        sqlx::query(
            "INSERT INTO tournament_snapshots (tournament_id, status, snapshot, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (tournament_id)
             DO UPDATE SET status = $2, snapshot = $3, updated_at = NOW()",
        )
        .bind(snapshot.tournament_id)
        .bind(status)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_snapshot(&self, tournament_id: TournamentId) -> StoreResult<TournamentSnapshot> {
        let row = sqlx::query("SELECT snapshot FROM tournament_snapshots WHERE tournament_id = $1")
            .bind(tournament_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let body: serde_json::Value = r.get("snapshot");
                Ok(serde_json::from_value(body)?)
            }
            None => Err(super::errors::StoreError::SnapshotNotFound(tournament_id)),
        }
    }

    async fn load_active(&self) -> StoreResult<Vec<TournamentSnapshot>> {
        let rows = sqlx::query(
            "SELECT snapshot FROM tournament_snapshots
             WHERE status IN ('registration', 'active')
             ORDER BY updated_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            let body: serde_json::Value = row.get("snapshot");
            snapshots.push(serde_json::from_value(body)?);
        }
        Ok(snapshots)
    }

    async fn record_match(&self, record: &MatchRecord) -> StoreResult<()> {
        let body = serde_json::to_value(record)?;
        sqlx::query(
            "INSERT INTO tournament_matches (tournament_id, match_id, record, completed_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(record.tournament_id)
        .bind(&record.match_id)
        .bind(body)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn match_history(&self, tournament_id: TournamentId) -> StoreResult<Vec<MatchRecord>> {
        let rows = sqlx::query(
            "SELECT record FROM tournament_matches WHERE tournament_id = $1 ORDER BY id",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let body: serde_json::Value = row.get("record");
            records.push(serde_json::from_value(body)?);
        }
        Ok(records)
    }

    async fn load_player_stats(
        &self,
        participant_id: &str,
    ) -> StoreResult<Option<PlayerCareerStats>> {
        let row = sqlx::query("SELECT stats FROM player_career_stats WHERE participant_id = $1")
            .bind(participant_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let body: serde_json::Value = r.get("stats");
                Ok(Some(serde_json::from_value(body)?))
            }
            None => Ok(None),
        }
    }

    async fn save_player_stats(&self, stats: &PlayerCareerStats) -> StoreResult<()> {
        let body = serde_json::to_value(stats)?;
        sqlx::query(
            "INSERT INTO player_career_stats (participant_id, stats, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (participant_id)
             DO UPDATE SET stats = $2, updated_at = NOW()",
        )
        .bind(&stats.participant_id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
