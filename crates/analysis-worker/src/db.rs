//! Persistence sink: games and moves, one transaction per batch file

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::analyzer::{GameAnalysis, GameSummary, MoveRecord};
use crate::error::WorkerError;

/// Identity of one batch file: its name plus a SHA-256 of its bytes.
///
/// A later file that reuses a name but carries different games is a new batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchKey {
    pub source_file: String,
    pub digest: String,
}

impl BatchKey {
    pub fn new(source_file: &str, contents: &[u8]) -> Self {
        Self {
            source_file: source_file.to_string(),
            digest: format!("{:x}", Sha256::digest(contents)),
        }
    }
}

/// Write side of one batch. Nothing is visible to readers until [`commit`].
///
/// Dropping a batch without committing discards every staged row.
///
/// [`commit`]: GameSink::commit
#[allow(async_fn_in_trait)]
pub trait GameSink {
    async fn insert_game(&mut self, summary: &GameSummary) -> Result<i64, WorkerError>;

    async fn insert_move(&mut self, game_id: i64, record: &MoveRecord) -> Result<(), WorkerError>;

    async fn commit(self) -> Result<(), WorkerError>;
}

/// Opens a [`GameSink`] per batch file.
#[allow(async_fn_in_trait)]
pub trait Store {
    type Batch: GameSink;

    async fn begin(&self, batch: &BatchKey) -> Result<Self::Batch, WorkerError>;

    /// Whether this exact batch has already been committed.
    async fn is_committed(&self, batch: &BatchKey) -> Result<bool, WorkerError>;
}

/// Game row first, then its moves in ply order.
pub async fn store_game<S: GameSink>(
    sink: &mut S,
    analysis: &GameAnalysis,
) -> Result<i64, WorkerError> {
    let game_id = sink.insert_game(&analysis.summary).await?;
    for record in &analysis.moves {
        sink.insert_move(game_id, record).await?;
    }
    Ok(game_id)
}

/// Aggregates scraped by the metrics surface
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub games: i64,
    pub moves: i64,
    pub blunders: i64,
    pub avg_loss: f64,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PgBatch {
    tx: Transaction<'static, Postgres>,
    key: BatchKey,
}

impl Store for PgStore {
    type Batch = PgBatch;

    async fn begin(&self, batch: &BatchKey) -> Result<PgBatch, WorkerError> {
        Ok(PgBatch {
            tx: self.pool.begin().await?,
            key: batch.clone(),
        })
    }

    async fn is_committed(&self, batch: &BatchKey) -> Result<bool, WorkerError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM games WHERE source_file = $1 AND batch_digest = $2
            )",
        )
        .bind(&batch.source_file)
        .bind(&batch.digest)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

impl GameSink for PgBatch {
    async fn insert_game(&mut self, summary: &GameSummary) -> Result<i64, WorkerError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO games (source_file, batch_digest, white, black, result, total_ply)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&self.key.source_file)
        .bind(&self.key.digest)
        .bind(summary.white.as_deref())
        .bind(summary.black.as_deref())
        .bind(summary.result.as_deref())
        .bind(summary.total_ply as i32)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_move(&mut self, game_id: i64, record: &MoveRecord) -> Result<(), WorkerError> {
        sqlx::query(
            r#"INSERT INTO moves (
                game_id, ply, san, color, phase, eval_before, eval_after, loss, tag
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(game_id)
        .bind(record.ply as i32)
        .bind(&record.san)
        .bind(record.color_code())
        .bind(record.phase.as_str())
        .bind(record.eval_before)
        .bind(record.eval_after)
        .bind(record.loss)
        .bind(record.severity.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), WorkerError> {
        self.tx.commit().await?;
        Ok(())
    }
}

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(database_url)
        .await
}

/// Apply the schema. Safe to run on every start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

/// Totals across everything committed so far
pub async fn fetch_stats(pool: &PgPool) -> Result<Stats, sqlx::Error> {
    let games: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM games")
        .fetch_one(pool)
        .await?;

    let (moves, blunders, avg_loss): (i64, i64, f64) = sqlx::query_as(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE tag = 'blunder'),
                COALESCE(AVG(loss), 0)::DOUBLE PRECISION
         FROM moves",
    )
    .fetch_one(pool)
    .await?;

    Ok(Stats {
        games,
        moves,
        blunders,
        avg_loss,
    })
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    id          BIGSERIAL PRIMARY KEY,
    source_file TEXT,
    batch_digest TEXT,
    white       TEXT,
    black       TEXT,
    result      TEXT,
    total_ply   INTEGER NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS moves (
    id          BIGSERIAL PRIMARY KEY,
    game_id     BIGINT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    ply         INTEGER NOT NULL,
    san         TEXT NOT NULL,
    color       CHAR(1) NOT NULL,
    phase       TEXT NOT NULL,
    eval_before INTEGER NOT NULL,
    eval_after  INTEGER NOT NULL,
    loss        INTEGER NOT NULL CHECK (loss >= 0),
    tag         TEXT NOT NULL,
    UNIQUE (game_id, ply)
);

ALTER TABLE games ADD COLUMN IF NOT EXISTS batch_digest TEXT;

CREATE INDEX IF NOT EXISTS idx_games_batch ON games (source_file, batch_digest);
CREATE INDEX IF NOT EXISTS idx_moves_game_id ON moves (game_id);
CREATE INDEX IF NOT EXISTS idx_moves_tag     ON moves (tag);
"#;
