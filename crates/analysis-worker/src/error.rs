//! Worker error types

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stockfish error: {0}")]
    Stockfish(String),

    #[error("Stockfish did not answer within {0:?}")]
    OracleTimeout(Duration),

    #[error("PGN parse error: {0}")]
    Parse(#[from] chess_core::PgnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}
