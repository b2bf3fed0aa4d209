//! Move-quality analysis worker
//!
//! Replays PGN games against a UCI engine, scores every half-move from the
//! mover's point of view and persists the results one batch file at a time.

pub mod analysis;
pub mod analyzer;
pub mod config;
pub mod db;
pub mod error;
pub mod intake;
pub mod oracle;
pub mod stockfish;

pub use analyzer::{analyze_game, GameAnalysis, GameSummary, MoveRecord};
pub use error::WorkerError;
