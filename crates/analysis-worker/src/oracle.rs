//! Evaluation oracle contract.

use shakmaty::Chess;

use crate::error::WorkerError;

/// Centipawn value a detected forced mate saturates to.
pub const MATE_SCORE: i32 = 10_000;

/// Raw engine verdict, always from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Cp(i32),
    /// Mate in N. Positive: the side to move mates. Zero or negative: it gets mated.
    Mate(i32),
}

impl Score {
    /// Collapse to centipawns, mapping mates to `±MATE_SCORE`.
    pub fn to_cp(self) -> i32 {
        match self {
            Score::Cp(cp) => cp.clamp(-MATE_SCORE, MATE_SCORE),
            Score::Mate(n) if n > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }
}

/// Position evaluator consulted by the analyzer, one request at a time.
#[allow(async_fn_in_trait)]
pub trait Oracle {
    /// Evaluate `position` from the side to move's point of view.
    async fn evaluate(&mut self, position: &Chess) -> Result<Score, WorkerError>;

    /// Reset per-game engine state. No-op unless the engine keeps any.
    async fn new_game(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Release the engine after a successful run. Dropping also releases it.
    async fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Acquires a fresh [`Oracle`] for each file-processing run.
#[allow(async_fn_in_trait)]
pub trait OracleFactory {
    type Oracle: Oracle;

    async fn open(&self) -> Result<Self::Oracle, WorkerError>;
}
