use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Move};

/// Seven-tag-roster subset the analyzer persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameHeaders {
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>, // "1-0", "0-1", "1/2-1/2", "*"
    pub event: Option<String>,
    pub date: Option<String>,
    /// Starting position when the game declares `[SetUp "1"]`.
    pub fen: Option<String>,
}

/// One game unit read from a batch file, moves already validated against
/// the position they are played from.
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub headers: GameHeaders,
    pub start: Chess,
    pub moves: Vec<Move>,
}

impl ParsedGame {
    pub fn total_ply(&self) -> usize {
        self.moves.len()
    }
}
