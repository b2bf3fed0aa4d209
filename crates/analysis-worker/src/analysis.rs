//! Move classification: pure functions only
//! (No Board/Engine/Database dependencies)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity thresholds (centipawn loss, inclusive lower bounds)
const THRESHOLD_INACCURACY: i32 = 50;
const THRESHOLD_MISTAKE: i32 = 100;
const THRESHOLD_BLUNDER: i32 = 300;

/// Last ply that still counts as opening
const OPENING_LAST_PLY: usize = 10;

/// Offset used by the end-game boundary `total_ply * 2 - 12`
const ENDGAME_OFFSET: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Opening,
    Middle,
    End,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::Middle => "middle",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Inaccuracy => "inaccuracy",
            Severity::Mistake => "mistake",
            Severity::Blunder => "blunder",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game phase of a 1-based ply.
///
/// The end-game boundary doubles `total_ply` even though both arguments are
/// already half-moves. Stored data depends on this exact formula.
pub fn classify_phase(ply: usize, total_ply: usize) -> Phase {
    if ply <= OPENING_LAST_PLY {
        return Phase::Opening;
    }
    let end_start = (total_ply as i64 * 2 - ENDGAME_OFFSET).max(1);
    if ply as i64 >= end_start {
        Phase::End
    } else {
        Phase::Middle
    }
}

/// Severity of a non-negative centipawn loss. Highest threshold wins.
pub fn severity(loss: i32) -> Severity {
    if loss >= THRESHOLD_BLUNDER {
        Severity::Blunder
    } else if loss >= THRESHOLD_MISTAKE {
        Severity::Mistake
    } else if loss >= THRESHOLD_INACCURACY {
        Severity::Inaccuracy
    } else {
        Severity::Ok
    }
}

/// Loss from the mover's point of view; an improving move loses nothing.
pub fn calculate_loss(eval_before: i32, eval_after: i32) -> i32 {
    eval_before.saturating_sub(eval_after).max(0)
}
