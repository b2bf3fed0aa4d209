//! Core game analysis logic
//!
//! Replays a parsed game over its starting position, asks the oracle for one
//! evaluation per position and turns consecutive evaluations into per-move
//! loss records. Every value stored on a [`MoveRecord`] is from the mover's
//! point of view, so white and black moves are directly comparable.

use chess_core::{GameHeaders, ParsedGame};
use shakmaty::{san::SanPlus, Color, Position};
use tracing::debug;

use crate::analysis::{calculate_loss, classify_phase, severity, Phase, Severity};
use crate::error::WorkerError;
use crate::oracle::Oracle;

/// Game row written before its moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub total_ply: usize,
}

impl GameSummary {
    pub fn from_headers(headers: &GameHeaders, total_ply: usize) -> Self {
        Self {
            white: headers.white.clone(),
            black: headers.black.clone(),
            result: headers.result.clone(),
            total_ply,
        }
    }
}

/// One analyzed half-move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// 1-based ply number
    pub ply: usize,
    /// Standard algebraic notation, rendered against the pre-move position
    pub san: String,
    pub mover: Color,
    pub phase: Phase,
    /// Mover's POV, before the move
    pub eval_before: i32,
    /// Mover's POV, after the move
    pub eval_after: i32,
    pub loss: i32,
    pub severity: Severity,
}

impl MoveRecord {
    /// `w` or `b`
    pub fn color_code(&self) -> &'static str {
        match self.mover {
            Color::White => "w",
            Color::Black => "b",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameAnalysis {
    pub summary: GameSummary,
    pub moves: Vec<MoveRecord>,
}

/// Analyze a single game.
///
/// Issues exactly `total_ply + 1` oracle requests: the evaluation after move
/// `i` doubles as the evaluation before move `i + 1`.
pub async fn analyze_game<O: Oracle>(
    oracle: &mut O,
    game: &ParsedGame,
) -> Result<GameAnalysis, WorkerError> {
    let total_ply = game.total_ply();
    let summary = GameSummary::from_headers(&game.headers, total_ply);

    oracle.new_game().await?;

    let mut pos = game.start.clone();
    // The side to move at the start is the first mover.
    let mut eval_before = oracle.evaluate(&pos).await?.to_cp();
    let mut moves = Vec::with_capacity(total_ply);

    for (idx, mv) in game.moves.iter().enumerate() {
        let ply = idx + 1;
        let mover = pos.turn();
        let san = SanPlus::from_move_and_play_unchecked(&mut pos, *mv);

        // The opponent is to move now; negate into the mover's view.
        let opponent_eval = oracle.evaluate(&pos).await?.to_cp();
        let eval_after = -opponent_eval;
        let loss = calculate_loss(eval_before, eval_after);

        let record = MoveRecord {
            ply,
            san: san.to_string(),
            mover,
            phase: classify_phase(ply, total_ply),
            eval_before,
            eval_after,
            loss,
            severity: severity(loss),
        };
        debug!(
            ply,
            san = %record.san,
            eval_before,
            eval_after,
            loss,
            tag = %record.severity,
            "Move analyzed"
        );
        moves.push(record);

        // That same score is already in the next mover's view.
        eval_before = opponent_eval;
    }

    Ok(GameAnalysis { summary, moves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Score;
    use chess_core::parse_pgn_str;
    use shakmaty::Chess;
    use std::collections::VecDeque;

    /// Replays a fixed list of side-to-move scores and counts requests.
    struct Scripted {
        scores: VecDeque<Score>,
        calls: usize,
        new_games: usize,
    }

    impl Scripted {
        fn cp(values: &[i32]) -> Self {
            Self {
                scores: values.iter().map(|v| Score::Cp(*v)).collect(),
                calls: 0,
                new_games: 0,
            }
        }
    }

    impl Oracle for Scripted {
        async fn evaluate(&mut self, _position: &Chess) -> Result<Score, WorkerError> {
            self.calls += 1;
            self.scores
                .pop_front()
                .ok_or_else(|| WorkerError::Stockfish("script exhausted".into()))
        }

        async fn new_game(&mut self) -> Result<(), WorkerError> {
            self.new_games += 1;
            Ok(())
        }
    }

    fn game(pgn: &str) -> ParsedGame {
        parse_pgn_str(pgn).unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_reorients_black_reply_to_mover() {
        // +80 for white to move, then -20 for black to move (= +20 for white)
        let mut oracle = Scripted::cp(&[80, -20, 80]);
        let analysis = analyze_game(&mut oracle, &game("1. e4 e5 *")).await.unwrap();

        let white = &analysis.moves[0];
        assert_eq!(white.mover, Color::White);
        assert_eq!(white.eval_before, 80);
        assert_eq!(white.eval_after, 20);
        assert_eq!(white.loss, 60);
        assert_eq!(white.severity, Severity::Inaccuracy);

        let black = &analysis.moves[1];
        assert_eq!(black.mover, Color::Black);
        assert_eq!(black.eval_before, -20);
        assert_eq!(black.eval_after, -80);
        assert_eq!(black.loss, 60);
    }

    #[tokio::test]
    async fn test_one_request_per_position() {
        let mut oracle = Scripted::cp(&[20, -15, -200, -190, 50]);
        let analysis = analyze_game(&mut oracle, &game("1. e4 e5 2. Nf3 Nc6 *"))
            .await
            .unwrap();
        assert_eq!(oracle.calls, 5);
        assert_eq!(oracle.new_games, 1);
        assert_eq!(analysis.summary.total_ply, 4);

        let plies: Vec<usize> = analysis.moves.iter().map(|m| m.ply).collect();
        assert_eq!(plies, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_improving_move_has_zero_loss() {
        // white 0 -> white +300 after its own move
        let mut oracle = Scripted::cp(&[0, -300]);
        let analysis = analyze_game(&mut oracle, &game("1. e4 *")).await.unwrap();
        assert_eq!(analysis.moves[0].eval_after, 300);
        assert_eq!(analysis.moves[0].loss, 0);
        assert_eq!(analysis.moves[0].severity, Severity::Ok);
    }

    #[tokio::test]
    async fn test_mate_scores_saturate() {
        let mut oracle = Scripted {
            scores: VecDeque::from(vec![Score::Cp(0), Score::Mate(2)]),
            calls: 0,
            new_games: 0,
        };
        let analysis = analyze_game(&mut oracle, &game("1. f3 *")).await.unwrap();
        // black to move mates in 2: white lost everything
        assert_eq!(analysis.moves[0].eval_after, -10_000);
        assert_eq!(analysis.moves[0].loss, 10_000);
        assert_eq!(analysis.moves[0].severity, Severity::Blunder);
    }

    #[tokio::test]
    async fn test_san_rendering_with_suffixes() {
        let mut oracle = Scripted::cp(&[0; 9]);
        let analysis = analyze_game(
            &mut oracle,
            &game("1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0"),
        )
        .await
        .unwrap();

        let sans: Vec<&str> = analysis.moves.iter().map(|m| m.san.as_str()).collect();
        assert_eq!(sans, vec!["e4", "e5", "Qh5", "Nc6", "Bc4", "Nf6", "Qxf7#"]);
        assert_eq!(analysis.moves[6].color_code(), "w");
        assert_eq!(analysis.moves[5].color_code(), "b");
    }

    #[tokio::test]
    async fn test_oracle_failure_propagates() {
        let mut oracle = Scripted::cp(&[10, 10]);
        let result = analyze_game(&mut oracle, &game("1. e4 e5 2. d4 *")).await;
        assert!(matches!(result, Err(WorkerError::Stockfish(_))));
    }

    #[tokio::test]
    async fn test_empty_game_still_summarized() {
        let mut oracle = Scripted::cp(&[15]);
        let analysis = analyze_game(&mut oracle, &game("[White \"A\"]\n\n*")).await.unwrap();
        assert!(analysis.moves.is_empty());
        assert_eq!(analysis.summary.total_ply, 0);
        assert_eq!(analysis.summary.white.as_deref(), Some("A"));
        assert_eq!(oracle.calls, 1);
    }

    #[tokio::test]
    async fn test_phases_follow_ply() {
        let mut oracle = Scripted::cp(&[0; 12]);
        let pgn = "1. Nf3 Nf6 2. Ng1 Ng8 3. Nf3 Nf6 4. Ng1 Ng8 5. Nf3 Nf6 6. Ng1 *";
        let analysis = analyze_game(&mut oracle, &game(pgn)).await.unwrap();
        assert_eq!(analysis.moves[9].phase, Phase::Opening);
        // total 11: end starts at max(1, 22 - 12) = 10, so ply 11 is end
        assert_eq!(analysis.moves[10].phase, Phase::End);
    }
}
