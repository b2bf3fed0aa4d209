//! PGN batch parsing built on `pgn-reader`.
//!
//! Every game in a batch is replayed while it is read, so an illegal or
//! ambiguous move surfaces as a [`PgnError`] instead of reaching the analyzer.

use std::io::Read;
use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::{fen::Fen, CastlingMode, Chess, Move, Position};
use thiserror::Error;

use crate::game_data::{GameHeaders, ParsedGame};

#[derive(Error, Debug)]
pub enum PgnError {
    #[error("I/O error while reading PGN: {0}")]
    Io(#[from] std::io::Error),

    #[error("game {game}: invalid FEN setup {fen:?}: {reason}")]
    InvalidSetup {
        game: usize,
        fen: String,
        reason: String,
    },

    #[error("game {game}: illegal move {san} at ply {ply}")]
    IllegalMove { game: usize, ply: usize, san: String },
}

struct Movetext {
    headers: GameHeaders,
    start: Chess,
    board: Chess,
    moves: Vec<Move>,
}

/// Visitor that turns each game into a [`ParsedGame`].
struct GameCollector {
    /// 1-based index of the game currently being read.
    game: usize,
}

impl GameCollector {
    fn starting_position(&self, headers: &GameHeaders) -> Result<Chess, PgnError> {
        let Some(fen) = headers.fen.as_deref() else {
            return Ok(Chess::default());
        };
        let invalid = |reason: String| PgnError::InvalidSetup {
            game: self.game,
            fen: fen.to_string(),
            reason,
        };
        let parsed: Fen = fen.parse().map_err(|e| invalid(format!("{e}")))?;
        parsed
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))
    }
}

impl Visitor for GameCollector {
    type Tags = GameHeaders;
    type Movetext = Movetext;
    type Output = Result<ParsedGame, PgnError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, GameHeaders> {
        self.game += 1;
        ControlFlow::Continue(GameHeaders::default())
    }

    fn tag(
        &mut self,
        tags: &mut GameHeaders,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy().into_owned();
        match name {
            b"White" => tags.white = Some(value),
            b"Black" => tags.black = Some(value),
            b"Result" => tags.result = Some(value),
            b"Event" => tags.event = Some(value),
            b"Date" => tags.date = Some(value),
            b"FEN" => tags.fen = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, headers: GameHeaders) -> ControlFlow<Self::Output, Movetext> {
        match self.starting_position(&headers) {
            Ok(start) => ControlFlow::Continue(Movetext {
                headers,
                board: start.clone(),
                start,
                moves: Vec::new(),
            }),
            Err(e) => ControlFlow::Break(Err(e)),
        }
    }

    fn begin_variation(&mut self, _state: &mut Movetext) -> ControlFlow<Self::Output, Skip> {
        // Mainline only
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, state: &mut Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        match san_plus.san.to_move(&state.board) {
            Ok(mv) => {
                state.board.play_unchecked(mv);
                state.moves.push(mv);
                ControlFlow::Continue(())
            }
            Err(_) => ControlFlow::Break(Err(PgnError::IllegalMove {
                game: self.game,
                ply: state.moves.len() + 1,
                san: san_plus.to_string(),
            })),
        }
    }

    fn end_game(&mut self, state: Movetext) -> Self::Output {
        Ok(ParsedGame {
            headers: state.headers,
            start: state.start,
            moves: state.moves,
        })
    }
}

/// Read every game from a PGN source, in file order.
///
/// Variations and comments are skipped; only the mainline is returned.
pub fn parse_games<R: Read>(source: R) -> Result<Vec<ParsedGame>, PgnError> {
    let mut reader = Reader::new(source);
    let mut collector = GameCollector { game: 0 };
    let mut games = Vec::new();

    while let Some(game) = reader.read_game(&mut collector)? {
        games.push(game?);
    }

    Ok(games)
}

/// Convenience wrapper over [`parse_games`] for in-memory PGN text.
pub fn parse_pgn_str(pgn: &str) -> Result<Vec<ParsedGame>, PgnError> {
    parse_games(pgn.as_bytes())
}
