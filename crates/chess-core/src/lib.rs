pub mod game_data;
pub mod pgn;

pub use game_data::{GameHeaders, ParsedGame};
pub use pgn::{parse_games, parse_pgn_str, PgnError};
