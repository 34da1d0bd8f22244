//! Text wire protocol between the Contrast match server and its clients.
//!
//! Messages are single LF-terminated lines, except the multi-line `STATE`
//! block which is framed by `STATE` and `END`. Board coordinates are two
//! characters, file `a`..`e` and rank `1`..`5`; rank 1 is the bottom row
//! from the client's point of view and maps to internal y = 4.

pub mod coords;
pub mod message;
pub mod snapshot;

pub use coords::{
    format_coord, parse_coord, player_to_symbol, symbol_to_player, tile_from_char, tile_to_char,
};
pub use message::{format_move, parse_move, WireMove};
pub use snapshot::{render_board, GameStatus, StateSnapshot};

use thiserror::Error;

/// Parse failures for wire messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid board coordinate: {0}")]
    InvalidCoord(String),
    #[error("tile descriptor must look like c3b or -1, got {0}")]
    InvalidTile(String),
    #[error("move must look like 'a2,a3 <tile|-1> [game_id move_id]', got '{0}'")]
    MalformedMove(String),
    #[error("malformed entry in STATE payload: {0}")]
    MalformedState(String),
    #[error("unknown status: {0}")]
    UnknownStatus(String),
}
