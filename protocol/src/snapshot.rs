//! The authoritative STATE block and its conversions to and from the core
//! game state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use contrast_core::{Board, GameState, Player, TileInventory, TileType};

use crate::coords::{
    format_coord, parse_coord, player_to_symbol, symbol_to_player, tile_from_char, tile_to_char,
    FILES, RANKS,
};
use crate::ProtocolError;

/// Game status as published in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    Ongoing,
    XWin,
    OWin,
    Draw,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        self != GameStatus::Ongoing
    }

    /// Winner label used in stats and result logs.
    pub fn winner_label(self) -> Option<&'static str> {
        match self {
            GameStatus::XWin => Some("X"),
            GameStatus::OWin => Some("O"),
            GameStatus::Draw => Some("Draw"),
            GameStatus::Ongoing => None,
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GameStatus::Ongoing => "ongoing",
            GameStatus::XWin => "X_win",
            GameStatus::OWin => "O_win",
            GameStatus::Draw => "draw",
        };
        f.write_str(text)
    }
}

impl FromStr for GameStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(GameStatus::Ongoing),
            "X_win" => Ok(GameStatus::XWin),
            "O_win" => Ok(GameStatus::OWin),
            "draw" => Ok(GameStatus::Draw),
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }
}

/// One authoritative snapshot of the match as sent in a STATE block.
///
/// Maps are ordered so that snapshots serialize deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    pub game_id: u64,
    pub turn: char,
    pub status: GameStatus,
    pub last_move: String,
    pub pieces: BTreeMap<String, char>,
    pub tiles: BTreeMap<String, char>,
    pub stock_black: BTreeMap<char, u32>,
    pub stock_gray: BTreeMap<char, u32>,
}

impl StateSnapshot {
    /// Snapshot of a live game state.
    pub fn from_state(
        state: &GameState,
        game_id: u64,
        status: GameStatus,
        last_move: &str,
    ) -> Self {
        let mut snapshot = StateSnapshot {
            game_id,
            turn: player_to_symbol(state.current_player()),
            status,
            last_move: last_move.to_string(),
            ..Default::default()
        };

        let board = state.board();
        for y in 0..board.height() {
            for x in 0..board.width() {
                let cell = board.at(x, y);
                let coord = format_coord(x, y);
                if cell.occupant != Player::None {
                    snapshot
                        .pieces
                        .insert(coord.clone(), player_to_symbol(cell.occupant));
                }
                if cell.tile != TileType::None {
                    snapshot.tiles.insert(coord, tile_to_char(cell.tile));
                }
            }
        }

        let inv_x = state.inventory(Player::Black);
        let inv_o = state.inventory(Player::White);
        snapshot.stock_black = BTreeMap::from([('X', inv_x.black), ('O', inv_o.black)]);
        snapshot.stock_gray = BTreeMap::from([('X', inv_x.gray), ('O', inv_o.gray)]);
        snapshot
    }

    /// Rebuild a playable state from this snapshot: board, inventories and
    /// side to move, with the repetition history reseeded here.
    pub fn to_state(&self) -> Result<GameState, ProtocolError> {
        let mut board = Board::empty();
        for (coord, &symbol) in &self.pieces {
            let (x, y) = parse_coord(coord)?;
            board.at_mut(x, y).occupant = symbol_to_player(symbol);
        }
        for (coord, &tile) in &self.tiles {
            let (x, y) = parse_coord(coord)?;
            board.at_mut(x, y).tile = tile_from_char(tile);
        }

        let stock = |map: &BTreeMap<char, u32>, key| map.get(&key).copied().unwrap_or(0);
        let inv_black = TileInventory {
            black: stock(&self.stock_black, 'X'),
            gray: stock(&self.stock_gray, 'X'),
        };
        let inv_white = TileInventory {
            black: stock(&self.stock_black, 'O'),
            gray: stock(&self.stock_gray, 'O'),
        };

        let to_move = match symbol_to_player(self.turn) {
            Player::None => Player::Black,
            player => player,
        };
        Ok(GameState::from_parts(board, inv_black, inv_white, to_move))
    }

    /// Serialize as a STATE block, terminated by `END`.
    pub fn build_message(&self) -> String {
        let mut out = String::from("STATE\n");
        out.push_str(&format!("game_id={}\n", self.game_id));
        out.push_str(&format!("turn={}\n", self.turn));
        out.push_str(&format!("status={}\n", self.status));
        out.push_str(&format!("last={}\n", self.last_move));
        out.push_str(&format!("pieces={}\n", join_entries(&self.pieces)));
        out.push_str(&format!("tiles={}\n", join_entries(&self.tiles)));
        out.push_str(&format!("stock_b={}\n", join_counts(&self.stock_black)));
        out.push_str(&format!("stock_g={}\n", join_counts(&self.stock_gray)));
        out.push_str("END\n");
        out
    }

    /// Parse the `key=value` lines between `STATE` and `END`.
    pub fn parse_block<S: AsRef<str>>(lines: &[S]) -> Result<Self, ProtocolError> {
        let mut snapshot = StateSnapshot {
            turn: 'X',
            ..Default::default()
        };
        for line in lines {
            let line = line.as_ref();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "game_id" => {
                    snapshot.game_id = value
                        .parse()
                        .map_err(|_| ProtocolError::MalformedState(line.to_string()))?;
                }
                "turn" => {
                    if let Some(symbol) = value.chars().next() {
                        snapshot.turn = symbol;
                    }
                }
                "status" => snapshot.status = value.parse()?,
                "last" => snapshot.last_move = value.to_string(),
                "pieces" => snapshot.pieces = parse_entries(value)?,
                "tiles" => snapshot.tiles = parse_entries(value)?,
                "stock_b" => snapshot.stock_black = parse_counts(value)?,
                "stock_g" => snapshot.stock_gray = parse_counts(value)?,
                _ => {}
            }
        }
        Ok(snapshot)
    }
}

fn join_entries(entries: &BTreeMap<String, char>) -> String {
    entries
        .iter()
        .map(|(coord, value)| format!("{coord}:{value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn join_counts(counts: &BTreeMap<char, u32>) -> String {
    counts
        .iter()
        .map(|(player, value)| format!("{player}:{value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_entries(text: &str) -> Result<BTreeMap<String, char>, ProtocolError> {
    let mut entries = BTreeMap::new();
    for item in text.split(',').filter(|s| !s.is_empty()) {
        let (coord, value) = item
            .split_once(':')
            .filter(|(_, v)| !v.is_empty())
            .ok_or_else(|| ProtocolError::MalformedState(item.to_string()))?;
        parse_coord(coord)?;
        let symbol = value
            .chars()
            .next()
            .ok_or_else(|| ProtocolError::MalformedState(item.to_string()))?;
        entries.insert(coord.to_ascii_lowercase(), symbol);
    }
    Ok(entries)
}

fn parse_counts(text: &str) -> Result<BTreeMap<char, u32>, ProtocolError> {
    let mut counts = BTreeMap::new();
    for item in text.split(',').filter(|s| !s.is_empty()) {
        let (player, value) = item
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedState(item.to_string()))?;
        let player = player
            .chars()
            .next()
            .ok_or_else(|| ProtocolError::MalformedState(item.to_string()))?;
        let value = value
            .parse()
            .map_err(|_| ProtocolError::MalformedState(item.to_string()))?;
        counts.insert(player, value);
    }
    Ok(counts)
}

/// Render the snapshot's board with rank 5 at the top. Pieces show as
/// their symbol, black tiles as `[]`, gray tiles as `()`.
pub fn render_board(snapshot: &StateSnapshot) -> String {
    let mut out = String::new();
    for &rank in RANKS.iter().rev() {
        out.push(rank);
        out.push('|');
        for &file in &FILES {
            let coord: String = [file, rank].iter().collect();
            if let Some(&piece) = snapshot.pieces.get(&coord) {
                out.push_str(&format!(" {piece} "));
            } else if let Some(&tile) = snapshot.tiles.get(&coord) {
                match tile.to_ascii_lowercase() {
                    'b' => out.push_str(" []"),
                    'g' => out.push_str(" ()"),
                    other => out.push_str(&format!(" [{}]", other.to_ascii_uppercase())),
                }
            } else {
                out.push_str("  .");
            }
        }
        out.push_str(" |\n");
    }
    out.push_str("   ");
    for &file in &FILES {
        out.push_str(&format!(" {file} "));
    }
    out
}
