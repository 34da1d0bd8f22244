//! Coordinate and symbol mapping between the wire format and the core
//! board model.

use contrast_core::{Player, TileType, BOARD_H};

use crate::ProtocolError;

pub const FILES: [char; 5] = ['a', 'b', 'c', 'd', 'e'];
pub const RANKS: [char; 5] = ['1', '2', '3', '4', '5'];

/// Parse a two-character coordinate like `c2` into internal (x, y).
///
/// Ranks rise upward on the wire while y grows downward internally, so
/// rank 1 maps to y = 4.
pub fn parse_coord(text: &str) -> Result<(i32, i32), ProtocolError> {
    let lower = text.to_ascii_lowercase();
    let mut chars = lower.chars();
    let (file, rank) = match (chars.next(), chars.next(), chars.next()) {
        (Some(file), Some(rank), None) => (file, rank),
        _ => return Err(ProtocolError::InvalidCoord(text.to_string())),
    };
    let x = FILES
        .iter()
        .position(|&f| f == file)
        .ok_or_else(|| ProtocolError::InvalidCoord(text.to_string()))?;
    let rank_index = RANKS
        .iter()
        .position(|&r| r == rank)
        .ok_or_else(|| ProtocolError::InvalidCoord(text.to_string()))?;
    Ok((x as i32, BOARD_H - 1 - rank_index as i32))
}

/// Format internal (x, y) as a wire coordinate.
pub fn format_coord(x: i32, y: i32) -> String {
    let file = (b'a' + x as u8) as char;
    let rank = (b'1' + (BOARD_H - 1 - y) as u8) as char;
    format!("{file}{rank}")
}

pub fn player_to_symbol(player: Player) -> char {
    match player {
        Player::Black => 'X',
        Player::White => 'O',
        Player::None => '?',
    }
}

pub fn symbol_to_player(symbol: char) -> Player {
    match symbol.to_ascii_uppercase() {
        'X' => Player::Black,
        'O' => Player::White,
        _ => Player::None,
    }
}

pub fn tile_to_char(tile: TileType) -> char {
    match tile {
        TileType::Black => 'b',
        TileType::Gray => 'g',
        TileType::None => '-',
    }
}

pub fn tile_from_char(c: char) -> TileType {
    match c.to_ascii_lowercase() {
        'b' => TileType::Black,
        'g' => TileType::Gray,
        _ => TileType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_one_is_bottom_row() {
        assert_eq!(parse_coord("a1").unwrap(), (0, 4));
        assert_eq!(parse_coord("a5").unwrap(), (0, 0));
        assert_eq!(parse_coord("e3").unwrap(), (4, 2));
    }

    #[test]
    fn coords_round_trip() {
        for y in 0..5 {
            for x in 0..5 {
                let text = format_coord(x, y);
                assert_eq!(parse_coord(&text).unwrap(), (x, y));
            }
        }
    }

    #[test]
    fn parse_coord_is_case_insensitive() {
        assert_eq!(parse_coord("C2").unwrap(), parse_coord("c2").unwrap());
    }

    #[test]
    fn invalid_coords_are_rejected() {
        for text in ["", "a", "a12", "f1", "a6", "11"] {
            assert!(parse_coord(text).is_err(), "{text:?} should not parse");
        }
    }

    #[test]
    fn symbol_round_trip() {
        assert_eq!(symbol_to_player(player_to_symbol(Player::Black)), Player::Black);
        assert_eq!(symbol_to_player(player_to_symbol(Player::White)), Player::White);
        assert_eq!(symbol_to_player('x'), Player::Black);
        assert_eq!(symbol_to_player('?'), Player::None);
    }

    #[test]
    fn tile_round_trip() {
        assert_eq!(tile_from_char(tile_to_char(TileType::Black)), TileType::Black);
        assert_eq!(tile_from_char(tile_to_char(TileType::Gray)), TileType::Gray);
        assert_eq!(tile_from_char('z'), TileType::None);
    }
}
