//! Move submission codec.

use contrast_core::{Move, TileType};

use crate::coords::{format_coord, parse_coord, tile_from_char, tile_to_char};
use crate::ProtocolError;

/// A move as received off the wire, with the optional authoritative-state
/// hints the server uses for stale/duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireMove {
    pub mv: Move,
    pub game_id: Option<u64>,
    pub move_id: Option<u64>,
}

/// Parse `"<origin>,<target> <tile|-1> [game_id move_id]"`.
pub fn parse_move(text: &str) -> Result<WireMove, ProtocolError> {
    let mut tokens = text.split_whitespace();
    let displacement = tokens
        .next()
        .ok_or_else(|| ProtocolError::MalformedMove(text.to_string()))?;
    let tile_token = tokens
        .next()
        .ok_or_else(|| ProtocolError::MalformedMove(text.to_string()))?;
    let game_id = tokens.next().map(parse_id(text)).transpose()?;
    let move_id = tokens.next().map(parse_id(text)).transpose()?;
    if tokens.next().is_some() {
        return Err(ProtocolError::MalformedMove(text.to_string()));
    }

    let (origin, target) = displacement
        .split_once(',')
        .filter(|(a, b)| !a.contains(',') && !b.contains(','))
        .ok_or_else(|| ProtocolError::MalformedMove(text.to_string()))?;
    let (sx, sy) = parse_coord(origin)?;
    let (dx, dy) = parse_coord(target)?;

    let mut mv = Move::step(sx, sy, dx, dy);
    if tile_token != "-1" {
        let chars: Vec<char> = tile_token.to_ascii_lowercase().chars().collect();
        let [file, rank, color] = chars.as_slice() else {
            return Err(ProtocolError::InvalidTile(tile_token.to_string()));
        };
        let coord: String = [*file, *rank].iter().collect();
        let (tx, ty) = parse_coord(&coord)?;
        let tile = tile_from_char(*color);
        if tile == TileType::None {
            return Err(ProtocolError::InvalidTile(tile_token.to_string()));
        }
        mv = mv.with_placement(tx, ty, tile);
    }

    Ok(WireMove {
        mv,
        game_id,
        move_id,
    })
}

fn parse_id(text: &str) -> impl Fn(&str) -> Result<u64, ProtocolError> + '_ {
    move |token| {
        token
            .parse::<u64>()
            .map_err(|_| ProtocolError::MalformedMove(text.to_string()))
    }
}

/// Format a move in the id-less wire form, e.g. `a2,a3 -1` or `a2,a3 c3b`.
pub fn format_move(mv: &Move) -> String {
    let origin = format_coord(mv.sx, mv.sy);
    let target = format_coord(mv.dx, mv.dy);
    match mv.placement {
        Some(p) => format!("{origin},{target} {}{}", format_coord(p.x, p.y), tile_to_char(p.tile)),
        None => format!("{origin},{target} -1"),
    }
}
