//! Board symmetries.
//!
//! Only two symmetries exist: identity and the horizontal flip (x -> 4-x).
//! There is no vertical symmetry because the goal rows distinguish top from
//! bottom. Evaluators canonicalize before every lookup so mirrored
//! positions share weights.

use crate::board::Board;
use crate::types::{BOARD_H, BOARD_W};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    Identity,
    FlipH,
}

/// Apply a symmetry to a coordinate pair.
pub fn transform_coords(x: i32, y: i32, sym: Symmetry) -> (i32, i32) {
    match sym {
        Symmetry::Identity => (x, y),
        Symmetry::FlipH => (BOARD_W - 1 - x, y),
    }
}

/// The board image under a symmetry.
pub fn transform_board(board: &Board, sym: Symmetry) -> Board {
    match sym {
        Symmetry::Identity => board.clone(),
        Symmetry::FlipH => {
            let mut result = Board::empty();
            for y in 0..BOARD_H {
                for x in 0..BOARD_W {
                    *result.at_mut(x, y) = *board.at(BOARD_W - 1 - x, y);
                }
            }
            result
        }
    }
}

/// The symmetry whose image has the smaller cell hash, ties broken toward
/// identity.
pub fn canonical_symmetry(board: &Board) -> Symmetry {
    let original = cell_hash(board);
    let flipped = cell_hash(&transform_board(board, Symmetry::FlipH));
    if flipped < original {
        Symmetry::FlipH
    } else {
        Symmetry::Identity
    }
}

/// The canonical representative of the board's symmetry class.
pub fn canonical_board(board: &Board) -> Board {
    transform_board(board, canonical_symmetry(board))
}

/// Base-9 fold of (occupant, tile) per cell, wrapping on overflow.
fn cell_hash(board: &Board) -> u64 {
    let mut hash: u64 = 0;
    for cell in board.cells() {
        let digit = cell.occupant as u64 * 3 + cell.tile as u64;
        hash = hash.wrapping_mul(9).wrapping_add(digit);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Player, TileType};

    #[test]
    fn flip_is_involutive() {
        let mut board = Board::new();
        board.at_mut(1, 2).occupant = Player::Black;
        board.at_mut(3, 3).tile = TileType::Gray;

        let twice = transform_board(&transform_board(&board, Symmetry::FlipH), Symmetry::FlipH);
        assert_eq!(board, twice);
    }

    #[test]
    fn flip_moves_cells() {
        let mut board = Board::empty();
        board.at_mut(0, 2).occupant = Player::White;

        let flipped = transform_board(&board, Symmetry::FlipH);
        assert_eq!(flipped.at(4, 2).occupant, Player::White);
        assert_eq!(flipped.at(0, 2).occupant, Player::None);
    }

    #[test]
    fn symmetric_board_canonicalizes_to_identity() {
        // The initial position is mirror symmetric, so ties go to identity.
        let board = Board::new();
        assert_eq!(canonical_symmetry(&board), Symmetry::Identity);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let mut board = Board::new();
        board.at_mut(4, 1).occupant = Player::Black;
        board.at_mut(0, 3).tile = TileType::Black;

        let canonical = canonical_board(&board);
        assert_eq!(canonical_board(&canonical), canonical);
    }

    #[test]
    fn mirror_images_share_a_canonical_form() {
        let mut board = Board::empty();
        board.at_mut(1, 1).occupant = Player::Black;
        board.at_mut(2, 3).tile = TileType::Gray;

        let mirrored = transform_board(&board, Symmetry::FlipH);
        assert_eq!(canonical_board(&board), canonical_board(&mirrored));
    }

    #[test]
    fn transform_coords_flip() {
        assert_eq!(transform_coords(0, 2, Symmetry::FlipH), (4, 2));
        assert_eq!(transform_coords(2, 2, Symmetry::FlipH), (2, 2));
        assert_eq!(transform_coords(3, 1, Symmetry::Identity), (3, 1));
    }
}
