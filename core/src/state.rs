//! Game state: board, tile inventories, side to move, repetition history.

use std::collections::HashMap;

use crate::board::Board;
use crate::moves::Move;
use crate::types::{Player, TileType};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Unplaced tiles a player still holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInventory {
    pub black: u32,
    pub gray: u32,
}

impl Default for TileInventory {
    fn default() -> Self {
        Self { black: 3, gray: 1 }
    }
}

/// Complete game position.
///
/// The state is only ever mutated through [`GameState::apply_move`], which
/// also records the resulting position hash in the repetition history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    board: Board,
    inv_black: TileInventory,
    inv_white: TileInventory,
    to_move: Player,
    history: HashMap<u64, u32>,
}

impl GameState {
    /// Fresh game: initial layout, Black to move, the initial position
    /// already counted once in the history.
    pub fn new() -> Self {
        let mut state = Self {
            board: Board::new(),
            inv_black: TileInventory::default(),
            inv_white: TileInventory::default(),
            to_move: Player::Black,
            history: HashMap::new(),
        };
        let hash = state.compute_hash();
        state.history.insert(hash, 1);
        state
    }

    /// State assembled from externally supplied parts, e.g. a wire
    /// snapshot. The repetition history is reseeded at this position.
    pub fn from_parts(
        board: Board,
        inv_black: TileInventory,
        inv_white: TileInventory,
        to_move: Player,
    ) -> Self {
        let mut state = Self {
            board,
            inv_black,
            inv_white,
            to_move,
            history: HashMap::new(),
        };
        let hash = state.compute_hash();
        state.history.insert(hash, 1);
        state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mutable board access for position tooling and tests. Regular play
    /// must go through `apply_move`.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn current_player(&self) -> Player {
        self.to_move
    }

    /// Copy of this state with the side to move overridden, leaving the
    /// original untouched. Used by evaluation-symmetry tooling.
    pub fn with_side_to_move(&self, player: Player) -> Self {
        let mut state = self.clone();
        state.to_move = player;
        state
    }

    pub fn inventory(&self, player: Player) -> &TileInventory {
        match player {
            Player::White => &self.inv_white,
            _ => &self.inv_black,
        }
    }

    pub fn inventory_mut(&mut self, player: Player) -> &mut TileInventory {
        match player {
            Player::White => &mut self.inv_white,
            _ => &mut self.inv_black,
        }
    }

    /// How often the current position has occurred, including right now.
    pub fn repetition_count(&self) -> u32 {
        self.history
            .get(&self.compute_hash())
            .copied()
            .unwrap_or(0)
    }

    /// Apply a move produced by the rules engine.
    ///
    /// Callers must only pass generated legal moves; out-of-bounds
    /// coordinates make this a no-op rather than a panic, and a placement
    /// whose cell is not empty-and-tileless after the piece move is
    /// silently dropped.
    pub fn apply_move(&mut self, mv: &Move) {
        if !self.board.in_bounds(mv.sx, mv.sy) || !self.board.in_bounds(mv.dx, mv.dy) {
            return;
        }
        let player = self.to_move;

        self.board.at_mut(mv.dx, mv.dy).occupant = self.board.at(mv.sx, mv.sy).occupant;
        self.board.at_mut(mv.sx, mv.sy).occupant = Player::None;

        if let Some(placement) = mv.placement {
            if self.board.in_bounds(placement.x, placement.y) {
                let cell = *self.board.at(placement.x, placement.y);
                let in_stock = {
                    let inv = self.inventory(player);
                    match placement.tile {
                        TileType::Black => inv.black > 0,
                        TileType::Gray => inv.gray > 0,
                        TileType::None => false,
                    }
                };
                if cell.tile == TileType::None && cell.occupant == Player::None && in_stock {
                    self.board.at_mut(placement.x, placement.y).tile = placement.tile;
                    let inv = self.inventory_mut(player);
                    match placement.tile {
                        TileType::Black => inv.black -= 1,
                        TileType::Gray => inv.gray -= 1,
                        TileType::None => {}
                    }
                }
            }
        }

        self.finish_move();
    }

    fn finish_move(&mut self) {
        self.to_move = self.to_move.opponent();
        let hash = self.compute_hash();
        *self.history.entry(hash).or_insert(0) += 1;
    }

    /// 64-bit FNV-1a fold over the 25 (occupant, tile) pairs plus the side
    /// to move.
    pub fn compute_hash(&self) -> u64 {
        let mut hash = FNV_OFFSET;
        let mut mix = |value: u64| {
            hash ^= value;
            hash = hash.wrapping_mul(FNV_PRIME);
        };
        for cell in self.board.cells() {
            mix(cell.occupant as u64);
            mix(cell.tile as u64);
        }
        mix(self.to_move as u64);
        hash
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TileType;

    #[test]
    fn initial_state() {
        let state = GameState::new();
        assert_eq!(state.current_player(), Player::Black);
        assert_eq!(*state.inventory(Player::Black), TileInventory { black: 3, gray: 1 });
        assert_eq!(*state.inventory(Player::White), TileInventory { black: 3, gray: 1 });
        assert_eq!(state.repetition_count(), 1);
    }

    #[test]
    fn apply_simple_move() {
        let mut state = GameState::new();
        state.apply_move(&Move::step(0, 0, 0, 1));

        assert_eq!(state.board().at(0, 0).occupant, Player::None);
        assert_eq!(state.board().at(0, 1).occupant, Player::Black);
        assert_eq!(state.current_player(), Player::White);
        assert_eq!(state.inventory(Player::Black).black, 3);
    }

    #[test]
    fn apply_move_with_placement_decrements_inventory() {
        let mut state = GameState::new();
        state.apply_move(&Move::step(0, 0, 0, 1).with_placement(2, 2, TileType::Black));

        assert_eq!(state.board().at(2, 2).tile, TileType::Black);
        assert_eq!(state.inventory(Player::Black).black, 2);
        assert_eq!(state.inventory(Player::Black).gray, 1);
    }

    #[test]
    fn placement_on_vacated_origin() {
        let mut state = GameState::new();
        state.apply_move(&Move::step(0, 0, 0, 1).with_placement(0, 0, TileType::Gray));

        assert_eq!(state.board().at(0, 0).tile, TileType::Gray);
        assert_eq!(state.inventory(Player::Black).gray, 0);
    }

    #[test]
    fn placement_on_occupied_cell_is_dropped() {
        let mut state = GameState::new();
        // (1,0) still holds a Black piece after the move, so no tile lands.
        state.apply_move(&Move::step(0, 0, 0, 1).with_placement(1, 0, TileType::Black));

        assert_eq!(state.board().at(1, 0).tile, TileType::None);
        assert_eq!(state.inventory(Player::Black).black, 3);
        // The side to move still flips.
        assert_eq!(state.current_player(), Player::White);
    }

    #[test]
    fn out_of_bounds_move_is_noop() {
        let mut state = GameState::new();
        let before = state.clone();
        state.apply_move(&Move::step(0, 0, 0, -1));
        assert_eq!(state, before);
    }

    #[test]
    fn hash_depends_on_side_to_move() {
        let state = GameState::new();
        let flipped = state.with_side_to_move(Player::White);
        assert_ne!(state.compute_hash(), flipped.compute_hash());
    }

    #[test]
    fn history_counts_repetitions() {
        let mut state = GameState::new();
        // Shuffle a Black piece out and back while White mirrors; the
        // initial position (Black to move) recurs each round trip.
        let cycle = [
            Move::step(0, 0, 0, 1),
            Move::step(0, 4, 0, 3),
            Move::step(0, 1, 0, 0),
            Move::step(0, 3, 0, 4),
        ];
        assert_eq!(state.repetition_count(), 1);
        for mv in &cycle {
            state.apply_move(mv);
        }
        assert_eq!(state.repetition_count(), 2);
        for mv in &cycle {
            state.apply_move(mv);
        }
        assert_eq!(state.repetition_count(), 3);
    }
}
