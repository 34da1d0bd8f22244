//! N-tuple patterns: fixed sets of board cells whose joint contents index a
//! weight table.

use contrast_core::{Board, Cell, Player};

/// A local pattern over up to 25 cell positions, linearized as y*5+x.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    cells: Vec<usize>,
}

impl Pattern {
    /// Pattern over the given cell indices. Indices must lie on the board.
    pub fn new(cells: &[usize]) -> Self {
        debug_assert!(cells.iter().all(|&c| c < 25));
        Self {
            cells: cells.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Number of distinct states for the given per-cell alphabet size,
    /// which is the required weight-table length.
    pub fn num_states(&self, alphabet: usize) -> usize {
        alphabet.pow(self.cells.len() as u32)
    }

    /// Index over the piece field: base-3 fold of Empty/Mine/Opponent from
    /// the viewpoint of `player`.
    pub fn piece_index(&self, board: &Board, player: Player) -> usize {
        self.fold(board, 3, |cell| encode_piece(cell, player))
    }

    /// Index over the tile field: base-3 fold of None/Black/Gray.
    pub fn tile_index(&self, board: &Board) -> usize {
        self.fold(board, 3, encode_tile)
    }

    /// Index over the combined piece-and-tile field: base-9 fold.
    pub fn combined_index(&self, board: &Board, player: Player) -> usize {
        self.fold(board, 9, |cell| encode_piece(cell, player) * 3 + encode_tile(cell))
    }

    fn fold(&self, board: &Board, base: usize, encode: impl Fn(&Cell) -> usize) -> usize {
        let mut index = 0;
        for &cell_idx in &self.cells {
            let x = (cell_idx % 5) as i32;
            let y = (cell_idx / 5) as i32;
            index = index * base + encode(board.at(x, y));
        }
        index
    }
}

/// Piece digit from the mover's viewpoint: 0 empty, 1 mine, 2 opponent.
fn encode_piece(cell: &Cell, player: Player) -> usize {
    if cell.occupant == Player::None {
        0
    } else if cell.occupant == player {
        1
    } else {
        2
    }
}

/// Tile digit: 0 none, 1 black, 2 gray.
fn encode_tile(cell: &Cell) -> usize {
    cell.tile as usize
}

/// The sixteen default patterns: four horizontal 5x2 strips, three vertical
/// 5x2 strips, six overlapping 3x3 squares, and three mixed T/diagonal
/// nine-cell shapes.
///
/// Cell numbering:
/// ```text
///  0  1  2  3  4
///  5  6  7  8  9
/// 10 11 12 13 14
/// 15 16 17 18 19
/// 20 21 22 23 24
/// ```
pub fn default_patterns() -> Vec<Pattern> {
    const SHAPES: [&[usize]; 16] = [
        // horizontal 5x2 strips
        &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
        &[5, 6, 7, 8, 9, 10, 11, 12, 13, 14],
        &[10, 11, 12, 13, 14, 15, 16, 17, 18, 19],
        &[15, 16, 17, 18, 19, 20, 21, 22, 23, 24],
        // vertical 5x2 strips
        &[0, 5, 10, 15, 20, 1, 6, 11, 16, 21],
        &[1, 6, 11, 16, 21, 2, 7, 12, 17, 22],
        &[2, 7, 12, 17, 22, 3, 8, 13, 18, 23],
        // overlapping 3x3 squares
        &[0, 1, 2, 5, 6, 7, 10, 11, 12],
        &[1, 2, 3, 6, 7, 8, 11, 12, 13],
        &[5, 6, 7, 10, 11, 12, 15, 16, 17],
        &[6, 7, 8, 11, 12, 13, 16, 17, 18],
        &[10, 11, 12, 15, 16, 17, 20, 21, 22],
        &[11, 12, 13, 16, 17, 18, 21, 22, 23],
        // T and diagonal shapes
        &[0, 1, 2, 3, 4, 5, 10, 15, 20],
        &[0, 1, 2, 3, 4, 6, 11, 16, 21],
        &[0, 1, 2, 3, 4, 7, 12, 17, 22],
    ];
    SHAPES.iter().map(|cells| Pattern::new(cells)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contrast_core::{GameState, TileType};

    #[test]
    fn default_pattern_set_shape() {
        let patterns = default_patterns();
        assert_eq!(patterns.len(), 16);
        assert_eq!(patterns.iter().filter(|p| p.len() == 10).count(), 7);
        assert_eq!(patterns.iter().filter(|p| p.len() == 9).count(), 9);
    }

    #[test]
    fn num_states() {
        let pattern = Pattern::new(&[0, 1, 2]);
        assert_eq!(pattern.num_states(3), 27);
        assert_eq!(pattern.num_states(9), 729);
    }

    #[test]
    fn empty_board_indexes_to_zero() {
        let board = contrast_core::Board::empty();
        let pattern = Pattern::new(&[0, 6, 12, 18, 24]);
        assert_eq!(pattern.piece_index(&board, Player::Black), 0);
        assert_eq!(pattern.tile_index(&board), 0);
        assert_eq!(pattern.combined_index(&board, Player::Black), 0);
    }

    #[test]
    fn piece_index_is_viewpoint_relative() {
        let state = GameState::new();
        let pattern = Pattern::new(&[0, 20]);
        // Cell 0 is Black, cell 20 is White.
        let black_view = pattern.piece_index(state.board(), Player::Black);
        let white_view = pattern.piece_index(state.board(), Player::White);
        assert_eq!(black_view, 1 * 3 + 2);
        assert_eq!(white_view, 2 * 3 + 1);
    }

    #[test]
    fn tile_index_ignores_viewpoint() {
        let mut state = GameState::new();
        state.board_mut().at_mut(2, 2).tile = TileType::Gray;
        let pattern = Pattern::new(&[12]);
        assert_eq!(pattern.tile_index(state.board()), 2);
    }

    #[test]
    fn combined_index_mixes_fields() {
        let mut state = GameState::new();
        state.board_mut().at_mut(0, 0).tile = TileType::Black;
        let pattern = Pattern::new(&[0]);
        // Mine (1) * 3 + black tile (1) = 4.
        assert_eq!(pattern.combined_index(state.board(), Player::Black), 4);
    }
}
