//! Pure move generation and terminal detection.

use crate::moves::Move;
use crate::state::GameState;
use crate::types::{Player, TileType};

const ORTHO: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAG: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ALL_8: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// All legal moves for the side to move.
///
/// Per piece, the direction set depends on the tile under it: none gives
/// the four orthogonal steps, a black tile the four diagonals, a gray tile
/// all eight king steps. An adjacent empty cell is a simple step; an
/// adjacent friendly piece starts a jump over the consecutive friendly run
/// to the first empty cell beyond it. Opponent pieces block, there is no
/// capture.
///
/// Every base move then fans out into placement variants: one per tile
/// color still in stock and per cell that has no tile, is not the move's
/// destination, and is empty once the piece has moved (the vacated origin
/// qualifies).
pub fn legal_moves(state: &GameState) -> Vec<Move> {
    let board = state.board();
    let player = state.current_player();

    let mut base_moves = Vec::new();
    for y in 0..board.height() {
        for x in 0..board.width() {
            if board.at(x, y).occupant != player {
                continue;
            }

            let dirs: &[(i32, i32)] = match board.at(x, y).tile {
                TileType::None => &ORTHO,
                TileType::Black => &DIAG,
                TileType::Gray => &ALL_8,
            };

            for &(dx, dy) in dirs {
                let (tx, ty) = (x + dx, y + dy);
                if !board.in_bounds(tx, ty) {
                    continue;
                }
                match board.at(tx, ty).occupant {
                    Player::None => base_moves.push(Move::step(x, y, tx, ty)),
                    occupant if occupant == player => {
                        // Jump over the friendly run; an opponent or the
                        // board edge past it blocks.
                        let (mut jx, mut jy) = (tx, ty);
                        while board.in_bounds(jx, jy) && board.at(jx, jy).occupant == player {
                            jx += dx;
                            jy += dy;
                        }
                        if board.in_bounds(jx, jy) && board.at(jx, jy).occupant == Player::None {
                            base_moves.push(Move::step(x, y, jx, jy));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let inv = state.inventory(player);
    let colors: &[TileType] = match (inv.black > 0, inv.gray > 0) {
        (true, true) => &[TileType::Black, TileType::Gray],
        (true, false) => &[TileType::Black],
        (false, true) => &[TileType::Gray],
        (false, false) => &[],
    };

    let mut out = Vec::with_capacity(base_moves.len() * (1 + colors.len() * 16));
    for base in &base_moves {
        out.push(*base);
        for &color in colors {
            for y in 0..board.height() {
                for x in 0..board.width() {
                    if board.at(x, y).tile != TileType::None {
                        continue;
                    }
                    if x == base.dx && y == base.dy {
                        continue;
                    }
                    let empty_after = board.at(x, y).occupant == Player::None
                        || (x == base.sx && y == base.sy);
                    if empty_after {
                        out.push(base.with_placement(x, y, color));
                    }
                }
            }
        }
    }

    out
}

/// Whether `player` has a piece on the opponent's home row.
pub fn is_win(state: &GameState, player: Player) -> bool {
    let board = state.board();
    let row = player.goal_row();
    (0..board.width()).any(|x| board.at(x, row).occupant == player)
}

/// The side to move loses when it has no legal moves.
pub fn is_loss(state: &GameState) -> bool {
    legal_moves(state).is_empty()
}

/// Draw by repetition: the current position has occurred at least four
/// times.
pub fn is_draw(state: &GameState) -> bool {
    state.repetition_count() >= 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::moves::Move;

    fn clear_pieces(state: &mut GameState) {
        *state.board_mut() = Board::empty();
    }

    #[test]
    fn initial_position_move_count() {
        // Each of the five Black pieces has exactly one legal base move
        // (straight forward; sideways steps are blocked by the friendly
        // run with no empty landing square). Fifteen cells are empty after
        // any of those moves and no tiles are down, so each base move fans
        // out into 1 + 15 + 15 variants.
        let state = GameState::new();
        let moves = legal_moves(&state);

        let base: Vec<_> = moves.iter().filter(|m| m.placement.is_none()).collect();
        assert_eq!(base.len(), 5);
        for mv in &base {
            assert_eq!(mv.dy, 1);
            assert_eq!(mv.dx, mv.sx);
        }
        assert_eq!(moves.len(), 5 * 31);
    }

    #[test]
    fn placement_sites_include_vacated_origin() {
        let state = GameState::new();
        let moves = legal_moves(&state);
        assert!(moves.iter().any(|m| {
            m.sx == 0
                && m.sy == 0
                && m.placement
                    .is_some_and(|p| p.x == 0 && p.y == 0 && p.tile == TileType::Black)
        }));
    }

    #[test]
    fn placement_never_targets_destination_or_tiled_cells() {
        let mut state = GameState::new();
        state.board_mut().at_mut(2, 2).tile = TileType::Gray;
        let moves = legal_moves(&state);
        for mv in &moves {
            if let Some(p) = mv.placement {
                assert!(!(p.x == mv.dx && p.y == mv.dy));
                assert!(!(p.x == 2 && p.y == 2));
            }
        }
    }

    #[test]
    fn black_tile_switches_to_diagonals() {
        let mut state = GameState::new();
        clear_pieces(&mut state);
        state.board_mut().at_mut(2, 2).occupant = Player::Black;
        state.board_mut().at_mut(2, 2).tile = TileType::Black;

        let base: Vec<_> = legal_moves(&state)
            .into_iter()
            .filter(|m| m.placement.is_none())
            .collect();
        assert_eq!(base.len(), 4);
        for mv in base {
            assert_eq!((mv.dx - mv.sx).abs(), 1);
            assert_eq!((mv.dy - mv.sy).abs(), 1);
        }
    }

    #[test]
    fn gray_tile_allows_all_eight_directions() {
        let mut state = GameState::new();
        clear_pieces(&mut state);
        state.board_mut().at_mut(2, 2).occupant = Player::Black;
        state.board_mut().at_mut(2, 2).tile = TileType::Gray;

        let base: Vec<_> = legal_moves(&state)
            .into_iter()
            .filter(|m| m.placement.is_none())
            .collect();
        assert_eq!(base.len(), 8);
    }

    #[test]
    fn jump_over_friendly_run() {
        let mut state = GameState::new();
        clear_pieces(&mut state);
        state.board_mut().at_mut(0, 2).occupant = Player::Black;
        state.board_mut().at_mut(1, 2).occupant = Player::Black;
        state.board_mut().at_mut(2, 2).occupant = Player::Black;

        let base: Vec<_> = legal_moves(&state)
            .into_iter()
            .filter(|m| m.placement.is_none())
            .collect();
        // The piece at (0,2) jumps the run to (3,2).
        assert!(base.contains(&Move::step(0, 2, 3, 2)));
    }

    #[test]
    fn opponent_blocks_jump() {
        let mut state = GameState::new();
        clear_pieces(&mut state);
        state.board_mut().at_mut(0, 2).occupant = Player::Black;
        state.board_mut().at_mut(1, 2).occupant = Player::Black;
        state.board_mut().at_mut(2, 2).occupant = Player::White;

        let base: Vec<_> = legal_moves(&state)
            .into_iter()
            .filter(|m| m.placement.is_none())
            .collect();
        assert!(!base.iter().any(|m| m.sx == 0 && m.sy == 2 && m.dx >= 2));
    }

    #[test]
    fn win_detection() {
        let mut state = GameState::new();
        clear_pieces(&mut state);
        state.board_mut().at_mut(2, 4).occupant = Player::Black;
        assert!(is_win(&state, Player::Black));
        assert!(!is_win(&state, Player::White));

        let mut state = GameState::new();
        clear_pieces(&mut state);
        state.board_mut().at_mut(3, 0).occupant = Player::White;
        assert!(is_win(&state, Player::White));
    }

    #[test]
    fn loss_when_no_moves() {
        let mut state = GameState::new();
        clear_pieces(&mut state);
        // Black's only piece is boxed into the corner by White pieces; the
        // diagonal escape is orthogonally unreachable without a tile.
        state.board_mut().at_mut(0, 0).occupant = Player::Black;
        state.board_mut().at_mut(1, 0).occupant = Player::White;
        state.board_mut().at_mut(0, 1).occupant = Player::White;
        assert!(is_loss(&state));
    }

    #[test]
    fn draw_after_fourfold_repetition() {
        let mut state = GameState::new();
        let cycle = [
            Move::step(0, 0, 0, 1),
            Move::step(0, 4, 0, 3),
            Move::step(0, 1, 0, 0),
            Move::step(0, 3, 0, 4),
        ];
        assert!(!is_draw(&state));
        for _ in 0..3 {
            for mv in &cycle {
                state.apply_move(mv);
            }
        }
        assert_eq!(state.repetition_count(), 4);
        assert!(is_draw(&state));
    }

    #[test]
    fn moves_applied_keep_invariants() {
        let mut state = GameState::new();
        for _ in 0..12 {
            let moves = legal_moves(&state);
            if moves.is_empty() {
                break;
            }
            let mover = state.current_player();
            let mv = moves[moves.len() / 2];
            state.apply_move(&mv);
            assert_eq!(state.board().at(mv.dx, mv.dy).occupant, mover);
            assert_eq!(state.board().at(mv.sx, mv.sy).occupant, Player::None);
        }
    }
}
