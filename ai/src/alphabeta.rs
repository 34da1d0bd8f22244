//! Iterative-deepening negamax with a transposition table.
//!
//! Values are from the side-to-move's viewpoint: a won position scores
//! +10000, a lost one -10000, and leaves fall back to the N-tuple network.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use contrast_core::rules;
use contrast_core::{GameState, Move, Player};

use crate::network::NTupleNetwork;
use crate::policy::{Policy, DEFAULT_AB_DEPTH};

const WIN_SCORE: f32 = 10_000.0;

/// Seconds; supplies the default time budget when the caller passes none.
pub const MOVE_TIME_ENV: &str = "CONTRAST_MOVE_TIME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy)]
struct TtEntry {
    value: f32,
    depth: i32,
    bound: Bound,
    best_move: Option<Move>,
}

/// Counters reset and reported on every `search` invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub tt_hits: u64,
    pub tt_cutoffs: u64,
    pub beta_cutoffs: u64,
    pub time_ms: u64,
    pub depth_reached: i32,
}

/// Alpha-beta engine with the N-tuple network as leaf evaluator.
#[derive(Debug)]
pub struct AlphaBeta {
    network: NTupleNetwork,
    tt: HashMap<u64, TtEntry>,
    use_tt: bool,
    use_move_ordering: bool,
    default_depth: i32,
    stats: SearchStats,
}

impl AlphaBeta {
    pub fn new(network: NTupleNetwork) -> Self {
        Self {
            network,
            tt: HashMap::new(),
            use_tt: true,
            use_move_ordering: true,
            default_depth: DEFAULT_AB_DEPTH,
            stats: SearchStats::default(),
        }
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.default_depth = depth;
        self
    }

    pub fn set_use_transposition_table(&mut self, use_tt: bool) {
        self.use_tt = use_tt;
    }

    pub fn set_use_move_ordering(&mut self, ordering: bool) {
        self.use_move_ordering = ordering;
    }

    pub fn network_mut(&mut self) -> &mut NTupleNetwork {
        &mut self.network
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Best move by iterative deepening.
    ///
    /// Depth mode runs depths 1..=max_depth; a time budget (explicit, or
    /// the `CONTRAST_MOVE_TIME` seconds when none is given) switches to
    /// time mode, which runs successive depths until the deadline and
    /// keeps the move from the deepest fully completed depth. A negative
    /// `max_depth` selects time-only mode.
    pub fn search(
        &mut self,
        state: &GameState,
        max_depth: i32,
        time_budget: Option<Duration>,
    ) -> Option<Move> {
        self.stats = SearchStats::default();
        self.tt.clear();

        let budget = time_budget.or_else(env_move_time);
        let start = Instant::now();

        let best = match budget {
            Some(budget) => self.deepen_until(state, start + budget),
            None => {
                let max_depth = if max_depth < 0 {
                    self.default_depth.max(1)
                } else {
                    max_depth
                };
                self.deepen_to(state, max_depth)
            }
        };

        self.stats.time_ms = start.elapsed().as_millis() as u64;
        debug!(
            depth = self.stats.depth_reached,
            nodes = self.stats.nodes,
            tt_hits = self.stats.tt_hits,
            tt_cutoffs = self.stats.tt_cutoffs,
            beta_cutoffs = self.stats.beta_cutoffs,
            time_ms = self.stats.time_ms,
            "alpha-beta search complete"
        );
        best
    }

    fn deepen_to(&mut self, state: &GameState, max_depth: i32) -> Option<Move> {
        let mut best = None;
        for depth in 1..=max_depth {
            let (value, mv) = self.alphabeta(state, depth, f32::NEG_INFINITY, f32::INFINITY);
            self.stats.depth_reached = depth;
            if mv.is_some() {
                best = mv;
            }
            debug!(depth, value, nodes = self.stats.nodes, "depth complete");
        }
        best
    }

    fn deepen_until(&mut self, state: &GameState, deadline: Instant) -> Option<Move> {
        let mut best = None;
        let mut depth = 1;
        // The clock is only polled between depths; each started depth runs
        // to completion and its move is kept.
        while Instant::now() < deadline {
            let (value, mv) = self.alphabeta(state, depth, f32::NEG_INFINITY, f32::INFINITY);
            self.stats.depth_reached = depth;
            if mv.is_some() {
                best = mv;
            }
            debug!(depth, value, nodes = self.stats.nodes, "depth complete");
            depth += 1;
        }
        best
    }

    fn alphabeta(&mut self, state: &GameState, depth: i32, alpha: f32, beta: f32) -> (f32, Option<Move>) {
        self.stats.nodes += 1;

        let moves = rules::legal_moves(state);
        if moves.is_empty() {
            return (-WIN_SCORE, None);
        }
        if let Some(value) = terminal_win_value(state) {
            return (value, None);
        }
        if depth <= 0 {
            return (self.network.evaluate(state), None);
        }

        let hash = state.compute_hash();
        let alpha_in = alpha;
        let mut alpha = alpha;
        let mut tt_hint = None;
        if self.use_tt {
            if let Some(entry) = self.tt.get(&hash) {
                self.stats.tt_hits += 1;
                if entry.depth >= depth {
                    let usable = match entry.bound {
                        Bound::Exact => true,
                        Bound::Lower => entry.value >= beta,
                        Bound::Upper => entry.value <= alpha,
                    };
                    if usable {
                        self.stats.tt_cutoffs += 1;
                        return (entry.value, entry.best_move);
                    }
                }
                tt_hint = entry.best_move;
            }
        }

        let moves = self.order_moves(state, moves, tt_hint);

        let mut best_value = f32::NEG_INFINITY;
        let mut best_move = moves[0];
        for mv in &moves {
            let mut next = state.clone();
            next.apply_move(mv);
            let (child_value, _) = self.alphabeta(&next, depth - 1, -beta, -alpha);
            let value = -child_value;

            if value > best_value {
                best_value = value;
                best_move = *mv;
            }
            alpha = alpha.max(value);
            if alpha >= beta {
                self.stats.beta_cutoffs += 1;
                break;
            }
        }

        if self.use_tt {
            let bound = if best_value <= alpha_in {
                Bound::Upper
            } else if best_value >= beta {
                Bound::Lower
            } else {
                Bound::Exact
            };
            self.tt.insert(
                hash,
                TtEntry {
                    value: best_value,
                    depth,
                    bound,
                    best_move: Some(best_move),
                },
            );
        }

        (best_value, Some(best_move))
    }

    /// One-ply negamax ordering, with the transposition-table move first.
    fn order_moves(&self, state: &GameState, mut moves: Vec<Move>, hint: Option<Move>) -> Vec<Move> {
        if !self.use_move_ordering || moves.len() <= 1 {
            return moves;
        }

        let mut scored: Vec<(f32, Move)> = moves
            .drain(..)
            .map(|mv| {
                let mut next = state.clone();
                next.apply_move(&mv);
                (-self.network.evaluate(&next), mv)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut ordered: Vec<Move> = scored.into_iter().map(|(_, mv)| mv).collect();
        if let Some(hint) = hint {
            if let Some(pos) = ordered.iter().position(|&m| m == hint) {
                let mv = ordered.remove(pos);
                ordered.insert(0, mv);
            }
        }
        ordered
    }
}

/// ±10000 when a goal row is occupied, from the side-to-move's viewpoint.
fn terminal_win_value(state: &GameState) -> Option<f32> {
    for player in [Player::Black, Player::White] {
        if rules::is_win(state, player) {
            return Some(if state.current_player() == player {
                WIN_SCORE
            } else {
                -WIN_SCORE
            });
        }
    }
    None
}

/// Default deadline from `CONTRAST_MOVE_TIME` (decimal seconds).
fn env_move_time() -> Option<Duration> {
    std::env::var(MOVE_TIME_ENV)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .map(Duration::from_secs_f64)
}

impl Policy for AlphaBeta {
    fn pick(&mut self, state: &GameState) -> Option<Move> {
        self.search(state, self.default_depth, None)
    }
}
