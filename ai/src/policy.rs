//! One-shot move selection policies.

use std::str::FromStr;

use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;

use contrast_core::rules;
use contrast_core::{GameState, Move, Player};

use crate::alphabeta::AlphaBeta;
use crate::mcts::Mcts;
use crate::network::NTupleNetwork;

/// Anything that can pick a move for the side to move.
///
/// Implementations must return a move from the generated legal set for
/// every non-terminal state, and `None` only when no legal move exists.
pub trait Policy: Send {
    fn pick(&mut self, state: &GameState) -> Option<Move>;
}

/// Uniformly random legal move.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for RandomPolicy {
    fn pick(&mut self, state: &GameState) -> Option<Move> {
        let moves = rules::legal_moves(state);
        if moves.is_empty() {
            return None;
        }
        Some(moves[self.rng.gen_range(0..moves.len())])
    }
}

/// Greedy one-ply policy over the N-tuple network.
///
/// Picks the move whose resulting position evaluates best for us, i.e.
/// maximizes `-evaluate(next)`, breaking ties uniformly at random within
/// an epsilon.
#[derive(Debug)]
pub struct NTuplePolicy {
    network: NTupleNetwork,
    rng: ChaCha20Rng,
}

const TIE_EPSILON: f32 = 1e-6;

impl NTuplePolicy {
    pub fn new(network: NTupleNetwork) -> Self {
        Self {
            network,
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(network: NTupleNetwork, seed: u64) -> Self {
        Self {
            network,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn network(&self) -> &NTupleNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut NTupleNetwork {
        &mut self.network
    }
}

impl Policy for NTuplePolicy {
    fn pick(&mut self, state: &GameState) -> Option<Move> {
        let moves = rules::legal_moves(state);
        if moves.is_empty() {
            return None;
        }

        let mut best_value = f32::NEG_INFINITY;
        let mut best = Vec::new();
        for mv in moves {
            let mut next = state.clone();
            next.apply_move(&mv);
            let value = -self.network.evaluate(&next);
            if value > best_value + TIE_EPSILON {
                best_value = value;
                best.clear();
                best.push(mv);
            } else if (value - best_value).abs() <= TIE_EPSILON {
                best.push(mv);
            }
        }
        Some(best[self.rng.gen_range(0..best.len())])
    }
}

/// Forward-marching heuristic: prefer base moves that advance toward the
/// goal row, otherwise any base move, otherwise anything legal.
#[derive(Debug)]
pub struct RuleBasedPolicy {
    rng: ChaCha20Rng,
}

impl RuleBasedPolicy {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RuleBasedPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for RuleBasedPolicy {
    fn pick(&mut self, state: &GameState) -> Option<Move> {
        let moves = rules::legal_moves(state);
        if moves.is_empty() {
            return None;
        }
        let forward = if state.current_player() == Player::Black {
            1
        } else {
            -1
        };

        let base: Vec<Move> = moves.iter().copied().filter(|m| m.placement.is_none()).collect();
        let pool = if base.is_empty() { moves } else { base };

        let advancing: Vec<Move> = pool
            .iter()
            .copied()
            .filter(|m| (m.dy - m.sy) * forward > 0)
            .collect();
        let pool = if advancing.is_empty() { pool } else { advancing };

        Some(pool[self.rng.gen_range(0..pool.len())])
    }
}

/// Goal-distance heuristic.
///
/// Takes an immediate win when one exists, otherwise scores base moves by
/// the destination's remaining distance to the goal row, preferring the
/// central files on ties.
#[derive(Debug)]
pub struct RuleBasedPolicy2 {
    rng: ChaCha20Rng,
}

impl RuleBasedPolicy2 {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    fn score(state: &GameState, mv: &Move) -> i32 {
        let player = state.current_player();
        let goal = player.goal_row();
        if mv.dy == goal {
            return 1000;
        }

        let distance = (goal - mv.dy).abs();
        // Advance first; keep the center files when the distance is equal.
        -distance * 4 - (mv.dx - 2).abs()
    }
}

impl Default for RuleBasedPolicy2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for RuleBasedPolicy2 {
    fn pick(&mut self, state: &GameState) -> Option<Move> {
        let moves = rules::legal_moves(state);
        if moves.is_empty() {
            return None;
        }

        let base: Vec<Move> = moves.iter().copied().filter(|m| m.placement.is_none()).collect();
        let pool = if base.is_empty() { moves } else { base };

        let mut best_score = i32::MIN;
        let mut best = Vec::new();
        for mv in pool {
            let score = Self::score(state, &mv);
            match score.cmp(&best_score) {
                std::cmp::Ordering::Greater => {
                    best_score = score;
                    best.clear();
                    best.push(mv);
                }
                std::cmp::Ordering::Equal => best.push(mv),
                std::cmp::Ordering::Less => {}
            }
        }
        Some(best[self.rng.gen_range(0..best.len())])
    }
}

/// A parsed agent model argument, e.g. `random`, `alphabeta:7`, `mcts:800`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSpec {
    Manual,
    Random,
    RuleBased1,
    RuleBased2,
    NTuple,
    AlphaBeta(i32),
    Mcts(u32),
}

pub const DEFAULT_AB_DEPTH: i32 = 5;
pub const DEFAULT_MCTS_ITERATIONS: u32 = 400;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown model: {0}")]
pub struct UnknownModel(pub String);

impl FromStr for ModelSpec {
    type Err = UnknownModel;

    /// Numeric suffixes parse as the search budget; out-of-range values
    /// fall back to the defaults (depth 5, 400 iterations).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase();
        let (head, suffix) = match normalized.split_once(':') {
            Some((head, suffix)) => (head, Some(suffix)),
            None => (normalized.as_str(), None),
        };
        match head {
            "" | "-" | "manual" => Ok(ModelSpec::Manual),
            "random" => Ok(ModelSpec::Random),
            "rulebased1" | "policy1" => Ok(ModelSpec::RuleBased1),
            "rule" | "rulebase" | "rulebased" | "rulebased2" | "policy2" => {
                Ok(ModelSpec::RuleBased2)
            }
            "ntuple" | "ntuple_big" | "ntuplebig" => Ok(ModelSpec::NTuple),
            "alphabeta" | "ab" => {
                let depth = suffix
                    .and_then(|v| v.parse::<i32>().ok())
                    .filter(|d| (1..=20).contains(d))
                    .unwrap_or(DEFAULT_AB_DEPTH);
                Ok(ModelSpec::AlphaBeta(depth))
            }
            "mcts" => {
                let iterations = suffix
                    .and_then(|v| v.parse::<u32>().ok())
                    .filter(|i| (10..=10_000).contains(i))
                    .unwrap_or(DEFAULT_MCTS_ITERATIONS);
                Ok(ModelSpec::Mcts(iterations))
            }
            _ => Err(UnknownModel(s.to_string())),
        }
    }
}

impl ModelSpec {
    /// Build the policy for this spec around the given network snapshot.
    /// `Manual` has no policy and returns `None`.
    pub fn into_policy(self, network: NTupleNetwork) -> Option<Box<dyn Policy>> {
        match self {
            ModelSpec::Manual => None,
            ModelSpec::Random => Some(Box::new(RandomPolicy::new())),
            ModelSpec::RuleBased1 => Some(Box::new(RuleBasedPolicy::new())),
            ModelSpec::RuleBased2 => Some(Box::new(RuleBasedPolicy2::new())),
            ModelSpec::NTuple => Some(Box::new(NTuplePolicy::new(network))),
            ModelSpec::AlphaBeta(depth) => Some(Box::new(AlphaBeta::new(network).with_depth(depth))),
            ModelSpec::Mcts(iterations) => {
                Some(Box::new(Mcts::new(network).with_iterations(iterations)))
            }
        }
    }
}
