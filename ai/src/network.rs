//! N-tuple value network with TD(0) learning.
//!
//! The network sums one weight per pattern (plus a small hand table) over
//! the canonicalized board. Weights are always stored in Black's viewpoint;
//! `evaluate` flips the sign for White so the result is from the
//! side-to-move's viewpoint.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use contrast_core::symmetry;
use contrast_core::{Board, GameState, Player};

use crate::pattern::{default_patterns, Pattern};

/// How cell contents are mapped to weight-table indices.
///
/// `Separate` keeps independent base-3 tables for the piece field and the
/// tile field of each pattern (a few megabytes in total). `Combined` uses a
/// single base-9 table per pattern, which learns piece/tile interactions
/// directly at a cost of several orders of magnitude more memory; it is a
/// research opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Separate,
    Combined,
}

/// N-tuple evaluator: pattern set, weight tables, and the 8-entry hand
/// table indexed by the mover's remaining tiles.
#[derive(Debug, Clone)]
pub struct NTupleNetwork {
    encoding: Encoding,
    patterns: Vec<Pattern>,
    weights: Vec<Vec<f32>>,
    tile_weights: Vec<Vec<f32>>,
    hand_weights: Vec<f32>,
}

const HAND_STATES: usize = 8;

impl NTupleNetwork {
    /// Network over the default sixteen patterns with separate encoding.
    pub fn new() -> Self {
        Self::with_encoding(Encoding::Separate)
    }

    pub fn with_encoding(encoding: Encoding) -> Self {
        Self::with_patterns(encoding, default_patterns())
    }

    /// Network over a custom pattern set, mainly for tools and tests.
    pub fn with_patterns(encoding: Encoding, patterns: Vec<Pattern>) -> Self {
        let initial = 0.5 / (patterns.len() + 1) as f32;
        let alphabet = match encoding {
            Encoding::Separate => 3,
            Encoding::Combined => 9,
        };
        let weights = patterns
            .iter()
            .map(|p| vec![initial; p.num_states(alphabet)])
            .collect();
        let tile_weights = match encoding {
            Encoding::Separate => patterns
                .iter()
                .map(|p| vec![initial; p.num_states(3)])
                .collect(),
            Encoding::Combined => Vec::new(),
        };
        let network = Self {
            encoding,
            patterns,
            weights,
            tile_weights,
            hand_weights: vec![initial; HAND_STATES],
        };
        debug!(
            encoding = ?network.encoding,
            patterns = network.patterns.len(),
            weights = network.num_weights(),
            "N-tuple network initialized"
        );
        network
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Total number of weights across all tables.
    pub fn num_weights(&self) -> usize {
        self.weights.iter().map(Vec::len).sum::<usize>()
            + self.tile_weights.iter().map(Vec::len).sum::<usize>()
            + self.hand_weights.len()
    }

    fn hand_index(black: u32, gray: u32) -> usize {
        (black.min(3) * 2 + gray.min(1)) as usize
    }

    /// Sum of all touched weights in Black's viewpoint, before the
    /// perspective flip.
    fn raw_value(&self, board: &Board, player: Player, hand: usize) -> f32 {
        let mut value = 0.0;
        match self.encoding {
            Encoding::Separate => {
                for (pattern, table) in self.patterns.iter().zip(&self.weights) {
                    value += table[pattern.piece_index(board, player)];
                }
                for (pattern, table) in self.patterns.iter().zip(&self.tile_weights) {
                    value += table[pattern.tile_index(board)];
                }
            }
            Encoding::Combined => {
                for (pattern, table) in self.patterns.iter().zip(&self.weights) {
                    value += table[pattern.combined_index(board, player)];
                }
            }
        }
        value + self.hand_weights[hand]
    }

    /// Position value from the side-to-move's viewpoint: positive is good
    /// for whoever is about to move.
    pub fn evaluate(&self, state: &GameState) -> f32 {
        let board = symmetry::canonical_board(state.board());
        let player = state.current_player();
        let inv = state.inventory(player);
        let raw = self.raw_value(&board, player, Self::hand_index(inv.black, inv.gray));
        if player == Player::White {
            -raw
        } else {
            raw
        }
    }

    /// TD(0) step toward `target` (expressed in the side-to-move's
    /// viewpoint, like `evaluate`). The error is re-negated to the raw
    /// viewpoint for White and split evenly across all contributing
    /// feature sources.
    pub fn td_update(&mut self, state: &GameState, target: f32, learning_rate: f32) {
        let board = symmetry::canonical_board(state.board());
        let player = state.current_player();
        let inv = state.inventory(player);
        let hand = Self::hand_index(inv.black, inv.gray);

        let raw = self.raw_value(&board, player, hand);
        let current = if player == Player::White { -raw } else { raw };
        let mut error = target - current;
        if player == Player::White {
            error = -error;
        }

        let components = match self.encoding {
            Encoding::Separate => 2 * self.patterns.len() + 1,
            Encoding::Combined => self.patterns.len() + 1,
        };
        let delta = learning_rate / components as f32 * error;

        match self.encoding {
            Encoding::Separate => {
                for (pattern, table) in self.patterns.iter().zip(&mut self.weights) {
                    table[pattern.piece_index(&board, player)] += delta;
                }
                for (pattern, table) in self.patterns.iter().zip(&mut self.tile_weights) {
                    table[pattern.tile_index(&board)] += delta;
                }
            }
            Encoding::Combined => {
                for (pattern, table) in self.patterns.iter().zip(&mut self.weights) {
                    table[pattern.combined_index(&board, player)] += delta;
                }
            }
        }
        self.hand_weights[hand] += delta;
    }

    /// Write all weight tables as little-endian binary: pattern count,
    /// each table as (len, floats), the hand table, and for separate
    /// encoding the tile tables in the same shape.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = File::create(path)?;
        write_u64(&mut file, self.weights.len() as u64)?;
        for table in &self.weights {
            write_table(&mut file, table)?;
        }
        write_table(&mut file, &self.hand_weights)?;
        if self.encoding == Encoding::Separate {
            write_u64(&mut file, self.tile_weights.len() as u64)?;
            for table in &self.tile_weights {
                write_table(&mut file, table)?;
            }
        }
        Ok(())
    }

    /// Load weights saved by [`save`](Self::save).
    ///
    /// The whole file is parsed before anything is committed: a pattern
    /// count or table size that disagrees with the in-memory topology
    /// leaves the network untouched and returns `Ok(false)`. I/O failures
    /// (including a missing or truncated file) surface as errors.
    pub fn load(&mut self, path: impl AsRef<Path>) -> io::Result<bool> {
        let mut file = File::open(path)?;

        let count = read_u64(&mut file)? as usize;
        if count != self.weights.len() {
            return Ok(false);
        }
        let mut weights = Vec::with_capacity(count);
        for table in &self.weights {
            match read_table(&mut file, table.len())? {
                Some(loaded) => weights.push(loaded),
                None => return Ok(false),
            }
        }
        let hand_weights = match read_table(&mut file, self.hand_weights.len())? {
            Some(loaded) => loaded,
            None => return Ok(false),
        };
        let mut tile_weights = Vec::new();
        if self.encoding == Encoding::Separate {
            let tile_count = read_u64(&mut file)? as usize;
            if tile_count != self.tile_weights.len() {
                return Ok(false);
            }
            for table in &self.tile_weights {
                match read_table(&mut file, table.len())? {
                    Some(loaded) => tile_weights.push(loaded),
                    None => return Ok(false),
                }
            }
        }

        self.weights = weights;
        self.hand_weights = hand_weights;
        self.tile_weights = tile_weights;
        Ok(true)
    }
}

impl Default for NTupleNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment variable naming the weight file agents should load.
pub const WEIGHTS_ENV: &str = "CONTRAST_WEIGHTS";
/// Fallback weight file path.
pub const DEFAULT_WEIGHTS_PATH: &str = "weights/contrast_ntuple.bin";

/// Network loaded from `CONTRAST_WEIGHTS` (or the default path).
///
/// Loading is best-effort: a missing or mismatched file logs a warning and
/// the agent plays with untrained weights.
pub fn load_network_from_env() -> NTupleNetwork {
    let path =
        std::env::var(WEIGHTS_ENV).unwrap_or_else(|_| DEFAULT_WEIGHTS_PATH.to_string());
    let mut network = NTupleNetwork::new();
    match network.load(&path) {
        Ok(true) => info!(path = %path, "loaded N-tuple weights"),
        Ok(false) => warn!(path = %path, "weight file does not match the network topology"),
        Err(err) => warn!(path = %path, error = %err, "could not read weight file"),
    }
    network
}

fn write_u64(out: &mut impl Write, value: u64) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn write_table(out: &mut impl Write, table: &[f32]) -> io::Result<()> {
    write_u64(out, table.len() as u64)?;
    let mut buf = Vec::with_capacity(table.len() * 4);
    for &w in table {
        buf.extend_from_slice(&w.to_le_bytes());
    }
    out.write_all(&buf)
}

fn read_u64(input: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read one table, returning `None` when its recorded length disagrees
/// with the expected topology.
fn read_table(input: &mut impl Read, expected_len: usize) -> io::Result<Option<Vec<f32>>> {
    let len = read_u64(input)? as usize;
    if len != expected_len {
        return Ok(None);
    }
    let mut buf = vec![0u8; len * 4];
    input.read_exact(&mut buf)?;
    let table = buf
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok(Some(table))
}
