//! Core rules engine for Contrast, a 5x5 two-player abstract strategy game.
//!
//! This crate provides the pieces every agent and the match server build on:
//! - `Board` / `GameState`: the authoritative game position
//! - `rules`: pure move generation and terminal detection
//! - `symmetry`: the two-element symmetry group used by evaluators
//!
//! Black starts on row y=0 and wins by reaching row y=4; White starts on
//! row y=4 and wins by reaching row y=0. Black moves first.

pub mod board;
pub mod moves;
pub mod rules;
pub mod state;
pub mod symmetry;
pub mod types;

pub use board::Board;
pub use moves::{Move, Placement};
pub use state::{GameState, TileInventory};
pub use symmetry::Symmetry;
pub use types::{Cell, Player, TileType, BOARD_H, BOARD_W};
