//! Offline match runner: pits two policies against each other and reports
//! win/draw statistics.

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use contrast_ai::network::load_network_from_env;
use contrast_ai::policy::ModelSpec;
use contrast_ai::Policy;
use contrast_core::rules;
use contrast_core::{GameState, Player};

const MAX_MOVES: usize = 1000;

#[derive(Parser, Debug)]
#[command(name = "arena")]
#[command(about = "Contrast match series runner")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 100)]
    games: u32,

    /// Model for Black (random, rule, rulebased1, ntuple, alphabeta[:d], mcts[:n])
    #[arg(long, default_value = "rule")]
    black: String,

    /// Model for White
    #[arg(long, default_value = "rule")]
    white: String,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let default = if std::env::var("CONTRAST_DEBUG").is_ok() {
        "debug"
    } else if std::env::var("CONTRAST_SILENT").is_ok() {
        "error"
    } else if std::env::var("CONTRAST_MINIMAL").is_ok() {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Play one game; returns the winner (None for a draw) and the move count.
fn play_game<'a>(black: &'a mut dyn Policy, white: &'a mut dyn Policy) -> (Option<Player>, usize) {
    let mut state = GameState::new();
    let mut moves = 0;

    while moves < MAX_MOVES {
        if rules::is_win(&state, Player::Black) {
            return (Some(Player::Black), moves);
        }
        if rules::is_win(&state, Player::White) {
            return (Some(Player::White), moves);
        }
        if rules::is_draw(&state) {
            return (None, moves);
        }

        let mover = state.current_player();
        let policy = if mover == Player::Black {
            &mut *black
        } else {
            &mut *white
        };
        let Some(mv) = policy.pick(&state) else {
            // No legal moves: the side to move loses.
            return (Some(mover.opponent()), moves);
        };
        state.apply_move(&mv);
        moves += 1;
    }

    (None, moves)
}

fn build_policy(spec: &str) -> Result<Box<dyn Policy>> {
    let spec: ModelSpec = spec.parse()?;
    match spec.into_policy(load_network_from_env()) {
        Some(policy) => Ok(policy),
        None => bail!("manual play is not available in the arena"),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut black = build_policy(&args.black)?;
    let mut white = build_policy(&args.white)?;

    info!(games = args.games, black = %args.black, white = %args.white, "starting series");

    let mut black_wins = 0u32;
    let mut white_wins = 0u32;
    let mut draws = 0u32;
    let mut total_moves = 0usize;

    for game in 1..=args.games {
        let (winner, moves) = play_game(black.as_mut(), white.as_mut());
        total_moves += moves;
        match winner {
            Some(Player::Black) => black_wins += 1,
            Some(Player::White) => white_wins += 1,
            _ => draws += 1,
        }
        if game % 10 == 0 {
            info!(
                game,
                black_wins, white_wins, draws, "series progress"
            );
        }
    }

    let games = args.games.max(1);
    info!(
        black_wins,
        white_wins,
        draws,
        black_rate = %format!("{:.1}%", 100.0 * black_wins as f64 / games as f64),
        white_rate = %format!("{:.1}%", 100.0 * white_wins as f64 / games as f64),
        avg_moves = %format!("{:.1}", total_moves as f64 / games as f64),
        "series finished"
    );
    Ok(())
}
