//! Offline TD(0) self-play trainer for the N-tuple network.
//!
//! Plays epsilon-greedy self-play games with the one-ply greedy policy and
//! updates every visited state toward the next ply's evaluation, with ±1
//! targets at terminals. Weights are written out periodically and on exit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use tracing::info;

use contrast_core::rules;
use contrast_core::{GameState, Player};

use contrast_ai::network::DEFAULT_WEIGHTS_PATH;
use contrast_ai::NTupleNetwork;

const MAX_MOVES: usize = 1000;

#[derive(Parser, Debug)]
#[command(name = "train")]
#[command(about = "TD(0) self-play trainer for the Contrast N-tuple network")]
struct Args {
    /// Number of self-play games
    #[arg(long, default_value_t = 10_000)]
    games: u32,

    /// TD learning rate
    #[arg(long, default_value_t = 0.01)]
    learning_rate: f32,

    /// Probability of a uniformly random exploration move
    #[arg(long, default_value_t = 0.1)]
    epsilon: f64,

    /// Save weights every N games
    #[arg(long, default_value_t = 1000)]
    save_every: u32,

    /// Output weight file
    #[arg(long, default_value = DEFAULT_WEIGHTS_PATH)]
    output: PathBuf,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Continue from an existing weight file
    #[arg(long)]
    resume: Option<PathBuf>,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let default = if std::env::var("CONTRAST_DEBUG").is_ok() {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Pick the greedy move (max of -evaluate(next)), or a random legal move
/// with probability epsilon.
fn pick_move(
    network: &NTupleNetwork,
    state: &GameState,
    epsilon: f64,
    rng: &mut ChaCha20Rng,
) -> Option<contrast_core::Move> {
    let moves = rules::legal_moves(state);
    if moves.is_empty() {
        return None;
    }
    if rng.gen_bool(epsilon) {
        return Some(moves[rng.gen_range(0..moves.len())]);
    }

    let mut best_value = f32::NEG_INFINITY;
    let mut best = moves[0];
    for mv in moves {
        let mut next = state.clone();
        next.apply_move(&mv);
        let value = -network.evaluate(&next);
        if value > best_value {
            best_value = value;
            best = mv;
        }
    }
    Some(best)
}

/// Outcome of a finished game from the viewpoint of `player`.
fn outcome_for(winner: Option<Player>, player: Player) -> f32 {
    match winner {
        Some(w) if w == player => 1.0,
        Some(_) => -1.0,
        None => 0.0,
    }
}

/// Play one self-play game and apply TD(0) updates backward through the
/// visited states. Returns the winner and move count.
fn train_one_game(
    network: &mut NTupleNetwork,
    learning_rate: f32,
    epsilon: f64,
    rng: &mut ChaCha20Rng,
) -> (Option<Player>, usize) {
    let mut state = GameState::new();
    let mut visited = vec![state.clone()];

    let mut winner = None;
    for _ in 0..MAX_MOVES {
        if rules::is_win(&state, Player::Black) {
            winner = Some(Player::Black);
            break;
        }
        if rules::is_win(&state, Player::White) {
            winner = Some(Player::White);
            break;
        }
        if rules::is_draw(&state) {
            break;
        }
        let Some(mv) = pick_move(network, &state, epsilon, rng) else {
            winner = Some(state.current_player().opponent());
            break;
        };
        state.apply_move(&mv);
        visited.push(state.clone());
    }

    let moves = visited.len() - 1;

    // Backward pass: the last state gets the exact outcome, earlier states
    // bootstrap from the freshly updated successor evaluation.
    for t in (0..visited.len()).rev() {
        let target = if t == visited.len() - 1 {
            outcome_for(winner, visited[t].current_player())
        } else {
            -network.evaluate(&visited[t + 1])
        };
        network.td_update(&visited[t], target, learning_rate);
    }

    (winner, moves)
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut network = NTupleNetwork::new();
    if let Some(resume) = &args.resume {
        let loaded = network
            .load(resume)
            .with_context(|| format!("reading {}", resume.display()))?;
        anyhow::ensure!(loaded, "weight file {} does not match", resume.display());
        info!(path = %resume.display(), "resumed from existing weights");
    }

    let mut rng = match args.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };

    info!(
        games = args.games,
        learning_rate = args.learning_rate,
        epsilon = args.epsilon,
        output = %args.output.display(),
        "training started"
    );

    let mut black_wins = 0u32;
    let mut white_wins = 0u32;
    let mut draws = 0u32;

    for game in 1..=args.games {
        let (winner, moves) =
            train_one_game(&mut network, args.learning_rate, args.epsilon, &mut rng);
        match winner {
            Some(Player::Black) => black_wins += 1,
            Some(Player::White) => white_wins += 1,
            _ => draws += 1,
        }

        if game % 100 == 0 {
            info!(game, black_wins, white_wins, draws, moves, "training progress");
        }
        if game % args.save_every == 0 {
            network
                .save(&args.output)
                .with_context(|| format!("writing {}", args.output.display()))?;
            info!(game, path = %args.output.display(), "weights saved");
        }
    }

    network
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        black_wins,
        white_wins,
        draws,
        path = %args.output.display(),
        "training finished"
    );
    Ok(())
}
