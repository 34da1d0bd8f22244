//! Terminal client for the Contrast match server.
//!
//! Connects, performs the ROLE handshake, renders authoritative STATE
//! blocks, and either forwards manual input or lets a configured agent
//! play automatically (with a READY loop across `num_games` games).

mod agent;

use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use contrast_ai::policy::ModelSpec;
use contrast_protocol::{parse_move, render_board, GameStatus, StateSnapshot};

use crate::agent::AutoPlayer;

const DEFAULT_PORT: u16 = 8765;
const SERVER_HOST: &str = "127.0.0.1";

#[derive(Parser, Debug)]
#[command(name = "contrast-client")]
#[command(about = "Terminal client for Contrast")]
struct Args {
    /// Desired role: X, O, spec, or '-' to accept the server's choice
    #[arg(default_value = "-")]
    role: String,

    /// Display name
    #[arg(default_value = "-")]
    name: String,

    /// Agent model: manual, random, rule, rulebased1, ntuple,
    /// alphabeta[:depth], mcts[:iters]
    #[arg(default_value = "-")]
    model: String,

    /// Games to play before exiting (auto mode)
    #[arg(default_value_t = 1)]
    num_games: u32,
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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn server_port() -> u16 {
    std::env::var("CONTRAST_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_PORT)
}

fn quiet() -> bool {
    std::env::var("CONTRAST_MINIMAL").is_ok() || std::env::var("CONTRAST_SILENT").is_ok()
}

/// Blocking stdin loop for manual play; lines are validated locally and
/// forwarded as MOVE commands.
fn input_loop(tx: mpsc::UnboundedSender<String>) {
    use std::io::BufRead as _;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            ":quit" => std::process::exit(0),
            ":get" => {
                if tx.send("GET_STATE\n".to_string()).is_err() {
                    break;
                }
            }
            ":ready" => {
                if tx.send("READY\n".to_string()).is_err() {
                    break;
                }
            }
            text => match parse_move(text) {
                Ok(_) => {
                    if tx.send(format!("MOVE {text}\n")).is_err() {
                        break;
                    }
                }
                Err(err) => println!("[LOCAL] Invalid move: {err}"),
            },
        }
    }
}

fn print_snapshot(snapshot: &StateSnapshot) {
    if quiet() {
        return;
    }
    println!("\n=== STATE ===");
    println!("{}", render_board(snapshot));
    println!(
        "Turn: {} | Status: {} | Last move: {}",
        snapshot.turn, snapshot.status, snapshot.last_move
    );
    let stock = |map: &std::collections::BTreeMap<char, u32>, key| {
        map.get(&key).copied().unwrap_or(0)
    };
    println!(
        "Tiles X[B/G]={}/{} | O[B/G]={}/{}",
        stock(&snapshot.stock_black, 'X'),
        stock(&snapshot.stock_gray, 'X'),
        stock(&snapshot.stock_black, 'O'),
        stock(&snapshot.stock_gray, 'O'),
    );
}

struct ClientLoop {
    auto_player: Option<AutoPlayer>,
    tx: mpsc::UnboundedSender<String>,
    num_games: u32,
    games_played: u32,
    last_status: GameStatus,
}

impl ClientLoop {
    /// Process one STATE block; returns false when the session is done.
    fn on_snapshot(&mut self, snapshot: &StateSnapshot) -> bool {
        print_snapshot(snapshot);

        if snapshot.status.is_terminal() && snapshot.status != self.last_status {
            if let Some(winner) = snapshot.status.winner_label() {
                println!("[RESULT] {winner}");
            }
            self.games_played += 1;
            if self.games_played >= self.num_games {
                info!(games = self.games_played, "all games completed");
                return false;
            }
            if self.auto_player.is_some() {
                info!(
                    game = self.games_played,
                    of = self.num_games,
                    "sending READY for the next game"
                );
                if self.tx.send("READY\n".to_string()).is_err() {
                    return false;
                }
            }
        }
        self.last_status = snapshot.status;

        if let Some(agent) = &mut self.auto_player {
            if let Some(line) = agent.on_snapshot(snapshot) {
                println!("[AUTO] {} plays {}", agent.model_name(), &line[5..]);
                if self.tx.send(format!("{line}\n")).is_err() {
                    return false;
                }
            }
        }
        true
    }

    fn on_info(&mut self, payload: &str) {
        println!("[INFO] {payload}");
        if let Some(rest) = payload.strip_prefix("You are ") {
            if let Some(symbol) = rest.chars().next() {
                if let Some(agent) = &mut self.auto_player {
                    agent.set_role(symbol);
                }
            }
        }
    }
}

async fn read_state_block(
    lines: &mut tokio::io::Lines<BufReader<OwnedReadHalf>>,
) -> Option<StateSnapshot> {
    let mut block = Vec::new();
    loop {
        let line = lines.next_line().await.ok()??;
        if line == "END" {
            break;
        }
        block.push(line);
    }
    match StateSnapshot::parse_block(&block) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(error = %err, "malformed STATE block");
            None
        }
    }
}

async fn run(args: Args) -> ExitCode {
    let spec: ModelSpec = match args.model.parse() {
        Ok(spec) => spec,
        Err(err) => {
            error!(%err, "cannot initialize agent");
            return ExitCode::FAILURE;
        }
    };
    let auto_player = AutoPlayer::create(spec, &args.model);
    if let Some(agent) = &auto_player {
        info!(model = agent.model_name(), "auto play enabled");
    }

    let port = server_port();
    let socket = match TcpStream::connect((SERVER_HOST, port)).await {
        Ok(socket) => socket,
        Err(err) => {
            error!(host = SERVER_HOST, port, error = %err, "connection failed");
            return ExitCode::FAILURE;
        }
    };
    info!(host = SERVER_HOST, port, "connected");

    let (read_half, mut write_half) = socket.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if write_half.write_all(message.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    // Handshake first; the server answers with INFO and a STATE push.
    let handshake = format!("ROLE {} {} {}\n", args.role, args.name, args.model);
    if tx.send(handshake).is_err() {
        return ExitCode::FAILURE;
    }

    if auto_player.is_none() {
        let tx = tx.clone();
        std::thread::spawn(move || input_loop(tx));
        println!("Enter moves like 'a2,a3 -1' (':get' to resync, ':quit' to leave)");
    }

    let mut client = ClientLoop {
        auto_player,
        tx,
        num_games: args.num_games.max(1),
        games_played: 0,
        last_status: GameStatus::Ongoing,
    };

    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() {
            continue;
        }
        if line == "STATE" {
            let Some(snapshot) = read_state_block(&mut lines).await else {
                break;
            };
            if !client.on_snapshot(&snapshot) {
                break;
            }
        } else if let Some(payload) = line.strip_prefix("INFO ") {
            client.on_info(payload);
        } else if let Some(payload) = line.strip_prefix("ERROR ") {
            println!("[ERROR] {payload}");
        } else {
            println!("[SERVER] {line}");
        }
    }

    writer.abort();
    info!("connection closed");
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    run(args).await
}
