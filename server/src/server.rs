//! The authoritative game room and command handlers.
//!
//! Two mutexes guard everything: the game mutex (state, game_id, status,
//! move-id bookkeeping, stats) and the clients mutex (session registry).
//! When both are needed the game mutex is taken first. Snapshots are built
//! while holding the game mutex; the actual sends happen afterwards
//! through per-session queues, so no socket work is done under it.

use std::fs::File;
use std::io::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use contrast_core::rules;
use contrast_core::{GameState, Move, Player, TileType};
use contrast_protocol::{
    format_move, parse_move, player_to_symbol, render_board, GameStatus, StateSnapshot,
};

use crate::session::{Role, Session};

/// Pause before an automatic rematch so clients can present the result.
const REMATCH_DELAY: Duration = Duration::from_millis(200);

/// Match bookkeeping across games.
#[derive(Debug, Default)]
pub struct MatchStats {
    pub total_games: u32,
    pub x_wins: u32,
    pub o_wins: u32,
    pub draws: u32,
    pub x_name: String,
    pub o_name: String,
}

/// Everything guarded by the game mutex.
#[derive(Debug)]
pub struct GameRoom {
    pub state: GameState,
    pub game_id: u64,
    pub last_move: String,
    pub status: GameStatus,
    /// Last accepted move_id per player role in the current game.
    pub last_move_ids: [u64; 2],
    pub stats: MatchStats,
    pub game_started: Instant,
}

impl GameRoom {
    fn new() -> Self {
        Self {
            state: GameState::new(),
            game_id: 1,
            last_move: String::new(),
            status: GameStatus::Ongoing,
            last_move_ids: [0, 0],
            stats: MatchStats::default(),
            game_started: Instant::now(),
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from_state(&self.state, self.game_id, self.status, &self.last_move)
    }
}

/// The match server: one game room plus the session registry.
pub struct Server {
    game: Mutex<GameRoom>,
    clients: Mutex<Vec<Session>>,
    results_log: Mutex<Option<File>>,
    log_board: bool,
    next_session_id: AtomicU64,
}

enum MoveOutcome {
    /// ERROR already queued; direct resync, optionally broadcast too.
    Rejected {
        snapshot: StateSnapshot,
        broadcast: bool,
    },
    Applied {
        snapshot: StateSnapshot,
        ended: bool,
    },
}

impl Server {
    pub fn new(results_log: Option<File>, log_board: bool) -> Self {
        Self {
            game: Mutex::new(GameRoom::new()),
            clients: Mutex::new(Vec::new()),
            results_log: Mutex::new(results_log),
            log_board,
            next_session_id: AtomicU64::new(1),
        }
    }

    fn game(&self) -> MutexGuard<'_, GameRoom> {
        self.game.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clients(&self) -> MutexGuard<'_, Vec<Session>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection; the first unfilled of X and O is
    /// assigned, everyone after that spectates.
    pub fn register(&self, tx: UnboundedSender<String>) -> (u64, Role) {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let mut clients = self.clients();
        let role = Self::unfilled_role(&clients);
        clients.push(Session::new(id, role, tx));
        (id, role)
    }

    fn unfilled_role(clients: &[Session]) -> Role {
        let taken = |role| clients.iter().any(|s| s.active && s.role == role);
        if !taken(Role::X) {
            Role::X
        } else if !taken(Role::O) {
            Role::O
        } else {
            Role::Spectator
        }
    }

    /// Drop a session. When no players remain the room soft-resets: the
    /// position clears but the game_id is kept.
    pub fn disconnect(&self, id: u64) {
        let mut room = self.game();
        let mut clients = self.clients();
        if let Some(pos) = clients.iter().position(|s| s.id == id) {
            let session = clients.remove(pos);
            info!(role = session.role.as_str(), name = %session.name, "client disconnected");
        }
        let players_left = clients.iter().any(|s| s.active && s.role.is_player());
        drop(clients);

        if !players_left {
            room.state = GameState::new();
            room.last_move.clear();
            room.status = GameStatus::Ongoing;
            room.last_move_ids = [0, 0];
            debug!(game_id = room.game_id, "no players left; soft reset");
        }
    }

    /// Dispatch one client line.
    pub async fn handle_line(&self, id: u64, line: &str) {
        if let Some(payload) = line.strip_prefix("MOVE ") {
            self.handle_move(id, payload).await;
        } else if let Some(payload) = line.strip_prefix("ROLE ") {
            self.handle_role(id, payload);
        } else if line == "READY" {
            self.handle_ready(id);
        } else if line == "GET_STATE" {
            let snapshot = self.game().snapshot();
            self.send_to(id, snapshot.build_message());
        } else if line == "GET_STATS" {
            let room = self.game();
            let message = format!(
                "STATS games={} x_wins={} o_wins={} draws={}\n",
                room.stats.total_games, room.stats.x_wins, room.stats.o_wins, room.stats.draws
            );
            drop(room);
            self.send_to(id, message);
        } else {
            self.send_error(id, &format!("Unknown command: {line}"));
        }
    }

    /// The authoritative MOVE discipline: stale game_id, turn, duplicate
    /// move_id, and legality checks in that order, each rejection paired
    /// with a STATE resync.
    pub async fn handle_move(&self, id: u64, payload: &str) {
        let Some(role) = self.session_role(id) else {
            return;
        };
        if !role.is_player() {
            self.send_error(id, "Spectators cannot submit moves");
            return;
        }

        let wire = match parse_move(payload) {
            Ok(wire) => wire,
            Err(err) => {
                self.send_error(id, &err.to_string());
                return;
            }
        };
        debug!(role = role.as_str(), payload, "move received");

        // Stale game_id: self-heal the sender, then broadcast.
        {
            let room = self.game();
            if wire.game_id.is_some_and(|gid| gid != room.game_id) {
                let snapshot = room.snapshot();
                drop(room);
                warn!(
                    role = role.as_str(),
                    supplied = wire.game_id,
                    "stale game_id rejected"
                );
                self.send_error(id, "Stale or mismatched game_id; resyncing state");
                self.send_to(id, snapshot.build_message());
                self.broadcast(snapshot.build_message());
                return;
            }
        }

        let outcome = {
            let mut room = self.game();
            let mover = room.state.current_player();

            if role.player() != mover {
                self.send_error(
                    id,
                    &format!("It is {}'s turn", player_to_symbol(mover)),
                );
                MoveOutcome::Rejected {
                    snapshot: room.snapshot(),
                    broadcast: false,
                }
            } else if wire
                .move_id
                .is_some_and(|mid| mid <= room.last_move_ids[role.index().unwrap_or(0)])
            {
                self.send_error(id, "Duplicate or old move_id; resyncing state");
                MoveOutcome::Rejected {
                    snapshot: room.snapshot(),
                    broadcast: true,
                }
            } else {
                let legal = rules::legal_moves(&room.state);
                if !legal.contains(&wire.mv) {
                    let reason = explain_illegal(&room.state, &wire.mv, role.player());
                    warn!(
                        role = role.as_str(),
                        mv = %format_move(&wire.mv),
                        reason,
                        "illegal move rejected"
                    );
                    self.send_error(id, &format!("Illegal move: {reason}; resyncing state"));
                    MoveOutcome::Rejected {
                        snapshot: room.snapshot(),
                        broadcast: true,
                    }
                } else {
                    room.state.apply_move(&wire.mv);
                    room.last_move = format_move(&wire.mv);
                    if let (Some(mid), Some(index)) = (wire.move_id, role.index()) {
                        room.last_move_ids[index] = mid;
                    }
                    room.status = compute_status(&room.state, role.player());
                    let ended = room.status.is_terminal();
                    if ended {
                        self.record_result(&mut room);
                    }
                    MoveOutcome::Applied {
                        snapshot: room.snapshot(),
                        ended,
                    }
                }
            }
        };

        match outcome {
            MoveOutcome::Rejected {
                snapshot,
                broadcast,
            } => {
                self.send_to(id, snapshot.build_message());
                if broadcast {
                    self.broadcast(snapshot.build_message());
                }
            }
            MoveOutcome::Applied { snapshot, ended } => {
                if self.log_board {
                    info!("\n{}", render_board(&snapshot));
                }
                self.broadcast(snapshot.build_message());

                if ended && self.both_players_multi_game() {
                    tokio::time::sleep(REMATCH_DELAY).await;
                    let snapshot = {
                        let mut room = self.game();
                        // Continuous match: ready flags stay set.
                        self.reset_game(&mut room, false);
                        room.snapshot()
                    };
                    info!(game_id = snapshot.game_id, "auto rematch started");
                    self.broadcast(snapshot.build_message());
                }
            }
        }
    }

    /// ROLE <role|-> <name|-> <model> [multi]
    pub fn handle_role(&self, id: u64, payload: &str) {
        let mut tokens = payload.split_whitespace();
        let Some(role_token) = tokens.next() else {
            self.send_error(id, "ROLE requires a target role");
            return;
        };
        let name_token = tokens.next().unwrap_or("-");
        let _model = tokens.next();
        let multi = matches!(tokens.next(), Some("multi") | Some("multi_game"));

        let requested = match Role::parse_token(role_token) {
            Ok(requested) => requested,
            Err(()) => {
                self.send_error(id, &format!("Unknown role: {role_token}"));
                return;
            }
        };

        let (role, name) = {
            let mut clients = self.clients();
            let requested = {
                let current = clients.iter().find(|s| s.id == id).map(|s| s.role);
                requested.or(current).unwrap_or(Role::Spectator)
            };
            let in_use = requested.is_player()
                && clients
                    .iter()
                    .any(|s| s.active && s.id != id && s.role == requested);
            if in_use {
                drop(clients);
                self.send_error(id, &format!("{} already taken", requested.as_str()));
                return;
            }
            let Some(session) = clients.iter_mut().find(|s| s.id == id) else {
                return;
            };
            session.role = requested;
            if name_token != "-" {
                session.name = name_token.to_string();
            }
            session.multi_game = multi;
            (session.role, session.name.clone())
        };

        info!(role = role.as_str(), name = %name, multi, "role assigned");
        self.send_info(id, &format!("You are {} ({})", role.as_str(), name));

        let snapshot = self.game().snapshot();
        self.send_to(id, snapshot.build_message());
    }

    /// READY from a player; when both are ready a fresh game starts and
    /// the ready flags clear.
    pub fn handle_ready(&self, id: u64) {
        let Some(role) = self.session_role(id) else {
            return;
        };
        if !role.is_player() {
            self.send_error(id, "Spectators cannot ready up");
            return;
        }
        {
            let mut clients = self.clients();
            if let Some(session) = clients.iter_mut().find(|s| s.id == id) {
                session.ready = true;
            }
        }
        self.send_info(id, "Ready acknowledged");

        if !self.all_players_ready() {
            return;
        }

        let snapshot = {
            let mut room = self.game();
            self.reset_game(&mut room, true);
            room.snapshot()
        };
        info!(game_id = snapshot.game_id, "both players ready; new game");
        self.broadcast(snapshot.build_message());
    }

    /// Fresh game: initial position, bumped game_id, cleared move ids.
    /// Must be called with the game mutex held.
    fn reset_game(&self, room: &mut GameRoom, clear_ready_flags: bool) {
        room.state = GameState::new();
        room.last_move.clear();
        room.status = GameStatus::Ongoing;
        room.game_id += 1;
        room.last_move_ids = [0, 0];
        room.game_started = Instant::now();

        if clear_ready_flags {
            let mut clients = self.clients();
            for session in clients.iter_mut() {
                session.ready = false;
            }
        }
    }

    /// Record a finished game in the stats and the append-only results
    /// log. Must be called with the game mutex held.
    fn record_result(&self, room: &mut GameRoom) {
        let Some(winner) = room.status.winner_label() else {
            return;
        };
        {
            let clients = self.clients();
            for session in clients.iter().filter(|s| s.active) {
                match session.role {
                    Role::X => room.stats.x_name = session.name.clone(),
                    Role::O => room.stats.o_name = session.name.clone(),
                    Role::Spectator => {}
                }
            }
        }
        room.stats.total_games += 1;
        match winner {
            "X" => room.stats.x_wins += 1,
            "O" => room.stats.o_wins += 1,
            _ => room.stats.draws += 1,
        }

        let elapsed = room.game_started.elapsed().as_secs_f64();
        if let Some(file) = self
            .results_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            let _ = writeln!(
                file,
                "Game {} | Winner: {} | X({}) vs O({}) | Time: {:.1}s",
                room.stats.total_games, winner, room.stats.x_name, room.stats.o_name, elapsed
            );
            let _ = file.flush();
        }
        info!(
            game = room.stats.total_games,
            winner,
            x_wins = room.stats.x_wins,
            o_wins = room.stats.o_wins,
            draws = room.stats.draws,
            "game finished"
        );
    }

    fn session_role(&self, id: u64) -> Option<Role> {
        self.clients().iter().find(|s| s.id == id).map(|s| s.role)
    }

    fn all_players_ready(&self) -> bool {
        let clients = self.clients();
        let ready = |role| {
            clients
                .iter()
                .any(|s| s.active && s.role == role && s.ready)
        };
        ready(Role::X) && ready(Role::O)
    }

    fn both_players_multi_game(&self) -> bool {
        let clients = self.clients();
        let multi = |role| {
            clients
                .iter()
                .any(|s| s.active && s.role == role && s.multi_game)
        };
        multi(Role::X) && multi(Role::O)
    }

    fn send_info(&self, id: u64, text: &str) {
        self.send_to(id, format!("INFO {text}\n"));
    }

    fn send_error(&self, id: u64, text: &str) {
        self.send_to(id, format!("ERROR {text}\n"));
    }

    /// Queue a message for one session; a closed queue marks it inactive.
    fn send_to(&self, id: u64, message: String) {
        let mut clients = self.clients();
        if let Some(session) = clients.iter_mut().find(|s| s.id == id) {
            if session.tx.send(message).is_err() {
                session.active = false;
            }
        }
    }

    /// Queue a message for every active session, pruning dead ones.
    pub fn broadcast(&self, message: String) {
        let mut clients = self.clients();
        clients.retain_mut(|session| {
            if !session.active {
                return false;
            }
            if session.tx.send(message.clone()).is_err() {
                session.active = false;
                return false;
            }
            true
        });
    }
}

/// Status after `last_player` moved: their win (goal row reached or the
/// opponent has no reply), a repetition draw, or still ongoing.
fn compute_status(state: &GameState, last_player: Player) -> GameStatus {
    let winner = if last_player == Player::Black {
        GameStatus::XWin
    } else {
        GameStatus::OWin
    };
    if rules::is_win(state, last_player) {
        return winner;
    }
    // The opponent is now to move; no legal reply loses.
    if rules::is_loss(state) {
        return winner;
    }
    if rules::is_draw(state) {
        return GameStatus::Draw;
    }
    GameStatus::Ongoing
}

/// Best-effort human-readable reason for a move that is not in the
/// generated legal set.
fn explain_illegal(state: &GameState, mv: &Move, player: Player) -> String {
    let board = state.board();
    if !board.in_bounds(mv.sx, mv.sy) || !board.in_bounds(mv.dx, mv.dy) {
        return "Origin or target coordinate out of bounds".to_string();
    }
    let origin = board.at(mv.sx, mv.sy).occupant;
    if origin != player {
        let has = match origin {
            Player::None => "none".to_string(),
            other => player_to_symbol(other).to_string(),
        };
        return format!("Origin does not contain player's piece (has {has})");
    }
    let destination = board.at(mv.dx, mv.dy).occupant;
    if destination != Player::None {
        return format!("Destination occupied by {}", player_to_symbol(destination));
    }
    if let Some(placement) = mv.placement {
        if !board.in_bounds(placement.x, placement.y) {
            return "Tile placement coordinate out of bounds".to_string();
        }
        if board.at(placement.x, placement.y).tile != TileType::None {
            return format!(
                "Tile target {} already has a tile",
                contrast_protocol::format_coord(placement.x, placement.y)
            );
        }
        let inv = state.inventory(player);
        if placement.tile == TileType::Black && inv.black == 0 {
            return "No black tiles available in inventory".to_string();
        }
        if placement.tile == TileType::Gray && inv.gray == 0 {
            return "No gray tiles available in inventory".to_string();
        }
    }
    "Move not present in generated legal moves".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct TestClient {
        id: u64,
        role: Role,
        rx: UnboundedReceiver<String>,
    }

    impl TestClient {
        fn drain(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }

        fn drain_text(&mut self) -> String {
            self.drain().join("")
        }
    }

    fn connect(server: &Server) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let (id, role) = server.register(tx);
        TestClient { id, role, rx }
    }

    async fn connect_player(server: &Server, role: &str, name: &str) -> TestClient {
        let mut client = connect(server);
        server
            .handle_line(client.id, &format!("ROLE {role} {name} -"))
            .await;
        client.drain();
        client
    }

    fn field(message: &str, key: &str) -> Option<String> {
        message
            .lines()
            .find_map(|l| l.strip_prefix(&format!("{key}=")))
            .map(str::to_string)
    }

    #[tokio::test]
    async fn roles_are_assigned_in_order() {
        let server = Server::new(None, false);
        let a = connect(&server);
        let b = connect(&server);
        let c = connect(&server);
        assert_eq!(a.role, Role::X);
        assert_eq!(b.role, Role::O);
        assert_eq!(c.role, Role::Spectator);
    }

    #[tokio::test]
    async fn role_handshake_answers_info_and_state() {
        let server = Server::new(None, false);
        let mut client = connect(&server);
        server.handle_line(client.id, "ROLE X alice -").await;

        let text = client.drain_text();
        assert!(text.contains("INFO You are X (alice)"));
        assert!(text.contains("STATE\n"));
        assert!(text.contains("game_id=1"));
        assert!(text.contains("END\n"));
    }

    #[tokio::test]
    async fn taken_role_is_refused() {
        let server = Server::new(None, false);
        let _x = connect_player(&server, "X", "alice").await;
        let mut other = connect(&server);
        server.handle_line(other.id, "ROLE X bob -").await;
        assert!(other.drain_text().contains("ERROR X already taken"));
    }

    #[tokio::test]
    async fn first_move_is_applied_and_broadcast() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        let mut o = connect_player(&server, "O", "bob").await;

        // Scenario: Black moves a5 -> a4 ((0,0) -> (0,1)) without a tile.
        server.handle_line(x.id, "MOVE a5,a4 -1").await;

        let x_text = x.drain_text();
        let o_text = o.drain_text();
        for text in [&x_text, &o_text] {
            assert!(text.contains("turn=O"));
            assert!(text.contains("status=ongoing"));
            assert!(text.contains("last=a5,a4 -1"));
        }
        let pieces = field(&x_text, "pieces").unwrap();
        assert!(pieces.contains("a4:X"));
        assert!(!pieces.contains("a5:X"));
        let stock = field(&x_text, "stock_b").unwrap();
        assert!(stock.contains("X:3"));
    }

    #[tokio::test]
    async fn wrong_turn_gets_error_and_direct_resync() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        let mut o = connect_player(&server, "O", "bob").await;

        server.handle_line(o.id, "MOVE a1,a2 -1").await;

        let o_text = o.drain_text();
        assert!(o_text.contains("ERROR It is X's turn"));
        assert!(o_text.contains("STATE\n"));
        // The sender alone is resynced on a turn mismatch.
        assert!(x.drain_text().is_empty());
    }

    #[tokio::test]
    async fn stale_game_id_rejected_without_state_change() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        let _o = connect_player(&server, "O", "bob").await;

        server.handle_line(x.id, "MOVE a5,a4 -1 99 1").await;

        let text = x.drain_text();
        assert!(text.contains("ERROR Stale or mismatched game_id; resyncing state"));
        let pieces = field(&text, "pieces").unwrap();
        assert!(pieces.contains("a5:X"), "position must be unchanged");
        assert_eq!(server.game().state.current_player(), Player::Black);
    }

    #[tokio::test]
    async fn duplicate_move_id_is_idempotent() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        let mut o = connect_player(&server, "O", "bob").await;

        server.handle_line(x.id, "MOVE a5,a4 -1 1 1").await;
        let first = x.drain_text();
        let first_pieces = field(&first, "pieces").unwrap();
        o.drain();

        // White answers, then X replays its old move_id out of turn order.
        server.handle_line(o.id, "MOVE e1,e2 -1 1 1").await;
        o.drain();
        x.drain();
        server.handle_line(x.id, "MOVE a4,a3 -1 1 1").await;

        let replay = x.drain_text();
        assert!(replay.contains("ERROR Duplicate or old move_id; resyncing state"));
        // The a4 piece from the first accepted move is still in place.
        let pieces = field(&replay, "pieces").unwrap();
        assert!(first_pieces.contains("a4:X"));
        assert!(pieces.contains("a4:X"));
        assert!(!pieces.contains("a3:X"));
    }

    #[tokio::test]
    async fn illegal_move_reports_reason_and_resyncs() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        let _o = connect_player(&server, "O", "bob").await;

        // Destination holds X's own piece.
        server.handle_line(x.id, "MOVE a5,b5 -1").await;
        let text = x.drain_text();
        assert!(text.contains("ERROR Illegal move: Destination occupied by X"));
        assert!(text.contains("STATE\n"));

        // Origin holds no piece of X's.
        server.handle_line(x.id, "MOVE c3,c4 -1").await;
        let text = x.drain_text();
        assert!(text.contains("Origin does not contain player's piece (has none)"));
    }

    #[tokio::test]
    async fn spectators_cannot_move_or_ready() {
        let server = Server::new(None, false);
        let _x = connect_player(&server, "X", "alice").await;
        let _o = connect_player(&server, "O", "bob").await;
        let mut spec = connect_player(&server, "spec", "carol").await;

        server.handle_line(spec.id, "MOVE a5,a4 -1").await;
        assert!(spec
            .drain_text()
            .contains("ERROR Spectators cannot submit moves"));

        server.handle_line(spec.id, "READY").await;
        assert!(spec.drain_text().contains("ERROR Spectators cannot ready up"));
    }

    #[tokio::test]
    async fn ready_handshake_starts_fresh_game() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        let mut o = connect_player(&server, "O", "bob").await;

        server.handle_line(x.id, "MOVE a5,a4 -1").await;
        x.drain();
        o.drain();

        server.handle_line(x.id, "READY").await;
        assert!(x.drain_text().contains("INFO Ready acknowledged"));
        server.handle_line(o.id, "READY").await;

        let text = o.drain_text();
        assert!(text.contains("game_id=2"));
        let pieces = field(&text, "pieces").unwrap();
        assert!(pieces.contains("a5:X"), "board must be back to initial");

        // READY-triggered resets clear the flags again.
        let clients = server.clients();
        assert!(clients.iter().all(|s| !s.ready));
    }

    #[tokio::test]
    async fn winning_move_sets_status_and_logs_result() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        let _o = connect_player(&server, "O", "bob").await;

        // Fabricated terminal-adjacent position: Black piece at (2,3),
        // whose c2 -> c1 step reaches the goal row.
        {
            let mut room = server.game();
            let mut state = GameState::new();
            *state.board_mut() = contrast_core::Board::empty();
            state.board_mut().at_mut(2, 3).occupant = Player::Black;
            state.board_mut().at_mut(0, 4).occupant = Player::White;
            room.state = state;
        }

        server.handle_line(x.id, "MOVE c2,c1 -1").await;
        let text = x.drain_text();
        assert!(text.contains("status=X_win"));
        assert_eq!(server.game().stats.x_wins, 1);
        assert_eq!(server.game().stats.total_games, 1);
    }

    #[tokio::test]
    async fn multi_game_rematch_bumps_game_id_once() {
        let server = Server::new(None, false);
        let mut x = connect(&server);
        let mut o = connect(&server);
        server.handle_line(x.id, "ROLE X alice - multi").await;
        server.handle_line(o.id, "ROLE O bob - multi").await;
        x.drain();
        o.drain();

        {
            let mut room = server.game();
            let mut state = GameState::new();
            *state.board_mut() = contrast_core::Board::empty();
            state.board_mut().at_mut(2, 3).occupant = Player::Black;
            state.board_mut().at_mut(0, 4).occupant = Player::White;
            room.state = state;
        }

        server.handle_line(x.id, "MOVE c2,c1 -1").await;

        let messages = o.drain();
        let terminal = messages
            .iter()
            .find(|m| m.contains("status=X_win"))
            .expect("terminal snapshot");
        assert!(terminal.contains("game_id=1"));
        let reset = messages
            .iter()
            .find(|m| m.contains("game_id=2"))
            .expect("rematch snapshot");
        assert!(reset.contains("status=ongoing"));
        let pieces = field(reset, "pieces").unwrap();
        assert!(pieces.contains("a5:X") && pieces.contains("e1:O"));
        assert_eq!(server.game().game_id, 2);

        // The rematch accepts Black's first move without another READY.
        server.handle_line(x.id, "MOVE a5,a4 -1").await;
        let text = x.drain_text();
        assert!(text.contains("status=ongoing"));
        assert!(text.contains("last=a5,a4 -1"));
    }

    #[tokio::test]
    async fn disconnecting_all_players_soft_resets() {
        let server = Server::new(None, false);
        let x = connect_player(&server, "X", "alice").await;
        let o = connect_player(&server, "O", "bob").await;

        server.handle_line(x.id, "MOVE a5,a4 -1").await;
        let game_id = server.game().game_id;

        server.disconnect(x.id);
        server.disconnect(o.id);

        let room = server.game();
        assert_eq!(room.game_id, game_id, "soft reset keeps game_id");
        assert_eq!(room.state.current_player(), Player::Black);
        assert_eq!(room.state.board().at(0, 0).occupant, Player::Black);
        assert!(room.last_move.is_empty());
    }

    #[tokio::test]
    async fn get_stats_reports_counters() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        server.handle_line(x.id, "GET_STATS").await;
        assert!(x
            .drain_text()
            .contains("STATS games=0 x_wins=0 o_wins=0 draws=0"));
    }

    #[tokio::test]
    async fn unknown_commands_keep_session_alive() {
        let server = Server::new(None, false);
        let mut x = connect_player(&server, "X", "alice").await;
        server.handle_line(x.id, "TELEPORT a1").await;
        assert!(x.drain_text().contains("ERROR Unknown command: TELEPORT a1"));

        server.handle_line(x.id, "GET_STATE").await;
        assert!(x.drain_text().contains("STATE\n"));
    }

    #[test]
    fn illegal_reasons_cover_tile_cases() {
        let mut state = GameState::new();
        state.board_mut().at_mut(2, 2).tile = TileType::Gray;
        state.inventory_mut(Player::Black).gray = 0;

        let tiled = Move::step(0, 0, 0, 1).with_placement(2, 2, TileType::Black);
        assert!(explain_illegal(&state, &tiled, Player::Black).contains("already has a tile"));

        let no_stock = Move::step(0, 0, 0, 1).with_placement(3, 3, TileType::Gray);
        assert_eq!(
            explain_illegal(&state, &no_stock, Player::Black),
            "No gray tiles available in inventory"
        );

        let oob = Move::step(0, 0, 0, 1).with_placement(7, 7, TileType::Black);
        assert!(explain_illegal(&state, &oob, Player::Black).contains("out of bounds"));
    }

    #[test]
    fn compute_status_variants() {
        // Goal row reached by the mover.
        let mut state = GameState::new();
        *state.board_mut() = contrast_core::Board::empty();
        state.board_mut().at_mut(1, 4).occupant = Player::Black;
        state.board_mut().at_mut(4, 2).occupant = Player::White;
        let state = state.with_side_to_move(Player::White);
        assert_eq!(compute_status(&state, Player::Black), GameStatus::XWin);

        // Opponent with no reply loses: White is boxed in mid-board.
        let mut state = GameState::new();
        *state.board_mut() = contrast_core::Board::empty();
        state.board_mut().at_mut(0, 2).occupant = Player::White;
        state.board_mut().at_mut(0, 1).occupant = Player::Black;
        state.board_mut().at_mut(0, 3).occupant = Player::Black;
        state.board_mut().at_mut(1, 2).occupant = Player::Black;
        let state = state.with_side_to_move(Player::White);
        assert_eq!(compute_status(&state, Player::Black), GameStatus::XWin);

        // Still ongoing in the initial position.
        assert_eq!(
            compute_status(&GameState::new(), Player::White),
            GameStatus::Ongoing
        );
    }
}
