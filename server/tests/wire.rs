//! End-to-end protocol tests against a live server on a loopback socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use contrast_protocol::StateSnapshot;
use contrast_server::{net, Server};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(Server::new(None, false));
    tokio::spawn(net::serve(listener, server));
    addr
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let socket = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = socket.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn read_line(&mut self) -> String {
        timeout(READ_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("connection closed")
    }

    /// Read forward to the next STATE block and parse it.
    async fn read_state(&mut self) -> StateSnapshot {
        loop {
            if self.read_line().await == "STATE" {
                break;
            }
        }
        let mut block = Vec::new();
        loop {
            let line = self.read_line().await;
            if line == "END" {
                break;
            }
            block.push(line);
        }
        StateSnapshot::parse_block(&block).unwrap()
    }

    /// Read forward to the next ERROR line and return its payload.
    async fn read_error(&mut self) -> String {
        loop {
            let line = self.read_line().await;
            if let Some(payload) = line.strip_prefix("ERROR ") {
                return payload.to_string();
            }
        }
    }
}

#[tokio::test]
async fn handshake_move_and_broadcast() {
    let addr = start_server().await;

    let mut x = Client::connect(addr).await;
    x.send("ROLE X alice -").await;
    let info = x.read_line().await;
    assert_eq!(info, "INFO You are X (alice)");
    let snapshot = x.read_state().await;
    assert_eq!(snapshot.game_id, 1);
    assert_eq!(snapshot.turn, 'X');
    assert_eq!(snapshot.pieces.get("c5"), Some(&'X'));

    let mut o = Client::connect(addr).await;
    o.send("ROLE O bob -").await;
    assert_eq!(o.read_line().await, "INFO You are O (bob)");
    o.read_state().await;

    // Black opens with a5 -> a4, tagged with the current game and move id.
    x.send("MOVE a5,a4 -1 1 1").await;
    let x_view = x.read_state().await;
    let o_view = o.read_state().await;
    for view in [&x_view, &o_view] {
        assert_eq!(view.turn, 'O');
        assert_eq!(view.last_move, "a5,a4 -1");
        assert_eq!(view.pieces.get("a4"), Some(&'X'));
        assert!(!view.pieces.contains_key("a5"));
        assert_eq!(view.status.to_string(), "ongoing");
    }
}

#[tokio::test]
async fn stale_game_id_gets_error_then_resync() {
    let addr = start_server().await;

    let mut x = Client::connect(addr).await;
    x.send("ROLE X alice -").await;
    x.read_line().await;
    x.read_state().await;

    x.send("MOVE a5,a4 -1 99 1").await;
    let error = x.read_error().await;
    assert!(error.contains("game_id"), "got: {error}");
    let snapshot = x.read_state().await;
    assert_eq!(snapshot.pieces.get("a5"), Some(&'X'), "state unchanged");
    assert_eq!(snapshot.game_id, 1);
}

#[tokio::test]
async fn replayed_move_is_rejected_with_resync() {
    let addr = start_server().await;

    let mut x = Client::connect(addr).await;
    x.send("ROLE X alice -").await;
    x.read_line().await;
    x.read_state().await;
    let mut o = Client::connect(addr).await;
    o.send("ROLE O bob -").await;
    o.read_line().await;
    o.read_state().await;

    x.send("MOVE a5,a4 -1 1 1").await;
    let after_first = x.read_state().await;
    o.read_state().await;

    // Retransmit of the identical submission: the turn has passed to O,
    // so the replay is rejected and answered with the same authoritative
    // snapshot.
    x.send("MOVE a5,a4 -1 1 1").await;
    let error = x.read_error().await;
    assert!(error.contains("turn"), "got: {error}");
    let resynced = x.read_state().await;
    assert_eq!(resynced.pieces, after_first.pieces);
    assert_eq!(resynced.game_id, after_first.game_id);
}

#[tokio::test]
async fn queries_answer_without_disturbing_play() {
    let addr = start_server().await;

    let mut x = Client::connect(addr).await;
    x.send("ROLE X alice -").await;
    x.read_line().await;
    x.read_state().await;

    x.send("GET_STATE").await;
    let snapshot = x.read_state().await;
    assert_eq!(snapshot.game_id, 1);

    x.send("GET_STATS").await;
    let line = x.read_line().await;
    assert_eq!(line, "STATS games=0 x_wins=0 o_wins=0 draws=0");

    x.send("HELLO?").await;
    let error = x.read_error().await;
    assert!(error.contains("Unknown command"));
}
