//! Accept loop and per-connection tasks.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::server::Server;

/// Accept connections forever, one task per client.
pub async fn serve(listener: TcpListener, server: Arc<Server>) {
    loop {
        match listener.accept().await {
            Ok((socket, _)) => {
                tokio::spawn(handle_connection(Arc::clone(&server), socket));
            }
            Err(err) => {
                error!(error = %err, "accept failed");
            }
        }
    }
}

/// Read lines from one client and feed them to the server; a writer task
/// drains the session's outbound queue so no handler ever blocks on the
/// socket.
pub async fn handle_connection(server: Arc<Server>, socket: TcpStream) {
    let peer = socket.peer_addr().ok();
    let (read_half, mut write_half) = socket.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if write_half.write_all(message.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let (id, role) = server.register(tx);
    info!(?peer, role = role.as_str(), "client connected");

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end_matches('\r');
                if line.is_empty() {
                    continue;
                }
                server.handle_line(id, line).await;
            }
            Ok(None) => break,
            Err(err) => {
                warn!(?peer, error = %err, "read failed");
                break;
            }
        }
    }

    server.disconnect(id);
    writer.abort();
    info!(?peer, "connection closed");
}
