//! Connected-client sessions and role bookkeeping.

use contrast_core::Player;
use tokio::sync::mpsc::UnboundedSender;

/// Seat taken by a connection. At most one X and one O exist at a time;
/// everyone else spectates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    X,
    O,
    Spectator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::X => "X",
            Role::O => "O",
            Role::Spectator => "spectator",
        }
    }

    /// The side this role plays; spectators play none.
    pub fn player(self) -> Player {
        match self {
            Role::X => Player::Black,
            Role::O => Player::White,
            Role::Spectator => Player::None,
        }
    }

    pub fn is_player(self) -> bool {
        matches!(self, Role::X | Role::O)
    }

    /// Index into per-player-role tables.
    pub fn index(self) -> Option<usize> {
        match self {
            Role::X => Some(0),
            Role::O => Some(1),
            Role::Spectator => None,
        }
    }

    /// Parse a ROLE command token. `-` means "keep the current role" and
    /// parses to `None`; unknown tokens are an error.
    pub fn parse_token(token: &str) -> Result<Option<Role>, ()> {
        match token.to_ascii_uppercase().as_str() {
            "-" => Ok(None),
            "X" => Ok(Some(Role::X)),
            "O" => Ok(Some(Role::O)),
            "SPECTATOR" | "SPEC" => Ok(Some(Role::Spectator)),
            _ => Err(()),
        }
    }
}

/// One connected client. All fields are guarded by the server's clients
/// mutex; the sender feeds the connection's writer task.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub role: Role,
    pub name: String,
    pub ready: bool,
    pub multi_game: bool,
    pub active: bool,
    pub tx: UnboundedSender<String>,
}

impl Session {
    pub fn new(id: u64, role: Role, tx: UnboundedSender<String>) -> Self {
        Self {
            id,
            role,
            name: "anon".to_string(),
            ready: false,
            multi_game: false,
            active: true,
            tx,
        }
    }
}
