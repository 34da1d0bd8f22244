//! Automatic play driven by server snapshots.

use tracing::{debug, warn};

use contrast_ai::network::load_network_from_env;
use contrast_ai::policy::ModelSpec;
use contrast_ai::{NTupleNetwork, Policy};
use contrast_protocol::{format_move, GameStatus, StateSnapshot};

/// Wraps a policy and decides, per snapshot, whether it is time to submit
/// a move. Each submission is tagged with the snapshot's game_id and a
/// per-game monotonically increasing move_id, and resubmission is held
/// back until the server resolves the turn.
pub struct AutoPlayer {
    policy: Box<dyn Policy>,
    model_name: String,
    role: Option<char>,
    awaiting_turn_resolution: bool,
    game_id: u64,
    next_move_id: u64,
}

impl AutoPlayer {
    /// Build the agent for a parsed model spec; `Manual` has no agent.
    pub fn create(spec: ModelSpec, model_name: &str) -> Option<Self> {
        let network = match spec {
            ModelSpec::NTuple | ModelSpec::AlphaBeta(_) | ModelSpec::Mcts(_) => {
                load_network_from_env()
            }
            _ => NTupleNetwork::new(),
        };
        let policy = spec.into_policy(network)?;
        Some(Self {
            policy,
            model_name: model_name.to_string(),
            role: None,
            awaiting_turn_resolution: false,
            game_id: 0,
            next_move_id: 1,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Called with the symbol from the server's `You are ...` reply.
    pub fn set_role(&mut self, symbol: char) {
        let symbol = symbol.to_ascii_uppercase();
        self.role = matches!(symbol, 'X' | 'O').then_some(symbol);
        self.awaiting_turn_resolution = false;
    }

    /// React to an authoritative snapshot; returns the full `MOVE` line
    /// to send when it is our turn to act.
    pub fn on_snapshot(&mut self, snapshot: &StateSnapshot) -> Option<String> {
        if snapshot.game_id != self.game_id {
            // New game: move ids restart from one.
            self.game_id = snapshot.game_id;
            self.next_move_id = 1;
            self.awaiting_turn_resolution = false;
        }

        let Some(role) = self.role else {
            return None;
        };
        if snapshot.status != GameStatus::Ongoing
            || snapshot.turn.to_ascii_uppercase() != role
        {
            self.awaiting_turn_resolution = false;
            return None;
        }
        if self.awaiting_turn_resolution {
            return None;
        }

        let state = match snapshot.to_state() {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "snapshot could not be reconstructed");
                return None;
            }
        };
        let mv = self.policy.pick(&state)?;

        let move_id = self.next_move_id;
        self.next_move_id += 1;
        self.awaiting_turn_resolution = true;

        let line = format!(
            "MOVE {} {} {}",
            format_move(&mv),
            snapshot.game_id,
            move_id
        );
        debug!(model = %self.model_name, line, "auto move");
        Some(line)
    }
}
