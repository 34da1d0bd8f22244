//! Monte Carlo tree search with UCB1 selection and network leaf evaluation.
//!
//! The tree is arena-allocated: nodes live in a contiguous vector and refer
//! to each other by index, parents as non-owning back-references. Each node
//! stores its total value in its own side-to-move's viewpoint, so selection
//! negates the child average and backpropagation negates per ply. The tree
//! is dropped at the end of every search call.

use std::time::{Duration, Instant};

use tracing::debug;

use contrast_core::rules;
use contrast_core::{GameState, Move, Player};

use crate::network::NTupleNetwork;
use crate::policy::{Policy, DEFAULT_MCTS_ITERATIONS};

/// Default exploration constant, sqrt(2).
pub const DEFAULT_EXPLORATION: f32 = 1.414;

/// Evaluations are squashed into (-1, 1) with tanh(eval / SQUASH_SCALE).
const SQUASH_SCALE: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug)]
struct Node {
    state: GameState,
    incoming: Option<Move>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    visits: u32,
    total_value: f32,
    is_terminal: bool,
    is_expanded: bool,
}

impl Node {
    fn new(state: GameState, incoming: Option<Move>, parent: Option<NodeId>) -> Self {
        let is_terminal = is_terminal(&state);
        Self {
            state,
            incoming,
            parent,
            children: Vec::new(),
            visits: 0,
            total_value: 0.0,
            is_terminal,
            is_expanded: false,
        }
    }
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn allocate(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// UCB1 score of a child in its parent's viewpoint; unvisited children
    /// score +infinity.
    fn ucb1(&self, child_id: NodeId, parent_visits: u32, exploration: f32) -> f32 {
        let child = self.get(child_id);
        if child.visits == 0 {
            return f32::INFINITY;
        }
        let exploitation = -(child.total_value / child.visits as f32);
        let ln_parent = (parent_visits.max(1) as f32).ln();
        exploitation + exploration * (ln_parent / child.visits as f32).sqrt()
    }

    fn select_child(&self, id: NodeId, exploration: f32) -> Option<NodeId> {
        let node = self.get(id);
        let mut best = None;
        let mut best_score = f32::NEG_INFINITY;
        for &child_id in &node.children {
            let score = self.ucb1(child_id, node.visits, exploration);
            if score > best_score {
                best_score = score;
                best = Some(child_id);
            }
        }
        best
    }

    fn expand(&mut self, id: NodeId) {
        let moves = {
            let node = self.get(id);
            if node.is_terminal || node.is_expanded {
                return;
            }
            rules::legal_moves(&node.state)
        };

        if moves.is_empty() {
            let node = self.get_mut(id);
            node.is_terminal = true;
            node.is_expanded = true;
            return;
        }

        for mv in moves {
            let mut next = self.get(id).state.clone();
            next.apply_move(&mv);
            let child = Node::new(next, Some(mv), Some(id));
            let child_id = self.allocate(child);
            self.get_mut(id).children.push(child_id);
        }
        self.get_mut(id).is_expanded = true;
    }

    fn backpropagate(&mut self, leaf: NodeId, value: f32) {
        let mut current = Some(leaf);
        let mut value = value;
        while let Some(id) = current {
            let node = self.get_mut(id);
            node.visits += 1;
            node.total_value += value;
            value = -value;
            current = node.parent;
        }
    }
}

/// MCTS agent over a snapshot of the N-tuple network.
#[derive(Debug)]
pub struct Mcts {
    network: NTupleNetwork,
    exploration: f32,
    iterations: u32,
}

impl Mcts {
    pub fn new(network: NTupleNetwork) -> Self {
        Self {
            network,
            exploration: DEFAULT_EXPLORATION,
            iterations: DEFAULT_MCTS_ITERATIONS,
        }
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn set_exploration_constant(&mut self, c: f32) {
        self.exploration = c;
    }

    pub fn network_mut(&mut self) -> &mut NTupleNetwork {
        &mut self.network
    }

    /// Run `iterations` simulations (bounded by the optional wall-clock
    /// budget) and return the most-visited root child's move, ties broken
    /// by the first encountered.
    pub fn search(
        &mut self,
        state: &GameState,
        iterations: u32,
        time_budget: Option<Duration>,
    ) -> Option<Move> {
        let deadline = time_budget.map(|budget| Instant::now() + budget);

        let mut tree = Tree::default();
        let root = tree.allocate(Node::new(state.clone(), None, None));
        tree.expand(root);
        if tree.get(root).children.is_empty() {
            return None;
        }

        for iteration in 0..iterations {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    debug!(iteration, "mcts deadline reached");
                    break;
                }
            }
            self.simulate_once(&mut tree, root);
        }

        let root_node = tree.get(root);
        let mut best: Option<NodeId> = None;
        let mut best_visits = 0;
        for &child in &root_node.children {
            let visits = tree.get(child).visits;
            if best.is_none() || visits > best_visits {
                best = Some(child);
                best_visits = visits;
            }
        }
        let best = best?;
        debug!(
            visits = tree.get(best).visits,
            root_visits = root_node.visits,
            nodes = tree.nodes.len(),
            "mcts search complete"
        );
        tree.get(best).incoming
    }

    fn simulate_once(&self, tree: &mut Tree, root: NodeId) {
        // Selection: descend through expanded non-terminal nodes.
        let mut node_id = root;
        loop {
            let node = tree.get(node_id);
            if node.is_terminal || !node.is_expanded || node.children.is_empty() {
                break;
            }
            match tree.select_child(node_id, self.exploration) {
                Some(child) => node_id = child,
                None => break,
            }
        }

        // Expansion: a visited non-terminal leaf grows its children and
        // the first one becomes the simulation target.
        if tree.get(node_id).visits > 0 && !tree.get(node_id).is_terminal {
            tree.expand(node_id);
            if let Some(&first) = tree.get(node_id).children.first() {
                node_id = first;
            }
        }

        let value = self.simulate(tree.get(node_id));
        tree.backpropagate(node_id, value);
    }

    /// Leaf value in the leaf's side-to-move viewpoint: exact ±1 for
    /// terminals, squashed network evaluation otherwise.
    fn simulate(&self, node: &Node) -> f32 {
        if node.is_terminal {
            return evaluate_terminal(&node.state);
        }
        (self.network.evaluate(&node.state) / SQUASH_SCALE).tanh()
    }
}

fn is_terminal(state: &GameState) -> bool {
    rules::is_win(state, Player::Black)
        || rules::is_win(state, Player::White)
        || rules::legal_moves(state).is_empty()
}

fn evaluate_terminal(state: &GameState) -> f32 {
    for player in [Player::Black, Player::White] {
        if rules::is_win(state, player) {
            return if state.current_player() == player {
                1.0
            } else {
                -1.0
            };
        }
    }
    // No legal moves: the side to move has lost.
    -1.0
}

impl Policy for Mcts {
    fn pick(&mut self, state: &GameState) -> Option<Move> {
        self.search(state, self.iterations, None)
    }
}
