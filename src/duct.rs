// Decoupled UCT over joint moves
//
// Every node is a full board. Each snake keeps its own per-direction
// statistics at the node and picks its UCB1 move independently of the others;
// the picks together form the joint move that leads to the child board.
// Nodes live in a transposition table keyed by BoardState, so boards reached
// along different paths share one entry.

use log::trace;
use rand::{Rng, RngCore};
use std::collections::{BTreeMap, HashMap};

use crate::geometry::Direction;
use crate::moves::safe_moves_or_default;
use crate::rollout::{evaluate, playout, Rewards};
use crate::search::{best_by_mean, ucb1, ActionStats, MoveSearch, SearchSettings};
use crate::simulator::{BoardState, JointMove, SnakeId};

#[derive(Debug, Clone)]
pub struct DuctNode {
    pub visits: u32,
    pub stats: BTreeMap<SnakeId, [ActionStats; 4]>,
    /// Set once every joint move from this board has a child in the tree
    fully_expanded: bool,
}

impl DuctNode {
    fn new(board: &BoardState) -> Self {
        DuctNode {
            visits: 0,
            stats: board
                .snakes()
                .keys()
                .map(|&id| (id, [ActionStats::default(); 4]))
                .collect(),
            fully_expanded: false,
        }
    }

    fn record(&mut self, joint: &JointMove, rewards: &Rewards) {
        self.visits += 1;
        for (id, dir) in joint {
            if let Some(stats) = self.stats.get_mut(id) {
                let entry = &mut stats[dir.index()];
                entry.visits += 1;
                entry.total_reward += rewards.get(id).copied().unwrap_or(0.0);
            }
        }
    }
}

/// Cartesian product of every live snake's safe moves
///
/// A snake with no safe move contributes `[Up]` so the product is never empty.
pub fn joint_actions(board: &BoardState) -> Vec<JointMove> {
    let mut joints = vec![JointMove::new()];
    for &id in board.snakes().keys() {
        let options = safe_moves_or_default(board, id);
        joints = joints
            .into_iter()
            .flat_map(|partial| {
                options.iter().map(move |&dir| {
                    let mut joint = partial.clone();
                    joint.insert(id, dir);
                    joint
                })
            })
            .collect();
    }
    joints
}

pub struct DuctSearch {
    root: BoardState,
    you: SnakeId,
    participants: Vec<SnakeId>,
    tree: HashMap<BoardState, DuctNode>,
    settings: SearchSettings,
}

impl DuctSearch {
    /// Starts a fresh tree rooted at a food-free copy of `board`
    pub fn new(board: &BoardState, you: SnakeId, settings: SearchSettings) -> Self {
        let root = board.without_food_spawning();
        let mut tree = HashMap::new();
        tree.insert(root.clone(), DuctNode::new(&root));

        DuctSearch {
            participants: root.snake_ids(),
            root,
            you,
            tree,
            settings,
        }
    }

    pub fn node(&self, board: &BoardState) -> Option<&DuctNode> {
        self.tree.get(board)
    }

    pub fn root(&self) -> &BoardState {
        &self.root
    }

    /// Picks a random joint move whose child board is not in the tree yet
    fn pick_unexplored<R: Rng + ?Sized>(
        &mut self,
        board: &BoardState,
        rng: &mut R,
    ) -> Option<(JointMove, BoardState)> {
        if self.tree.get(board).map_or(true, |node| node.fully_expanded) {
            return None;
        }

        let mut unexplored: Vec<(JointMove, BoardState)> = joint_actions(board)
            .into_iter()
            .map(|joint| {
                let child = board.apply(&joint, rng);
                (joint, child)
            })
            .filter(|(_, child)| !self.tree.contains_key(child))
            .collect();

        if unexplored.is_empty() {
            if let Some(node) = self.tree.get_mut(board) {
                node.fully_expanded = true;
            }
            return None;
        }

        let pick = rng.random_range(0..unexplored.len());
        Some(unexplored.swap_remove(pick))
    }

    /// Independent UCB1 choice for every snake on `board`
    fn select(&self, board: &BoardState, node: &DuctNode) -> JointMove {
        let c = self.settings.exploration_constant;

        board
            .snakes()
            .keys()
            .map(|&id| {
                let stats = node.stats.get(&id);
                let choice = safe_moves_or_default(board, id)
                    .into_iter()
                    .map(|dir| {
                        let s = stats.map(|s| s[dir.index()]).unwrap_or_default();
                        (dir, ucb1(s.total_reward, s.visits, node.visits, c))
                    })
                    .fold(None, |best: Option<(Direction, f64)>, (dir, score)| match best {
                        Some((_, best_score)) if best_score >= score => best,
                        _ => Some((dir, score)),
                    })
                    .map(|(dir, _)| dir)
                    .unwrap_or(Direction::Up);
                (id, choice)
            })
            .collect()
    }

    fn run_simulation<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut board = self.root.clone();
        let mut path: Vec<(BoardState, JointMove)> = Vec::new();

        let rewards = loop {
            if board.winner().is_terminal() {
                break evaluate(&board, &self.participants);
            }

            if !self.tree.contains_key(&board) {
                let mut node = DuctNode::new(&board);
                node.visits = 1;
                self.tree.insert(board.clone(), node);
                break playout(&board, &self.participants, &self.settings.rollout, rng);
            }

            if let Some((joint, child)) = self.pick_unexplored(&board, rng) {
                trace!("expanding {:?}", joint);
                let rewards = playout(&child, &self.participants, &self.settings.rollout, rng);
                let mut node = DuctNode::new(&child);
                node.visits = 1;
                self.tree.insert(child, node);
                path.push((board, joint));
                break rewards;
            }

            let joint = match self.tree.get(&board) {
                Some(node) => self.select(&board, node),
                None => break evaluate(&board, &self.participants),
            };
            let child = board.apply(&joint, rng);
            path.push((board, joint));
            board = child;
        };

        for (board, joint) in path.iter().rev() {
            if let Some(node) = self.tree.get_mut(board) {
                node.record(joint, &rewards);
            }
        }
    }
}

impl MoveSearch for DuctSearch {
    fn simulate(&mut self, rng: &mut dyn RngCore) {
        self.run_simulation(rng);
    }

    fn best_move(&self) -> Option<Direction> {
        best_by_mean(self.root_stats())
    }

    fn root_stats(&self) -> Vec<(Direction, ActionStats)> {
        let stats = self
            .tree
            .get(&self.root)
            .and_then(|node| node.stats.get(&self.you));

        match stats {
            Some(stats) => Direction::all()
                .into_iter()
                .map(|dir| (dir, stats[dir.index()]))
                .collect(),
            None => Vec::new(),
        }
    }

    fn tree_size(&self) -> usize {
        self.tree.len()
    }
}
