// Sequential UCT
//
// One simultaneous tick is split into one decision per snake. TurnState wraps
// the board with a fixed turn order, the moves buffered so far this tick and
// the index of the snake to move next. Only the last decision of a tick calls
// `step`; every earlier one just fills the buffer. The tree branches on a
// single snake's moves, which keeps the branching factor at four or less.

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::{BTreeMap, HashMap};

use crate::geometry::Direction;
use crate::moves::safe_moves_or_default;
use crate::rollout::{evaluate, playout_for, policy_move, Rewards};
use crate::search::{best_by_mean, ucb1, ActionStats, MoveSearch, SearchSettings};
use crate::simulator::{BoardState, JointMove, SnakeId};

/// Board plus partial-turn bookkeeping; also the tree key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TurnState {
    pub board: BoardState,
    /// Live snakes in decision order, rotated so the searching snake is first
    pub order: Vec<SnakeId>,
    pub pending: JointMove,
    pub cursor: usize,
}

impl TurnState {
    pub fn new(board: BoardState, first: SnakeId) -> Self {
        let mut order = board.snake_ids();
        if let Some(pos) = order.iter().position(|id| *id == first) {
            order.rotate_left(pos);
        }

        TurnState {
            board,
            order,
            pending: JointMove::new(),
            cursor: 0,
        }
    }

    /// Snake whose move is pending, None once the game is over
    pub fn acting(&self) -> Option<SnakeId> {
        if self.is_terminal() {
            return None;
        }
        self.order.get(self.cursor).copied()
    }

    /// Candidate moves of the acting snake, judged on the board at turn start
    pub fn actions(&self) -> Vec<Direction> {
        match self.acting() {
            Some(id) => safe_moves_or_default(&self.board, id),
            None => Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.board.winner().is_terminal()
    }

    /// Records `dir` for the acting snake and steps the board once every
    /// snake in the turn order has moved
    pub fn take<R: Rng + ?Sized>(&self, dir: Direction, rng: &mut R) -> TurnState {
        let mut next = self.clone();
        let Some(id) = self.acting() else {
            return next;
        };

        next.pending.insert(id, dir);
        next.cursor += 1;

        if next.cursor == next.order.len() {
            next.board.step(&next.pending, rng);
            next.pending.clear();
            next.cursor = 0;
            let board = &next.board;
            next.order.retain(|id| board.snake(*id).is_some());
        }
        next
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuctNode {
    pub visits: u32,
    /// Cumulative reward per snake over every simulation through this node
    pub rewards: BTreeMap<SnakeId, f64>,
}

impl SuctNode {
    fn record(&mut self, rewards: &Rewards) {
        self.visits += 1;
        for (id, reward) in rewards {
            *self.rewards.entry(*id).or_insert(0.0) += reward;
        }
    }

    fn stats_for(&self, id: SnakeId) -> ActionStats {
        ActionStats {
            visits: self.visits,
            total_reward: self.rewards.get(&id).copied().unwrap_or(0.0),
        }
    }
}

pub struct SuctSearch {
    root: TurnState,
    you: SnakeId,
    participants: Vec<SnakeId>,
    /// Child state reached from the root by each of `you`'s moves
    root_children: Vec<(Direction, TurnState)>,
    tree: HashMap<TurnState, SuctNode>,
    settings: SearchSettings,
}

impl SuctSearch {
    pub fn new(board: &BoardState, you: SnakeId, settings: SearchSettings) -> Self {
        let root = TurnState::new(board.without_food_spawning(), you);

        // Transitions without food spawning never draw from the generator
        let mut rng = StdRng::seed_from_u64(0);
        let root_children = if root.acting() == Some(you) {
            root.actions()
                .into_iter()
                .map(|dir| (dir, root.take(dir, &mut rng)))
                .collect()
        } else {
            Vec::new()
        };

        let mut tree = HashMap::new();
        tree.insert(root.clone(), SuctNode::default());

        SuctSearch {
            participants: root.board.snake_ids(),
            root,
            you,
            root_children,
            tree,
            settings,
        }
    }

    pub fn node(&self, state: &TurnState) -> Option<&SuctNode> {
        self.tree.get(state)
    }

    pub fn root(&self) -> &TurnState {
        &self.root
    }

    /// Finishes the partial turn with policy moves, then plays out the rest
    fn rollout<R: Rng + ?Sized>(&self, state: &TurnState, rng: &mut R) -> Rewards {
        if state.is_terminal() {
            return evaluate(&state.board, &self.participants);
        }

        let rollout = &self.settings.rollout;
        if state.cursor == 0 {
            return playout_for(&state.board, &self.participants, rollout.horizon, rollout, rng);
        }

        let mut joint = state.pending.clone();
        for id in &state.order[state.cursor..] {
            joint.insert(*id, policy_move(&state.board, *id, rollout, rng));
        }
        let board = state.board.apply(&joint, rng);
        playout_for(
            &board,
            &self.participants,
            rollout.horizon.saturating_sub(1),
            rollout,
            rng,
        )
    }

    /// Child of `state` with the best UCB1 score for the acting snake
    fn select(
        &self,
        state: &TurnState,
        parent_visits: u32,
        children: Vec<TurnState>,
    ) -> Option<TurnState> {
        let acting = state.acting()?;
        let c = self.settings.exploration_constant;

        let mut best: Option<(TurnState, f64)> = None;
        for child in children {
            let stats = self
                .tree
                .get(&child)
                .map(|node| node.stats_for(acting))
                .unwrap_or_default();
            let score = ucb1(stats.total_reward, stats.visits, parent_visits, c);
            if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
                best = Some((child, score));
            }
        }

        trace!("{} selects at cursor {}", acting, state.cursor);
        best.map(|(child, _)| child)
    }

    fn run_simulation<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut state = self.root.clone();
        let mut path: Vec<TurnState> = vec![state.clone()];

        let rewards = loop {
            if state.is_terminal() {
                break evaluate(&state.board, &self.participants);
            }

            let parent_visits = match self.tree.get(&state) {
                Some(node) => node.visits,
                None => {
                    self.tree.insert(state.clone(), SuctNode::default());
                    break self.rollout(&state, rng);
                }
            };

            let children: Vec<TurnState> = state
                .actions()
                .into_iter()
                .map(|dir| state.take(dir, rng))
                .collect();

            let unexplored: Vec<&TurnState> = children
                .iter()
                .filter(|child| !self.tree.contains_key(*child))
                .collect();

            if !unexplored.is_empty() {
                let child = unexplored[rng.random_range(0..unexplored.len())].clone();
                let rewards = self.rollout(&child, rng);
                self.tree.insert(child.clone(), SuctNode::default());
                path.push(child);
                break rewards;
            }

            match self.select(&state, parent_visits, children) {
                Some(child) => {
                    path.push(child.clone());
                    state = child;
                }
                None => break evaluate(&state.board, &self.participants),
            }
        };

        for state in &path {
            if let Some(node) = self.tree.get_mut(state) {
                node.record(&rewards);
            }
        }
    }
}

impl MoveSearch for SuctSearch {
    fn simulate(&mut self, rng: &mut dyn RngCore) {
        self.run_simulation(rng);
    }

    fn best_move(&self) -> Option<Direction> {
        best_by_mean(self.root_stats())
    }

    fn root_stats(&self) -> Vec<(Direction, ActionStats)> {
        self.root_children
            .iter()
            .map(|(dir, child)| {
                let stats = self
                    .tree
                    .get(child)
                    .map(|node| node.stats_for(self.you))
                    .unwrap_or_default();
                (*dir, stats)
            })
            .collect()
    }

    fn tree_size(&self) -> usize {
        self.tree.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;
    use crate::simulator::Snake;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(17)
    }

    fn open_board(count: usize) -> BoardState {
        let heads = [(3, 3), (7, 7), (3, 7), (7, 3)];
        BoardState::new(
            11,
            11,
            heads.iter().take(count).enumerate().map(|(i, &(x, y))| {
                let pos = Position::new(x, y);
                (SnakeId(i), Snake::new(pos, [pos; 2]))
            }),
            vec![],
            0,
            0,
        )
    }

    fn corner_trap() -> BoardState {
        BoardState::new(
            11,
            11,
            vec![
                (
                    SnakeId(0),
                    Snake::new(
                        Position::new(1, 0),
                        vec![
                            Position::new(0, 4),
                            Position::new(0, 3),
                            Position::new(0, 2),
                            Position::new(0, 1),
                            Position::new(1, 1),
                        ],
                    ),
                ),
                (SnakeId(1), Snake::new(Position::new(9, 9), [Position::new(9, 9); 2])),
            ],
            vec![],
            0,
            0,
        )
    }

    fn hash_of(state: &TurnState) -> u64 {
        let mut hasher = DefaultHasher::new();
        state.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_turn_order_starts_with_searching_snake() {
        let state = TurnState::new(open_board(3), SnakeId(1));
        assert_eq!(state.order, vec![SnakeId(1), SnakeId(2), SnakeId(0)]);
        assert_eq!(state.acting(), Some(SnakeId(1)));
    }

    #[test]
    fn test_take_buffers_until_last_snake_moves() {
        let start = TurnState::new(open_board(3), SnakeId(0));
        let mut rng = rng();

        let one = start.take(Direction::Up, &mut rng);
        assert_eq!(one.board, start.board);
        assert_eq!(one.cursor, 1);
        assert_eq!(one.pending.get(&SnakeId(0)), Some(&Direction::Up));

        let two = one.take(Direction::Down, &mut rng);
        assert_eq!(two.board, start.board);
        assert_eq!(two.acting(), Some(SnakeId(2)));

        let three = two.take(Direction::Left, &mut rng);
        assert_eq!(three.cursor, 0);
        assert!(three.pending.is_empty());
        assert_eq!(three.board.snake(SnakeId(0)).unwrap().head, Position::new(3, 4));
        assert_eq!(three.board.snake(SnakeId(1)).unwrap().head, Position::new(7, 6));
        assert_eq!(three.board.snake(SnakeId(2)).unwrap().head, Position::new(2, 7));
    }

    #[test]
    fn test_turn_order_drops_eliminated_snakes() {
        let board = BoardState::new(
            11,
            11,
            vec![
                (SnakeId(0), Snake::new(Position::new(5, 5), [Position::new(5, 5); 2])),
                (SnakeId(1), Snake::new(Position::new(0, 5), [Position::new(0, 5); 2])),
                (SnakeId(2), Snake::new(Position::new(9, 9), [Position::new(9, 9); 2])),
            ],
            vec![],
            0,
            0,
        );
        let mut rng = rng();
        let state = TurnState::new(board, SnakeId(0))
            .take(Direction::Up, &mut rng)
            .take(Direction::Left, &mut rng)
            .take(Direction::Down, &mut rng);

        assert_eq!(state.order, vec![SnakeId(0), SnakeId(2)]);
        assert!(state.board.snake(SnakeId(1)).is_none());
    }

    #[test]
    fn test_equal_turn_states_share_key() {
        let mut rng = rng();
        let a = TurnState::new(open_board(2), SnakeId(0)).take(Direction::Right, &mut rng);
        let b = TurnState::new(open_board(2), SnakeId(0)).take(Direction::Right, &mut rng);
        let c = TurnState::new(open_board(2), SnakeId(0)).take(Direction::Left, &mut rng);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);

        // Same board, different cursor
        let root = TurnState::new(open_board(2), SnakeId(0));
        let mut shifted = root.clone();
        shifted.cursor = 1;
        assert_ne!(root, shifted);
    }

    #[test]
    fn test_root_moves_expanded_once_before_selection() {
        let board = open_board(2);
        let mut search = SuctSearch::new(&board, SnakeId(0), SearchSettings::default());
        let mut rng = rng();

        for _ in 0..4 {
            search.run_simulation(&mut rng);
        }

        let stats = search.root_stats();
        assert_eq!(stats.len(), 4);
        for (dir, stats) in stats {
            assert_eq!(stats.visits, 1, "{} not expanded exactly once", dir);
        }
        assert_eq!(search.node(search.root()).unwrap().visits, 4);
        assert_eq!(search.tree_size(), 5);
    }

    #[test]
    fn test_root_visits_match_simulations() {
        let mut search = SuctSearch::new(&open_board(3), SnakeId(2), SearchSettings::default());
        let mut rng = rng();
        for _ in 0..150 {
            search.run_simulation(&mut rng);
        }

        let root = search.node(search.root()).unwrap();
        assert_eq!(root.visits, 150);
        let child_visits: u32 = search.root_stats().iter().map(|(_, s)| s.visits).sum();
        assert_eq!(child_visits, 150);
    }

    #[test]
    fn test_avoids_dead_end_corner() {
        let mut search = SuctSearch::new(&corner_trap(), SnakeId(0), SearchSettings::default());
        let mut rng = rng();
        for _ in 0..300 {
            search.run_simulation(&mut rng);
        }

        let stats: BTreeMap<Direction, ActionStats> = search.root_stats().into_iter().collect();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[&Direction::Left].mean(), Some(-1.0));
        assert_eq!(search.best_move(), Some(Direction::Right));
    }

    #[test]
    fn test_searching_for_second_snake() {
        let mut search = SuctSearch::new(&corner_trap(), SnakeId(1), SearchSettings::default());
        let mut rng = rng();
        for _ in 0..50 {
            search.run_simulation(&mut rng);
        }
        assert_eq!(search.root().acting(), Some(SnakeId(1)));
        assert_eq!(search.root_stats().len(), 4);
        assert!(search.best_move().is_some());
    }

    #[test]
    fn test_terminal_root_yields_no_statistics() {
        let board = BoardState::new(
            11,
            11,
            vec![(SnakeId(0), Snake::new(Position::new(5, 5), vec![]))],
            vec![],
            0,
            0,
        );
        let mut search = SuctSearch::new(&board, SnakeId(0), SearchSettings::default());
        let mut rng = rng();
        for _ in 0..5 {
            search.run_simulation(&mut rng);
        }
        assert!(search.root_stats().is_empty());
        assert_eq!(search.best_move(), None);
    }
}
