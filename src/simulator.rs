// Game rules simulator
//
// BoardState is a plain value: the search engines clone it before every
// hypothetical transition, so a state stored in a tree is never mutated
// afterwards. Snakes are keyed by SnakeId in a BTreeMap and food lives in a
// BTreeSet, which gives the derived Hash/Eq a canonical ordering and makes
// BoardState usable directly as a transposition table key.

use rand::seq::IndexedRandom;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;

use crate::geometry::{Direction, Position};

pub const SNAKE_MAX_HEALTH: i32 = 100;

/// Stable identity of a snake for the duration of a game
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnakeId(pub usize);

impl fmt::Display for SnakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One move per live snake, applied together by `BoardState::step`
pub type JointMove = BTreeMap<SnakeId, Direction>;

/// Result of inspecting a board for a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    InProgress,
    Winner(SnakeId),
    Draw,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

/// Failed board construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("at least one snake is required")]
    NoSnakes,

    #[error("requested {requested} snakes but only {available} start positions exist")]
    TooManySnakes { requested: usize, available: usize },

    #[error("a {width}x{height} board is too small for the start layout")]
    BoardTooSmall { width: i32, height: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snake {
    pub head: Position,
    /// Body segments excluding the head, oldest first
    pub body: VecDeque<Position>,
    pub health: i32,
}

impl Snake {
    /// Creates a snake at full health
    pub fn new<I>(head: Position, body: I) -> Self
    where
        I: IntoIterator<Item = Position>,
    {
        Snake {
            head,
            body: body.into_iter().collect(),
            health: SNAKE_MAX_HEALTH,
        }
    }

    pub fn with_health(mut self, health: i32) -> Self {
        self.health = health;
        self
    }

    pub fn length(&self) -> usize {
        self.body.len() + 1
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.head == pos || self.body.contains(&pos)
    }

    /// Moves the head without dropping the oldest segment
    fn advance(&mut self, dir: Direction) {
        self.body.push_back(self.head);
        self.head = self.head.step(dir);
        self.health -= 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardState {
    width: i32,
    height: i32,
    snakes: BTreeMap<SnakeId, Snake>,
    food: BTreeSet<Position>,
    min_food: usize,
    food_spawn_chance: u8,
}

impl BoardState {
    /// Builds a board from already translated parts
    ///
    /// # Panics
    /// Panics if either dimension is not positive or the spawn chance exceeds 100.
    pub fn new<S, F>(
        width: i32,
        height: i32,
        snakes: S,
        food: F,
        min_food: usize,
        food_spawn_chance: u8,
    ) -> Self
    where
        S: IntoIterator<Item = (SnakeId, Snake)>,
        F: IntoIterator<Item = Position>,
    {
        assert!(width > 0 && height > 0, "board dimensions must be positive");
        assert!(food_spawn_chance <= 100, "food spawn chance is a percentage");

        BoardState {
            width,
            height,
            snakes: snakes.into_iter().collect(),
            food: food.into_iter().collect(),
            min_food,
            food_spawn_chance,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn snakes(&self) -> &BTreeMap<SnakeId, Snake> {
        &self.snakes
    }

    pub fn snake(&self, id: SnakeId) -> Option<&Snake> {
        self.snakes.get(&id)
    }

    pub fn snake_ids(&self) -> Vec<SnakeId> {
        self.snakes.keys().copied().collect()
    }

    pub fn food(&self) -> &BTreeSet<Position> {
        &self.food
    }

    pub fn min_food(&self) -> usize {
        self.min_food
    }

    pub fn food_spawn_chance(&self) -> u8 {
        self.food_spawn_chance
    }

    pub fn is_in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// True if any snake's head or body covers `pos`
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.snakes.values().any(|s| s.contains(pos))
    }

    /// Copy of this board on which no food will ever appear
    ///
    /// Both the minimum-food refill and the random spawn are switched off, which
    /// makes `step` a deterministic function of the board and the moves.
    pub fn without_food_spawning(&self) -> BoardState {
        let mut board = self.clone();
        board.min_food = 0;
        board.food_spawn_chance = 0;
        board
    }

    /// All cells holding neither a snake segment nor food, in row-major order
    pub fn empty_cells(&self) -> Vec<Position> {
        let occupied: HashSet<Position> = self
            .snakes
            .values()
            .flat_map(|s| std::iter::once(s.head).chain(s.body.iter().copied()))
            .collect();

        let mut cells = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Position::new(x, y);
                if !occupied.contains(&pos) && !self.food.contains(&pos) {
                    cells.push(pos);
                }
            }
        }
        cells
    }

    /// Applies one synchronous game tick
    ///
    /// # Panics
    /// Panics if `moves` has no entry for a snake that is alive on this board.
    pub fn step<R: Rng + ?Sized>(&mut self, moves: &JointMove, rng: &mut R) {
        for (id, snake) in self.snakes.iter_mut() {
            let dir = match moves.get(id) {
                Some(dir) => *dir,
                None => panic!("step called without a move for live snake {}", id),
            };
            snake.advance(dir);
        }

        self.feed_snakes();
        self.spawn_food(rng);
        self.eliminate_snakes();
    }

    /// Clone-and-step; the receiver is left untouched
    pub fn apply<R: Rng + ?Sized>(&self, moves: &JointMove, rng: &mut R) -> BoardState {
        let mut next = self.clone();
        next.step(moves, rng);
        next
    }

    pub fn winner(&self) -> Outcome {
        let mut ids = self.snakes.keys();
        match (ids.next(), ids.next()) {
            (None, _) => Outcome::Draw,
            (Some(id), None) => Outcome::Winner(*id),
            _ => Outcome::InProgress,
        }
    }

    // Food under a head is consumed only after every snake has been checked,
    // so two heads on the same food both eat.
    fn feed_snakes(&mut self) {
        let mut eaten = Vec::new();
        for snake in self.snakes.values_mut() {
            if self.food.contains(&snake.head) {
                snake.health = SNAKE_MAX_HEALTH;
                eaten.push(snake.head);
            } else {
                snake.body.pop_front();
            }
        }

        for pos in eaten {
            self.food.remove(&pos);
        }
    }

    fn spawn_food<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let missing = self.min_food.saturating_sub(self.food.len());
        if missing > 0 {
            self.place_food(missing, rng);
        } else if self.food_spawn_chance > 0
            && rng.random_range(0..100u32) < u32::from(self.food_spawn_chance)
        {
            self.place_food(1, rng);
        }
    }

    fn place_food<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) {
        let empty = self.empty_cells();
        for pos in empty.choose_multiple(rng, count) {
            self.food.insert(*pos);
        }
    }

    // Every check reads the post-movement board; removals happen afterwards in
    // one pass.
    fn eliminate_snakes(&mut self) {
        let mut eliminated = BTreeSet::new();

        for (id, snake) in &self.snakes {
            if !self.is_in_bounds(snake.head)
                || snake.health <= 0
                || snake.body.contains(&snake.head)
            {
                eliminated.insert(*id);
                continue;
            }

            for (other_id, other) in &self.snakes {
                if other_id == id {
                    continue;
                }
                let lost_head_to_head =
                    snake.head == other.head && snake.length() <= other.length();
                if lost_head_to_head || other.body.contains(&snake.head) {
                    eliminated.insert(*id);
                    break;
                }
            }
        }

        for id in eliminated {
            self.snakes.remove(&id);
        }
    }
}

/// Fixed start slots, one step in from each corner
fn start_positions(width: i32, height: i32) -> [Position; 4] {
    [
        Position::new(1, 1),
        Position::new(width - 2, height - 2),
        Position::new(width - 2, 1),
        Position::new(1, height - 2),
    ]
}

/// Lays out a fresh match
///
/// Snakes are assigned ids `0..snake_count` and placed on shuffled corner
/// slots with their tails stacked under the head (length 3). `min_food` food
/// cells are scattered over cells that are not start slots.
pub fn generate_board<R: Rng + ?Sized>(
    width: i32,
    height: i32,
    snake_count: usize,
    min_food: usize,
    food_spawn_chance: u8,
    rng: &mut R,
) -> Result<BoardState, BoardError> {
    if snake_count == 0 {
        return Err(BoardError::NoSnakes);
    }
    if width < 3 || height < 3 {
        return Err(BoardError::BoardTooSmall { width, height });
    }

    // Slots coincide on boards with a side of 3
    let mut slots: Vec<Position> = Vec::with_capacity(4);
    for pos in start_positions(width, height) {
        if !slots.contains(&pos) {
            slots.push(pos);
        }
    }
    if snake_count > slots.len() {
        return Err(BoardError::TooManySnakes {
            requested: snake_count,
            available: slots.len(),
        });
    }

    slots.shuffle(rng);
    let snakes: Vec<(SnakeId, Snake)> = slots
        .iter()
        .take(snake_count)
        .enumerate()
        .map(|(i, &pos)| (SnakeId(i), Snake::new(pos, [pos, pos])))
        .collect();

    let reserved = start_positions(width, height);
    let mut candidates = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let pos = Position::new(x, y);
            if !reserved.contains(&pos) {
                candidates.push(pos);
            }
        }
    }
    let food: Vec<Position> = candidates.choose_multiple(rng, min_food).copied().collect();

    Ok(BoardState::new(
        width,
        height,
        snakes,
        food,
        min_food,
        food_spawn_chance.min(100),
    ))
}
