// Playout policy used to value freshly expanded search nodes
//
// Each live snake picks its move per tick from one of two stateless
// strategies, chosen at random: a uniformly random safe move, or the safe move
// that brings its head closest to food. Playouts never spawn food and stop
// after a fixed number of ticks.

use log::trace;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::BTreeMap;

use crate::geometry::Direction;
use crate::moves::safe_moves;
use crate::simulator::{BoardState, JointMove, Outcome, SnakeId};

/// Reward per snake, in [-1, 1]
pub type Rewards = BTreeMap<SnakeId, f64>;

/// Playout tuning, copied out of `Config` by the search driver
#[derive(Debug, Clone, Copy)]
pub struct RolloutSettings {
    /// Maximum number of ticks played before the board is scored as is
    pub horizon: usize,
    /// Probability of using `ChaseFood` for a given snake on a given tick
    pub greedy_probability: f64,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        RolloutSettings {
            horizon: 50,
            greedy_probability: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayoutStrategy {
    SafeRandom,
    ChaseFood,
}

impl PlayoutStrategy {
    /// Draws the strategy a snake uses for one tick
    pub fn pick<R: Rng + ?Sized>(greedy_probability: f64, rng: &mut R) -> Self {
        if rng.random_bool(greedy_probability.clamp(0.0, 1.0)) {
            PlayoutStrategy::ChaseFood
        } else {
            PlayoutStrategy::SafeRandom
        }
    }

    pub fn choose<R: Rng + ?Sized>(self, board: &BoardState, id: SnakeId, rng: &mut R) -> Direction {
        match self {
            PlayoutStrategy::SafeRandom => safe_random(board, id, rng),
            PlayoutStrategy::ChaseFood => {
                chase_food(board, id).unwrap_or_else(|| safe_random(board, id, rng))
            }
        }
    }
}

fn safe_random<R: Rng + ?Sized>(board: &BoardState, id: SnakeId, rng: &mut R) -> Direction {
    safe_moves(board, id)
        .choose(rng)
        .copied()
        .unwrap_or(Direction::Up)
}

/// Safe move whose new head is nearest to any food; None without food or safe moves
fn chase_food(board: &BoardState, id: SnakeId) -> Option<Direction> {
    let head = board.snake(id)?.head;
    if board.food().is_empty() {
        return None;
    }

    safe_moves(board, id).into_iter().min_by_key(|&dir| {
        let next = head.step(dir);
        board
            .food()
            .iter()
            .map(|food| next.manhattan_distance(*food))
            .min()
            .unwrap_or(i32::MAX)
    })
}

/// Picks a strategy and a move for one snake
pub fn policy_move<R: Rng + ?Sized>(
    board: &BoardState,
    id: SnakeId,
    settings: &RolloutSettings,
    rng: &mut R,
) -> Direction {
    PlayoutStrategy::pick(settings.greedy_probability, rng).choose(board, id, rng)
}

/// Policy moves for every snake still on the board
pub fn policy_joint_move<R: Rng + ?Sized>(
    board: &BoardState,
    settings: &RolloutSettings,
    rng: &mut R,
) -> JointMove {
    board
        .snakes()
        .keys()
        .map(|&id| (id, policy_move(board, id, settings, rng)))
        .collect()
}

/// Plays at most `settings.horizon` ticks from `board` and scores the result
///
/// `participants` are the snakes that need a reward; snakes no longer on the
/// final board score -1 unless the game ended in a draw.
pub fn playout<R: Rng + ?Sized>(
    board: &BoardState,
    participants: &[SnakeId],
    settings: &RolloutSettings,
    rng: &mut R,
) -> Rewards {
    playout_for(board, participants, settings.horizon, settings, rng)
}

/// Same as `playout` with an explicit tick limit
pub fn playout_for<R: Rng + ?Sized>(
    board: &BoardState,
    participants: &[SnakeId],
    horizon: usize,
    settings: &RolloutSettings,
    rng: &mut R,
) -> Rewards {
    let mut state = board.without_food_spawning();
    let mut ticks = 0;

    while ticks < horizon && !state.winner().is_terminal() {
        let joint = policy_joint_move(&state, settings, rng);
        state.step(&joint, rng);
        ticks += 1;
    }

    trace!("playout finished after {} ticks: {:?}", ticks, state.winner());
    evaluate(&state, participants)
}

/// Scores a board for every participant
///
/// Terminal boards: +1 to the winner and -1 to everybody else, or 0 to all on
/// a draw. Unfinished boards: +1 to the longest surviving snake (lowest id on
/// ties) and -1 to everybody else.
pub fn evaluate(board: &BoardState, participants: &[SnakeId]) -> Rewards {
    let leader = match board.winner() {
        Outcome::Draw => return participants.iter().map(|&id| (id, 0.0)).collect(),
        Outcome::Winner(id) => id,
        Outcome::InProgress => {
            match board
                .snakes()
                .iter()
                .max_by(|(a_id, a), (b_id, b)| {
                    a.length().cmp(&b.length()).then_with(|| b_id.cmp(a_id))
                }) {
                Some((id, _)) => *id,
                None => return participants.iter().map(|&id| (id, 0.0)).collect(),
            }
        }
    };

    participants
        .iter()
        .map(|&id| (id, if id == leader { 1.0 } else { -1.0 }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;
    use crate::simulator::Snake;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn two_snake_board(len_a: usize, len_b: usize) -> BoardState {
        let body = |x: i32, len: usize| -> Vec<Position> {
            (0..len - 1).map(|i| Position::new(x, i as i32)).collect()
        };
        BoardState::new(
            11,
            11,
            vec![
                (SnakeId(0), Snake::new(Position::new(1, len_a as i32 - 1), body(1, len_a))),
                (SnakeId(1), Snake::new(Position::new(8, len_b as i32 - 1), body(8, len_b))),
            ],
            vec![],
            0,
            0,
        )
    }

    #[test]
    fn test_evaluate_winner_and_losers() {
        let board = BoardState::new(
            11,
            11,
            vec![(SnakeId(1), Snake::new(Position::new(3, 3), vec![]))],
            vec![],
            0,
            0,
        );
        let rewards = evaluate(&board, &[SnakeId(0), SnakeId(1), SnakeId(2)]);
        assert_eq!(rewards[&SnakeId(0)], -1.0);
        assert_eq!(rewards[&SnakeId(1)], 1.0);
        assert_eq!(rewards[&SnakeId(2)], -1.0);
    }

    #[test]
    fn test_evaluate_draw_is_zero_for_everyone() {
        let board = BoardState::new(11, 11, Vec::<(SnakeId, Snake)>::new(), vec![], 0, 0);
        let rewards = evaluate(&board, &[SnakeId(0), SnakeId(1)]);
        assert!(rewards.values().all(|r| *r == 0.0));
        assert_eq!(rewards.len(), 2);
    }

    #[test]
    fn test_evaluate_unfinished_rewards_longest() {
        let board = two_snake_board(3, 5);
        let rewards = evaluate(&board, &[SnakeId(0), SnakeId(1), SnakeId(2)]);
        assert_eq!(rewards[&SnakeId(0)], -1.0);
        assert_eq!(rewards[&SnakeId(1)], 1.0);
        assert_eq!(rewards[&SnakeId(2)], -1.0);
    }

    #[test]
    fn test_evaluate_unfinished_tie_goes_to_lowest_id() {
        let board = two_snake_board(4, 4);
        let rewards = evaluate(&board, &[SnakeId(0), SnakeId(1)]);
        assert_eq!(rewards[&SnakeId(0)], 1.0);
        assert_eq!(rewards[&SnakeId(1)], -1.0);
    }

    #[test]
    fn test_chase_food_moves_toward_food() {
        let board = BoardState::new(
            11,
            11,
            vec![(SnakeId(0), Snake::new(Position::new(5, 5), vec![Position::new(5, 4)]))],
            vec![Position::new(9, 5)],
            0,
            0,
        );
        let mut rng = rng();
        for _ in 0..20 {
            assert_eq!(
                PlayoutStrategy::ChaseFood.choose(&board, SnakeId(0), &mut rng),
                Direction::Right
            );
        }
    }

    #[test]
    fn test_chase_food_without_food_still_picks_safe_move() {
        let board = BoardState::new(
            11,
            11,
            vec![(SnakeId(0), Snake::new(Position::new(0, 0), vec![Position::new(0, 1)]))],
            vec![],
            0,
            0,
        );
        let mut rng = rng();
        for _ in 0..20 {
            assert_eq!(
                PlayoutStrategy::ChaseFood.choose(&board, SnakeId(0), &mut rng),
                Direction::Right
            );
        }
    }

    #[test]
    fn test_safe_random_defaults_to_up_when_trapped() {
        let board = BoardState::new(
            11,
            11,
            vec![(
                SnakeId(0),
                Snake::new(
                    Position::new(0, 0),
                    vec![Position::new(1, 1), Position::new(1, 0), Position::new(0, 1)],
                ),
            )],
            vec![],
            0,
            0,
        );
        assert_eq!(
            PlayoutStrategy::SafeRandom.choose(&board, SnakeId(0), &mut rng()),
            Direction::Up
        );
    }

    #[test]
    fn test_pick_respects_extremes() {
        let mut rng = rng();
        for _ in 0..50 {
            assert_eq!(PlayoutStrategy::pick(1.0, &mut rng), PlayoutStrategy::ChaseFood);
            assert_eq!(PlayoutStrategy::pick(0.0, &mut rng), PlayoutStrategy::SafeRandom);
        }
    }

    #[test]
    fn test_playout_respects_horizon_and_never_spawns_food() {
        let board = BoardState::new(
            11,
            11,
            vec![
                (SnakeId(0), Snake::new(Position::new(1, 1), [Position::new(1, 1); 2])),
                (SnakeId(1), Snake::new(Position::new(9, 9), [Position::new(9, 9); 2])),
            ],
            vec![],
            5,
            100,
        );
        let settings = RolloutSettings::default();
        let participants = board.snake_ids();

        // A zero-tick playout scores the starting board
        let rewards = playout_for(&board, &participants, 0, &settings, &mut rng());
        assert_eq!(rewards[&SnakeId(0)], 1.0);
        assert_eq!(rewards[&SnakeId(1)], -1.0);

        let mut rng = rng();
        for _ in 0..20 {
            let rewards = playout(&board, &participants, &settings, &mut rng);
            assert_eq!(rewards.len(), 2);
            let total: f64 = rewards.values().sum();
            // Without food nobody can outgrow the other, so the outcome is
            // a draw (0), a win (0) or an unfinished tie (0)
            assert_eq!(total, 0.0);
        }
    }

    #[test]
    fn test_playout_of_finished_game_is_immediate() {
        let board = BoardState::new(
            11,
            11,
            vec![(SnakeId(2), Snake::new(Position::new(4, 4), vec![]))],
            vec![],
            0,
            0,
        );
        let rewards = playout(&board, &[SnakeId(0), SnakeId(2)], &RolloutSettings::default(), &mut rng());
        assert_eq!(rewards[&SnakeId(2)], 1.0);
        assert_eq!(rewards[&SnakeId(0)], -1.0);
    }
}
