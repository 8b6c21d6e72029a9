// Move filters shared by the rollout policy and both search engines
//
// These are one-ply heuristics. A move that passes `safe_moves` stays on the
// board and off every current body cell, but it is not guaranteed to survive
// the next tick: an equal or longer snake may move its head onto the same
// cell, and a snake at health 1 starves whichever way it goes. It may also
// be fatal two or more ticks later.
//
// Tail policy: every body segment counts as blocked, including each snake's
// oldest segment that would normally be vacated this tick. A snake that eats
// keeps its tail in place, so treating the tail as free is only correct when
// nobody eats; blocking it keeps the filter sound at the price of never
// chasing its own tail.

use crate::geometry::{Direction, Position};
use crate::simulator::{BoardState, SnakeId};

/// True if moving `id` in `dir` stays on the board and avoids every snake cell
pub fn is_safe(board: &BoardState, id: SnakeId, dir: Direction) -> bool {
    let Some(snake) = board.snake(id) else {
        return false;
    };

    let next = snake.head.step(dir);
    board.is_in_bounds(next) && !board.is_occupied(next)
}

/// Directions that pass `is_safe`, in `Direction::all()` order
///
/// Returns an empty vector when the snake is boxed in or not on the board.
pub fn safe_moves(board: &BoardState, id: SnakeId) -> Vec<Direction> {
    Direction::all()
        .into_iter()
        .filter(|&dir| is_safe(board, id, dir))
        .collect()
}

/// Safe moves, or `[Up]` when nothing is safe
///
/// A doomed snake still has to submit a move, so callers that need a
/// non-empty action set use this instead of `safe_moves`.
pub fn safe_moves_or_default(board: &BoardState, id: SnakeId) -> Vec<Direction> {
    let moves = safe_moves(board, id);
    if moves.is_empty() {
        vec![Direction::Up]
    } else {
        moves
    }
}

/// Food cell nearest to `pos` by Manhattan distance
pub fn closest_food(board: &BoardState, pos: Position) -> Option<Position> {
    board
        .food()
        .iter()
        .min_by_key(|food| pos.manhattan_distance(**food))
        .copied()
}
