// Welcome to
// __________         __    __  .__                               __
// \______   \_____ _/  |__/  |_|  |   ____   ______ ____ _____  |  | __ ____
//  |    |  _/\__  \\   __\   __\  | _/ __ \ /  ___//    \\__  \ |  |/ // __ \
//  |    |   \ / __ \|  |  |  | |  |_\  ___/ \___ \|   |  \/ __ \|    <\  ___/
//  |________/(______/__|  |__| |____/\_____>______>___|__(______/__|__\\_____>
//
// Protocol adapter between the Battlesnake API and the search engines.
//
// Incoming boards are translated into a BoardState with the rows flipped
// (engine y = height - 1 - wire y) and every body stored oldest segment
// first. The chosen move is flipped back before it is sent.

use log::{error, info, warn};
use rand::RngCore;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::debug_logger::DebugLogger;
use crate::geometry::{Direction, Position};
use crate::search::{choose_move, SearchSettings};
use crate::simulator::{BoardState, Snake, SnakeId};
use crate::types::{Battlesnake, Board, Coord, Game};

/// Food rules used to build the engine board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoodRules {
    pub min_food: usize,
    pub food_spawn_chance: u8,
}

impl FoodRules {
    pub fn from_config(config: &Config) -> Self {
        FoodRules {
            min_food: config.game_rules.min_food,
            food_spawn_chance: config.game_rules.food_spawn_chance,
        }
    }

    /// Ruleset settings of the game, falling back to the configured values
    pub fn for_game(game: &Game, config: &Config) -> Self {
        let defaults = Self::from_config(config);
        FoodRules {
            min_food: game
                .ruleset_setting("minimumFood")
                .map(|v| v as usize)
                .unwrap_or(defaults.min_food),
            food_spawn_chance: game
                .ruleset_setting("foodSpawnChance")
                .map(|v| v.min(100) as u8)
                .unwrap_or(defaults.food_spawn_chance),
        }
    }
}

/// Move chosen for one request, already in wire orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveDecision {
    pub direction: Direction,
    pub simulations: u64,
    pub tree_size: usize,
    pub elapsed: Duration,
}

impl MoveDecision {
    fn fallback() -> Self {
        MoveDecision {
            direction: Direction::Up,
            simulations: 0,
            tree_size: 0,
            elapsed: Duration::ZERO,
        }
    }
}

fn to_position(coord: &Coord, height: i32) -> Position {
    Position::new(coord.x, height - 1 - coord.y)
}

/// Builds the engine board from a wire snapshot
///
/// Snakes get `SnakeId`s by their index in `board.snakes`; snakes with no
/// health or no body are left out. Returns the id of the snake named
/// `you_id`, or an error if it is not on the board.
pub fn board_from_wire(
    board: &Board,
    you_id: &str,
    rules: FoodRules,
) -> Result<(BoardState, SnakeId), String> {
    if board.width <= 0 || board.height <= 0 {
        return Err(format!(
            "Invalid board dimensions {}x{}",
            board.width, board.height
        ));
    }

    let mut you = None;
    let mut snakes = Vec::with_capacity(board.snakes.len());

    for (index, wire) in board.snakes.iter().enumerate() {
        let Some((head, rest)) = wire.body.split_first() else {
            continue;
        };
        if wire.health <= 0 {
            continue;
        }

        let id = SnakeId(index);
        if wire.id == you_id {
            you = Some(id);
        }

        let body = rest.iter().rev().map(|c| to_position(c, board.height));
        let snake = Snake::new(to_position(head, board.height), body).with_health(wire.health);
        snakes.push((id, snake));
    }

    let you = you.ok_or_else(|| format!("Snake '{}' is not on the board", you_id))?;
    let food = board.food.iter().map(|c| to_position(c, board.height));

    Ok((
        BoardState::new(
            board.width,
            board.height,
            snakes,
            food,
            rules.min_food,
            rules.food_spawn_chance.min(100),
        ),
        you,
    ))
}

/// Engine direction to wire direction
pub fn direction_to_wire(dir: Direction) -> Direction {
    dir.flip_vertical()
}

/// Battlesnake Bot with OOP-style API
/// Takes static configuration dependencies and exposes methods corresponding to API endpoints
pub struct Bot {
    config: Config,
    debug_logger: DebugLogger,
}

impl Bot {
    /// Creates a new Bot instance with debug logging disabled
    pub fn new(config: Config) -> Self {
        Bot {
            config,
            debug_logger: DebugLogger::disabled(),
        }
    }

    pub fn with_debug_logger(config: Config, debug_logger: DebugLogger) -> Self {
        Bot {
            config,
            debug_logger,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns bot metadata and appearance
    /// Corresponds to GET / endpoint
    pub fn info(&self) -> Value {
        info!("INFO");

        json!({
            "apiversion": "1",
            "author": "snake-duel-mcts",
            "color": "#3E7CB1",
            "head": "default",
            "tail": "default",
        })
    }

    /// Called when a game starts
    /// Corresponds to POST /start endpoint
    pub fn start(&self, game: &Game, _turn: &i32, board: &Board, _you: &Battlesnake) {
        info!(
            "GAME START {} ({}x{}, {} snakes, {} search)",
            game.id,
            board.width,
            board.height,
            board.snakes.len(),
            self.config.search.algorithm.as_str()
        );
    }

    /// Called when a game ends
    /// Corresponds to POST /end endpoint
    pub fn end(&self, game: &Game, turn: &i32, _board: &Board, _you: &Battlesnake) {
        info!("GAME OVER {} after {} turns", game.id, turn);
    }

    /// Runs the configured search for `you_id` on a wire board
    ///
    /// Blocking; the server calls it from `spawn_blocking`, the replay tool
    /// calls it directly.
    pub fn compute_decision(
        config: &Config,
        board: &Board,
        you_id: &str,
        rules: FoodRules,
        budget: Duration,
        rng: &mut dyn RngCore,
    ) -> MoveDecision {
        let (state, you) = match board_from_wire(board, you_id, rules) {
            Ok(converted) => converted,
            Err(e) => {
                warn!("{}, answering up", e);
                return MoveDecision::fallback();
            }
        };

        let report = choose_move(
            &state,
            you,
            config.search.algorithm,
            budget,
            SearchSettings::from_config(config),
            rng,
        );

        MoveDecision {
            direction: direction_to_wire(report.move_or_first_safe(&state, you)),
            simulations: report.simulations,
            tree_size: report.tree_size,
            elapsed: report.elapsed,
        }
    }

    /// Computes and returns the next move
    /// Corresponds to POST /move endpoint
    ///
    /// The search is CPU-bound, so it runs on tokio's blocking pool with a
    /// budget of the effective response time minus whatever has already elapsed.
    pub async fn get_move(&self, game: &Game, turn: &i32, board: &Board, you: &Battlesnake) -> Value {
        let start_time = Instant::now();
        let turn = *turn;

        info!("Turn {}: Computing move", turn);

        let config = self.config.clone();
        let rules = FoodRules::for_game(game, &config);
        let board_for_search = board.clone();
        let you_id = you.id.clone();

        let result = tokio::task::spawn_blocking(move || {
            let budget = Duration::from_millis(config.timing.effective_budget_ms())
                .saturating_sub(start_time.elapsed());
            let mut rng = rand::rng();
            Bot::compute_decision(&config, &board_for_search, &you_id, rules, budget, &mut rng)
        })
        .await;

        let decision = match result {
            Ok(decision) => decision,
            Err(e) => {
                error!("Turn {}: search task failed: {}", turn, e);
                MoveDecision::fallback()
            }
        };

        info!(
            "Turn {}: Chose {} ({} simulations, {} nodes, time: {}ms)",
            turn,
            decision.direction.as_str(),
            decision.simulations,
            decision.tree_size,
            start_time.elapsed().as_millis()
        );

        self.debug_logger.log_move(
            turn,
            &you.id,
            board.clone(),
            decision.direction,
            decision.simulations,
        );

        json!({ "move": decision.direction.as_str() })
    }
}
