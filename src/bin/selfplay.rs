// Local self-play driver
//
// Usage:
//   cargo run --release --bin selfplay -- [options]
//
// Every live snake searches for its own move each tick, in parallel, with a
// private tree, a private random generator and its own copy of the board.

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::env;
use std::process;
use std::time::Duration;

use snake_duel_mcts::config::Config;
use snake_duel_mcts::geometry::Direction;
use snake_duel_mcts::search::{choose_move, SearchAlgorithm, SearchReport, SearchSettings};
use snake_duel_mcts::simulator::{generate_board, BoardState, JointMove, Outcome, SnakeId};

struct Options {
    algorithm: SearchAlgorithm,
    budget_ms: u64,
    max_turns: u32,
    seed: u64,
    width: i32,
    height: i32,
    snakes: usize,
    min_food: usize,
    food_spawn_chance: u8,
}

fn print_usage() {
    eprintln!("Battlesnake Self-Play");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  selfplay [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --algorithm <duct|suct>  Search used by every snake (default: from config)");
    eprintln!("  --budget-ms <ms>         Search time per snake per tick (default: from config)");
    eprintln!("  --max-turns <n>          Stop after n ticks (default: 500)");
    eprintln!("  --seed <n>               Seed for board layout, food and searches (default: 0)");
    eprintln!("  --width <n>              Board width (default: 11)");
    eprintln!("  --height <n>             Board height (default: 11)");
    eprintln!("  --snakes <n>             Number of snakes, 1-4 (default: 2)");
    eprintln!("  --min-food <n>           Minimum food on the board (default: 1)");
    eprintln!("  --spawn <pct>            Food spawn chance per tick (default: 15)");
    eprintln!("  --config <path>          Path to Snake.toml (default: Snake.toml)");
    eprintln!("  --help                   Show this help message");
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T
where
    T::Err: std::fmt::Display,
{
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires an argument", flag);
        process::exit(1);
    };
    raw.parse().unwrap_or_else(|e| {
        eprintln!("Error: invalid value '{}' for {}: {}", raw, flag, e);
        process::exit(1);
    })
}

fn parse_options(args: &[String]) -> (Options, Config) {
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .unwrap_or_else(|| "Snake.toml".to_string());
    let config = Config::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from '{}': {}", config_path, e);
        Config::default_hardcoded()
    });

    let mut options = Options {
        algorithm: config.search.algorithm,
        budget_ms: config.timing.effective_budget_ms(),
        max_turns: 500,
        seed: 0,
        width: 11,
        height: 11,
        snakes: 2,
        min_food: 1,
        food_spawn_chance: 15,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--algorithm" => {
                let raw: String = parse_value(args, i, "--algorithm");
                options.algorithm = SearchAlgorithm::parse(&raw).unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                });
            }
            "--budget-ms" => options.budget_ms = parse_value(args, i, "--budget-ms"),
            "--max-turns" => options.max_turns = parse_value(args, i, "--max-turns"),
            "--seed" => options.seed = parse_value(args, i, "--seed"),
            "--width" => options.width = parse_value(args, i, "--width"),
            "--height" => options.height = parse_value(args, i, "--height"),
            "--snakes" => options.snakes = parse_value(args, i, "--snakes"),
            "--min-food" => options.min_food = parse_value(args, i, "--min-food"),
            "--spawn" => options.food_spawn_chance = parse_value(args, i, "--spawn"),
            "--config" => {}
            other => {
                eprintln!("Error: Unknown option '{}'", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 2;
    }

    (options, config)
}

/// Independent searches for every live snake, run on the rayon pool
fn search_all(
    board: &BoardState,
    options: &Options,
    settings: SearchSettings,
    turn: u32,
) -> Vec<(SnakeId, Direction, SearchReport)> {
    let budget = Duration::from_millis(options.budget_ms);

    board
        .snake_ids()
        .into_par_iter()
        .map(|id| {
            let seed = options
                .seed
                .wrapping_mul(1_000_003)
                .wrapping_add(u64::from(turn) << 8)
                .wrapping_add(id.0 as u64);
            let mut rng = StdRng::seed_from_u64(seed);
            let report = choose_move(board, id, options.algorithm, budget, settings, &mut rng);
            let dir = report.move_or_first_safe(board, id);
            (id, dir, report)
        })
        .collect()
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help") {
        print_usage();
        process::exit(0);
    }

    let (options, config) = parse_options(&args);
    let settings = SearchSettings::from_config(&config);

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut board = match generate_board(
        options.width,
        options.height,
        options.snakes,
        options.min_food,
        options.food_spawn_chance,
        &mut rng,
    ) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Self-play: {}x{}, {} snakes, {} search, {}ms per move",
        options.width,
        options.height,
        options.snakes,
        options.algorithm.as_str(),
        options.budget_ms
    );

    let mut turn = 0;
    while !board.winner().is_terminal() && turn < options.max_turns {
        let decisions = search_all(&board, &options, settings, turn);

        let summary: Vec<String> = decisions
            .iter()
            .map(|(id, dir, report)| format!("{} {} ({} sims)", id, dir, report.simulations))
            .collect();
        info!("Turn {}: {}", turn, summary.join(", "));

        let joint: JointMove = decisions.iter().map(|(id, dir, _)| (*id, *dir)).collect();
        board.step(&joint, &mut rng);
        turn += 1;
    }

    match board.winner() {
        Outcome::Winner(id) => println!("Winner: snake {} after {} turns", id, turn),
        Outcome::Draw => println!("Draw after {} turns", turn),
        Outcome::InProgress => {
            let lengths: Vec<String> = board
                .snakes()
                .iter()
                .map(|(id, snake)| format!("{} length {}", id, snake.length()))
                .collect();
            println!(
                "Stopped after {} turns without a winner: {}",
                turn,
                lengths.join(", ")
            );
        }
    }
}
