// Replay module for analyzing historical game states and debugging decision-making
//
// This module provides functionality to:
// 1. Parse JSONL debug logs
// 2. Re-run the search on historical states
// 3. Compare logged vs replayed moves
// 4. Generate detailed analysis reports

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use crate::bot::{Bot, FoodRules};
use crate::config::Config;
use crate::debug_logger::LogEntry;
use crate::geometry::Direction;
use crate::types::Board;

/// Result of replaying a single turn
#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub turn: i32,
    pub original_move: Direction,
    pub replayed_move: Direction,
    pub matches: bool,
    pub simulations: u64,
    pub computation_time_ms: u128,
}

/// Statistics for a complete replay session
#[derive(Debug, Default)]
pub struct ReplayStats {
    pub total_turns: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub match_rate: f64,
}

/// Parses `turn:move|move,turn:move` into (turn, acceptable moves) pairs
pub fn parse_expected_moves(raw: &str) -> Result<Vec<(i32, Vec<Direction>)>, String> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (turn, moves) = part
                .split_once(':')
                .ok_or_else(|| format!("Expected turn:move, got '{}'", part))?;
            let turn: i32 = turn
                .trim()
                .parse()
                .map_err(|e| format!("Invalid turn number '{}': {}", turn, e))?;
            let moves = moves
                .split('|')
                .map(|m| Direction::parse(m.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((turn, moves))
        })
        .collect()
}

/// Replay engine for analyzing debug logs
pub struct ReplayEngine {
    config: Config,
    verbose: bool,
    seed: u64,
}

impl ReplayEngine {
    /// Creates a new replay engine with the given configuration
    pub fn new(config: Config, verbose: bool) -> Self {
        ReplayEngine {
            config,
            verbose,
            seed: 0,
        }
    }

    /// Base seed for the per-turn random generators
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Loads all log entries from a JSONL file
    pub fn load_log_file<P: AsRef<Path>>(&self, log_path: P) -> Result<Vec<LogEntry>, String> {
        let file =
            File::open(log_path.as_ref()).map_err(|e| format!("Failed to open log file: {}", e))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| format!("Failed to read line {}: {}", line_num + 1, e))?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line)
                .map_err(|e| format!("Failed to parse JSON on line {}: {}", line_num + 1, e))?;

            entries.push(entry);
        }

        info!("Loaded {} log entries", entries.len());
        Ok(entries)
    }

    /// Re-runs move selection for `you_id` on a logged board
    /// Returns the wire move, the simulation count and the elapsed time
    ///
    /// With `search.max_simulations` set the time budget is ignored and the
    /// result depends only on the board, the config and `seed + turn`.
    /// Uncapped replays stop on the clock and may differ between runs.
    pub fn replay_turn(
        &self,
        board: &Board,
        you_id: &str,
        turn: i32,
    ) -> Result<(Direction, u64, u128), String> {
        if !board.snakes.iter().any(|s| s.id == you_id) {
            return Err(format!(
                "Snake with id '{}' not found in board state",
                you_id
            ));
        }

        // A simulation cap replaces the clock, so capped replays are deterministic
        let budget = match self.config.search.max_simulations {
            Some(_) => Duration::MAX,
            None => Duration::from_millis(self.config.timing.effective_budget_ms()),
        };
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(turn as u64));
        let decision = Bot::compute_decision(
            &self.config,
            board,
            you_id,
            FoodRules::from_config(&self.config),
            budget,
            &mut rng,
        );

        Ok((
            decision.direction,
            decision.simulations,
            decision.elapsed.as_millis(),
        ))
    }

    /// Replays a single log entry and compares the result
    pub fn replay_entry(&self, entry: &LogEntry) -> Result<ReplayResult, String> {
        if self.verbose {
            info!("Replaying turn {}...", entry.turn);
        }

        let original_move = Direction::parse(&entry.chosen_move)?;
        let (replayed_move, simulations, computation_time) =
            self.replay_turn(&entry.board, &entry.you_id, entry.turn)?;

        let matches = original_move == replayed_move;

        let result = ReplayResult {
            turn: entry.turn,
            original_move,
            replayed_move,
            matches,
            simulations,
            computation_time_ms: computation_time,
        };

        if self.verbose {
            if matches {
                info!(
                    "Turn {}: ✓ MATCH - {} ({} simulations, time: {}ms)",
                    entry.turn,
                    replayed_move.as_str(),
                    simulations,
                    computation_time
                );
            } else {
                warn!(
                    "Turn {}: ✗ MISMATCH - Original: {}, Replayed: {} ({} simulations, time: {}ms)",
                    entry.turn,
                    original_move.as_str(),
                    replayed_move.as_str(),
                    simulations,
                    computation_time
                );
            }
        }

        Ok(result)
    }

    /// Replays all entries in a log file
    pub fn replay_all(&self, entries: &[LogEntry]) -> Vec<ReplayResult> {
        let mut results = Vec::new();

        for entry in entries {
            match self.replay_entry(entry) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Failed to replay turn {}: {}", entry.turn, e);
                }
            }
        }

        results
    }

    /// Replays specific turns from a log file
    pub fn replay_turns(
        &self,
        entries: &[LogEntry],
        turn_numbers: &[i32],
    ) -> Result<Vec<ReplayResult>, String> {
        let mut results = Vec::new();

        for turn_num in turn_numbers {
            let entry = entries
                .iter()
                .find(|e| e.turn == *turn_num)
                .ok_or_else(|| format!("Turn {} not found in log file", turn_num))?;

            match self.replay_entry(entry) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Failed to replay turn {}: {}", turn_num, e);
                }
            }
        }

        Ok(results)
    }

    /// Generates statistics from replay results
    pub fn generate_stats(&self, results: &[ReplayResult]) -> ReplayStats {
        let total_turns = results.len();
        let matches = results.iter().filter(|r| r.matches).count();
        let mismatches = total_turns - matches;
        let match_rate = if total_turns > 0 {
            (matches as f64 / total_turns as f64) * 100.0
        } else {
            0.0
        };

        ReplayStats {
            total_turns,
            matches,
            mismatches,
            match_rate,
        }
    }

    /// Prints a detailed report of replay results
    pub fn print_report(&self, results: &[ReplayResult]) {
        let stats = self.generate_stats(results);

        println!("\n═══════════════════════════════════════════════════════════");
        println!("                    REPLAY REPORT");
        println!("═══════════════════════════════════════════════════════════");
        println!("Search:         {}", self.config.search.algorithm.as_str());
        println!("Total Turns:    {}", stats.total_turns);
        println!("Matches:        {} ({:.1}%)", stats.matches, stats.match_rate);
        println!("Mismatches:     {}", stats.mismatches);
        println!("═══════════════════════════════════════════════════════════\n");

        if !results.is_empty() {
            let count = results.len() as f64;
            let avg_time: f64 =
                results.iter().map(|r| r.computation_time_ms as f64).sum::<f64>() / count;
            let avg_simulations: f64 =
                results.iter().map(|r| r.simulations as f64).sum::<f64>() / count;

            println!("Average Simulations:        {:.0}", avg_simulations);
            println!("Average Computation Time:   {:.1}ms\n", avg_time);
        }

        let mismatches: Vec<_> = results.iter().filter(|r| !r.matches).collect();
        if !mismatches.is_empty() {
            println!("═══════════════════════════════════════════════════════════");
            println!("                  DETAILED MISMATCHES");
            println!("═══════════════════════════════════════════════════════════");

            for result in mismatches {
                println!(
                    "Turn {}: {} → {} ({} simulations, time: {}ms)",
                    result.turn,
                    result.original_move.as_str(),
                    result.replayed_move.as_str(),
                    result.simulations,
                    result.computation_time_ms
                );
            }
            println!();
        }
    }

    /// Validates that specific expected moves were made
    pub fn validate_expected_moves(
        &self,
        entries: &[LogEntry],
        expected_moves: &[(i32, Vec<Direction>)],
    ) -> Result<(), String> {
        for (turn, acceptable) in expected_moves {
            let entry = entries
                .iter()
                .find(|e| e.turn == *turn)
                .ok_or_else(|| format!("Turn {} not found in log", turn))?;

            let actual_move = Direction::parse(&entry.chosen_move)?;

            if !acceptable.contains(&actual_move) {
                return Err(format!(
                    "Turn {}: Expected one of {:?}, but got {}",
                    turn,
                    acceptable.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                    actual_move.as_str()
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Battlesnake, Coord};

    fn entry(turn: i32, chosen_move: &str) -> LogEntry {
        let body = vec![Coord { x: 5, y: 5 }, Coord { x: 5, y: 4 }, Coord { x: 5, y: 3 }];
        LogEntry {
            turn,
            you_id: "me".to_string(),
            chosen_move: chosen_move.to_string(),
            board: Board {
                height: 11,
                width: 11,
                food: vec![],
                snakes: vec![Battlesnake {
                    id: "me".to_string(),
                    name: "me".to_string(),
                    health: 100,
                    head: body[0],
                    length: 3,
                    body,
                    latency: String::new(),
                    shout: None,
                }],
                hazards: vec![],
            },
            simulations: 0,
            timestamp: "2025-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_parse_expected_moves() {
        let parsed = parse_expected_moves("3:up|left, 10:down").unwrap();
        assert_eq!(
            parsed,
            vec![
                (3, vec![Direction::Up, Direction::Left]),
                (10, vec![Direction::Down])
            ]
        );

        assert!(parse_expected_moves("3-up").is_err());
        assert!(parse_expected_moves("x:up").is_err());
        assert!(parse_expected_moves("3:sideways").is_err());
    }

    #[test]
    fn test_generate_stats() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let result = |turn, matches| ReplayResult {
            turn,
            original_move: Direction::Up,
            replayed_move: if matches { Direction::Up } else { Direction::Left },
            matches,
            simulations: 10,
            computation_time_ms: 1,
        };

        let stats = engine.generate_stats(&[result(1, true), result(2, true), result(3, false), result(4, true)]);
        assert_eq!(stats.total_turns, 4);
        assert_eq!(stats.matches, 3);
        assert_eq!(stats.mismatches, 1);
        assert_eq!(stats.match_rate, 75.0);

        assert_eq!(engine.generate_stats(&[]).match_rate, 0.0);
    }

    #[test]
    fn test_validate_expected_moves() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let entries = vec![entry(1, "up"), entry(2, "left")];

        assert!(engine
            .validate_expected_moves(&entries, &[(1, vec![Direction::Up]), (2, vec![Direction::Left, Direction::Right])])
            .is_ok());
        assert!(engine
            .validate_expected_moves(&entries, &[(2, vec![Direction::Up])])
            .is_err());
        assert!(engine
            .validate_expected_moves(&entries, &[(7, vec![Direction::Up])])
            .is_err());
    }

    #[test]
    fn test_capped_replay_is_deterministic() {
        let mut config = Config::default_hardcoded();
        config.timing.response_time_budget_ms = 0;
        config.search.max_simulations = Some(120);
        let engine = ReplayEngine::new(config, false).with_seed(11);

        let mut board = entry(9, "up").board;
        let mut other = board.snakes[0].clone();
        other.id = "them".to_string();
        other.body = vec![Coord { x: 8, y: 8 }, Coord { x: 8, y: 7 }, Coord { x: 8, y: 6 }];
        other.head = other.body[0];
        board.snakes.push(other);

        // The cap is reached even though the clock budget is already spent
        let first = engine.replay_turn(&board, "me", 9).unwrap();
        let second = engine.replay_turn(&board, "me", 9).unwrap();
        assert_eq!(first.1, 120);
        assert_eq!((first.0, first.1), (second.0, second.1));
    }

    #[test]
    fn test_replay_entry_for_lone_snake() {
        let mut config = Config::default_hardcoded();
        config.search.max_simulations = Some(20);
        let engine = ReplayEngine::new(config, true);

        // The neck is below the head on the wire, so wire up is the first free move
        let result = engine.replay_entry(&entry(4, "up")).unwrap();
        assert_eq!(result.turn, 4);
        assert_eq!(result.replayed_move, Direction::Up);
        assert!(result.matches);
    }

    #[test]
    fn test_replay_turn_requires_snake() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let board = entry(1, "up").board;
        assert!(engine.replay_turn(&board, "ghost", 1).is_err());
    }

    #[test]
    fn test_replay_turns_reports_missing_turn() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        assert!(engine.replay_turns(&[entry(1, "up")], &[2]).is_err());
    }
}
