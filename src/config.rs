// Configuration module for reading Snake.toml
// Search tuning, timing and the food rules used when a snapshot omits them

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::search::SearchAlgorithm;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub timing: TimingConfig,
    pub search: SearchConfig,
    pub rollout: RolloutConfig,
    pub game_rules: GameRulesConfig,
    pub debug: DebugConfig,
}

/// Timing constants
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimingConfig {
    pub response_time_budget_ms: u64,
    pub network_overhead_ms: u64,
}

impl TimingConfig {
    /// Computes the effective computation budget
    pub fn effective_budget_ms(&self) -> u64 {
        self.response_time_budget_ms.saturating_sub(self.network_overhead_ms)
    }
}

/// Tree search selection
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SearchConfig {
    pub algorithm: SearchAlgorithm,
    /// UCB1 exploration weight `c`
    pub exploration_constant: f64,
    /// Hard cap on simulations per move, checked together with the time budget
    #[serde(default)]
    pub max_simulations: Option<u64>,
}

/// Playout policy
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RolloutConfig {
    pub horizon: usize,
    pub greedy_probability: f64,
}

/// Food rules applied when the ruleset settings of a game do not carry them
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GameRulesConfig {
    pub min_food: usize,
    pub food_spawn_chance: u8,
}

/// Debug configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Snake.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Snake.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Snake.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Snake.toml
    pub fn default_hardcoded() -> Self {
        Config {
            timing: TimingConfig {
                response_time_budget_ms: 200,
                network_overhead_ms: 50,
            },
            search: SearchConfig {
                algorithm: SearchAlgorithm::Duct,
                exploration_constant: 1.0,
                max_simulations: None,
            },
            rollout: RolloutConfig {
                horizon: 50,
                greedy_probability: 0.9,
            },
            game_rules: GameRulesConfig {
                min_food: 1,
                food_spawn_chance: 15,
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "battlesnake_debug.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load Snake.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_budget_calculation() {
        let config = Config::default_hardcoded();
        assert_eq!(config.timing.effective_budget_ms(), 150);
    }

    #[test]
    fn test_effective_budget_saturates() {
        let timing = TimingConfig {
            response_time_budget_ms: 30,
            network_overhead_ms: 50,
        };
        assert_eq!(timing.effective_budget_ms(), 0);
    }

    #[test]
    fn test_snake_toml_can_be_parsed() {
        let result = Config::from_file("Snake.toml");
        assert!(
            result.is_ok(),
            "Failed to parse Snake.toml: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_all_config_values_match_hardcoded_defaults() {
        let file_config = Config::from_file("Snake.toml").expect("Snake.toml should be parseable");
        assert_eq!(file_config, Config::default_hardcoded());
    }

    #[test]
    fn test_max_simulations_is_optional() {
        let toml_text = r#"
            [timing]
            response_time_budget_ms = 500
            network_overhead_ms = 100

            [search]
            algorithm = "suct"
            exploration_constant = 1.4

            [rollout]
            horizon = 20
            greedy_probability = 0.5

            [game_rules]
            min_food = 3
            food_spawn_chance = 20

            [debug]
            enabled = true
            log_file_path = "games.jsonl"
        "#;
        let config: Config = toml::from_str(toml_text).expect("inline config should parse");
        assert_eq!(config.search.algorithm, SearchAlgorithm::Suct);
        assert_eq!(config.search.max_simulations, None);
        assert_eq!(config.timing.effective_budget_ms(), 400);

        let capped = toml_text.replace(
            "exploration_constant = 1.4",
            "exploration_constant = 1.4\nmax_simulations = 1000",
        );
        let config: Config = toml::from_str(&capped).expect("capped config should parse");
        assert_eq!(config.search.max_simulations, Some(1000));
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let toml_text = r#"
            [timing]
            response_time_budget_ms = 200
            network_overhead_ms = 50

            [search]
            algorithm = "minimax"
            exploration_constant = 1.0

            [rollout]
            horizon = 50
            greedy_probability = 0.9

            [game_rules]
            min_food = 1
            food_spawn_chance = 15

            [debug]
            enabled = false
            log_file_path = "battlesnake_debug.jsonl"
        "#;
        assert!(toml::from_str::<Config>(toml_text).is_err());
    }

    #[test]
    fn test_load_or_default_works() {
        let config = Config::load_or_default();
        assert_eq!(config.rollout.horizon, 50);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = Config::from_file("nonexistent.toml");
        assert!(result.is_err());
    }
}
