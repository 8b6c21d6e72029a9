// Time-bounded move selection
//
// Runs one of the two tree searches from a deep copy of the caller's board
// until the wall-clock budget is spent, then reads the best root move for the
// queried snake. A simulation is never interrupted: the clock is checked only
// between simulations, and the rollout horizon bounds how long one can take.

use log::{debug, info};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::duct::DuctSearch;
use crate::geometry::Direction;
use crate::moves::safe_moves;
use crate::rollout::RolloutSettings;
use crate::simulator::{BoardState, SnakeId};
use crate::suct::SuctSearch;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchAlgorithm {
    /// Decoupled UCT: one node per board, branching on joint moves
    Duct,
    /// Sequential UCT: one node per snake decision within a turn
    Suct,
}

impl SearchAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchAlgorithm::Duct => "duct",
            SearchAlgorithm::Suct => "suct",
        }
    }

    pub fn parse(s: &str) -> Result<SearchAlgorithm, String> {
        match s.to_lowercase().as_str() {
            "duct" => Ok(SearchAlgorithm::Duct),
            "suct" => Ok(SearchAlgorithm::Suct),
            _ => Err(format!("Unknown search algorithm: {}", s)),
        }
    }
}

/// Tuning shared by both tree searches
#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub exploration_constant: f64,
    pub rollout: RolloutSettings,
    /// Optional cap on simulations, checked alongside the time budget
    pub max_simulations: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            exploration_constant: 1.0,
            rollout: RolloutSettings::default(),
            max_simulations: None,
        }
    }
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        SearchSettings {
            exploration_constant: config.search.exploration_constant,
            rollout: RolloutSettings {
                horizon: config.rollout.horizon,
                greedy_probability: config.rollout.greedy_probability,
            },
            max_simulations: config.search.max_simulations,
        }
    }
}

/// Per-direction statistics of one snake at one node
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionStats {
    pub visits: u32,
    pub total_reward: f64,
}

impl ActionStats {
    pub fn mean(&self) -> Option<f64> {
        if self.visits == 0 {
            None
        } else {
            Some(self.total_reward / f64::from(self.visits))
        }
    }
}

/// UCB1 score; unvisited actions score infinity so they are tried first
pub fn ucb1(total_reward: f64, visits: u32, parent_visits: u32, exploration: f64) -> f64 {
    if visits == 0 {
        return f64::INFINITY;
    }
    let n = f64::from(visits);
    let parent = f64::from(parent_visits.max(1));
    total_reward / n + exploration * (parent.ln() / n).sqrt()
}

/// Direction with the highest mean among visited entries
pub fn best_by_mean<I>(candidates: I) -> Option<Direction>
where
    I: IntoIterator<Item = (Direction, ActionStats)>,
{
    candidates
        .into_iter()
        .filter_map(|(dir, stats)| stats.mean().map(|mean| (dir, mean)))
        .fold(None, |best: Option<(Direction, f64)>, (dir, mean)| match best {
            Some((_, best_mean)) if best_mean >= mean => best,
            _ => Some((dir, mean)),
        })
        .map(|(dir, _)| dir)
}

/// A tree search that can be advanced one simulation at a time
pub trait MoveSearch {
    /// Runs one selection/expansion/rollout/backpropagation pass
    fn simulate(&mut self, rng: &mut dyn RngCore);

    /// Best root move for the queried snake, or None without root statistics
    fn best_move(&self) -> Option<Direction>;

    /// Root statistics of the queried snake per direction, for logging
    fn root_stats(&self) -> Vec<(Direction, ActionStats)>;

    /// Number of nodes in the tree
    fn tree_size(&self) -> usize;
}

/// Outcome of one move-selection call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub direction: Direction,
    /// False when the root had no visited move and `direction` is the default
    pub from_statistics: bool,
    pub simulations: u64,
    pub tree_size: usize,
    pub elapsed: Duration,
}

impl SearchReport {
    /// The searched move, or the first safe move when the search had no
    /// root statistics (zero budget, or `you` is the last snake standing)
    pub fn move_or_first_safe(&self, board: &BoardState, you: SnakeId) -> Direction {
        if self.from_statistics {
            self.direction
        } else {
            safe_moves(board, you).first().copied().unwrap_or(Direction::Up)
        }
    }
}

pub fn new_search(
    algorithm: SearchAlgorithm,
    board: &BoardState,
    you: SnakeId,
    settings: SearchSettings,
) -> Box<dyn MoveSearch> {
    match algorithm {
        SearchAlgorithm::Duct => Box::new(DuctSearch::new(board, you, settings)),
        SearchAlgorithm::Suct => Box::new(SuctSearch::new(board, you, settings)),
    }
}

/// Searches for `budget` and returns the best move for `you`
///
/// Falls back to `Direction::Up` when not a single root move was visited.
pub fn choose_move(
    board: &BoardState,
    you: SnakeId,
    algorithm: SearchAlgorithm,
    budget: Duration,
    settings: SearchSettings,
    rng: &mut dyn RngCore,
) -> SearchReport {
    let start_time = Instant::now();
    let mut search = new_search(algorithm, board, you, settings);
    let mut simulations: u64 = 0;

    while start_time.elapsed() < budget {
        if settings.max_simulations.is_some_and(|max| simulations >= max) {
            break;
        }
        search.simulate(rng);
        simulations += 1;
    }

    for (dir, stats) in search.root_stats() {
        debug!(
            "{} root {}: visits={} mean={:?}",
            algorithm.as_str(),
            dir.as_str(),
            stats.visits,
            stats.mean()
        );
    }

    let best = search.best_move();
    let report = SearchReport {
        direction: best.unwrap_or(Direction::Up),
        from_statistics: best.is_some(),
        simulations,
        tree_size: search.tree_size(),
        elapsed: start_time.elapsed(),
    };

    info!(
        "{} search for {}: {} after {} simulations ({} nodes, {}ms)",
        algorithm.as_str(),
        you,
        report.direction.as_str(),
        report.simulations,
        report.tree_size,
        report.elapsed.as_millis()
    );

    report
}
