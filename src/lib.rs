// Library exports for the Battlesnake MCTS engine
// The server, the replay tool and the self-play driver all build on these

pub mod bot;
pub mod config;
pub mod debug_logger;
pub mod duct;
pub mod geometry;
pub mod moves;
pub mod replay;
pub mod rollout;
pub mod search;
pub mod simulator;
pub mod suct;
pub mod types;
