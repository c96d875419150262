mod atomic_io;
mod leaderboard;

pub use leaderboard::{Leaderboard, LeaderboardError, Score, LEADERBOARD_FORMAT_VERSION};
