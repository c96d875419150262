mod commands;
mod entities;
mod map;
mod render;
mod session;
mod state;

pub(crate) use commands::{build_dispatcher, GameDispatcher};
pub(crate) use map::DEFAULT_LAYOUT;
pub(crate) use session::{play_round, RoundOutcome};
pub(crate) use state::{GameError, GamePhase, GameRules, GameState};
