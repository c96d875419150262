use std::collections::HashSet;

use engine::{Grid, Point, TransitionState};
use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use super::entities::{Agent, AgentOutcome, Hostile, Intent, Quarry};
use crate::app::config::DebugAccess;

#[derive(Debug, Error)]
pub(crate) enum GameError {
    #[error(
        "no valid spawn point found after {attempts} attempts \
         (clear zone {clear_zone}, {hostiles} hostiles placed)"
    )]
    UnsatisfiableSpawn {
        attempts: u64,
        clear_zone: i32,
        hostiles: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GamePhase {
    NotStarted,
    Running,
    Won,
    GameOver,
}

/// Tunables for one game; see `GameConfig` for the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GameRules {
    pub(crate) sight_radius: i32,
    pub(crate) warning_radius: i32,
    pub(crate) clear_zone: i32,
    pub(crate) hostile_count: usize,
    pub(crate) max_move_distance: u32,
    pub(crate) spawn_attempt_cap: Option<u64>,
}

/// Everything one game of rescue needs: terrain, entities, counters.
///
/// Command handlers write player-facing text with [`GameState::say`]; the
/// session drains it after every command and tick.
pub(crate) struct GameState {
    grid: Grid,
    rules: GameRules,
    rng: StdRng,
    debug: DebugAccess,
    phase: GamePhase,
    agent: Agent,
    quarry: Quarry,
    hostiles: Vec<Hostile>,
    turn_counter: u32,
    score: u64,
    player_name: String,
    output: Vec<String>,
    quit_requested: bool,
}

impl GameState {
    pub(crate) fn new(grid: Grid, rules: GameRules, rng: StdRng, debug: DebugAccess) -> Self {
        let home = grid.home();
        Self {
            grid,
            rules,
            rng,
            debug,
            phase: GamePhase::NotStarted,
            agent: Agent::at(home),
            quarry: Quarry::at(home),
            hostiles: Vec::new(),
            turn_counter: 0,
            score: 0,
            player_name: String::new(),
            output: Vec::new(),
            quit_requested: false,
        }
    }

    /// Resets the board and places every entity for a fresh game.
    pub(crate) fn init_game(&mut self, name: &str) -> Result<(), GameError> {
        self.grid.clear_visited();
        let home = self.grid.home();
        self.grid.mark_visited(home);

        self.agent = Agent::at(home);
        self.hostiles.clear();
        let quarry_spawn = self.spawn_point()?;
        self.quarry = Quarry::at(quarry_spawn);
        for _ in 0..self.rules.hostile_count {
            let spawn = self.spawn_point()?;
            self.hostiles.push(Hostile::at(spawn));
        }

        self.score = 0;
        self.turn_counter = 0;
        self.player_name = name.to_string();
        self.output.clear();
        self.quit_requested = false;
        self.phase = GamePhase::Running;
        info!(
            player = %self.player_name,
            quarry = %self.quarry.position,
            hostiles = self.hostiles.len(),
            "game_started"
        );
        Ok(())
    }

    /// Uniform random floor tile outside the clear zone on both axes and not
    /// under a hostile.
    pub(crate) fn spawn_point(&mut self) -> Result<Point, GameError> {
        let home = self.grid.home();
        let clear_zone = self.rules.clear_zone;
        let mut attempts = 0u64;
        loop {
            if let Some(cap) = self.rules.spawn_attempt_cap {
                if attempts >= cap {
                    return Err(GameError::UnsatisfiableSpawn {
                        attempts,
                        clear_zone,
                        hostiles: self.hostiles.len(),
                    });
                }
            }
            attempts += 1;

            let candidate = Point::new(
                self.rng.gen_range(0..self.grid.width()),
                self.rng.gen_range(0..self.grid.height()),
            );
            let offset = candidate - home;
            if offset.x.abs() <= clear_zone || offset.y.abs() <= clear_zone {
                continue;
            }
            if self.grid.collides_at(candidate) || self.hostile_at(candidate) {
                continue;
            }
            return Ok(candidate);
        }
    }

    /// Ticks the agent, the quarry, then each hostile in order.
    pub(crate) fn tick_all(&mut self) {
        let outcome = self.agent.tick(
            &mut self.grid,
            &mut self.quarry,
            &self.hostiles,
            &mut self.output,
        );
        match outcome {
            AgentOutcome::Won => self.trigger_win(),
            AgentOutcome::Caught => self.trigger_game_over(),
            AgentOutcome::Continue => {}
        }

        self.quarry
            .tick(self.agent.position, &mut self.grid, &mut self.rng);

        let mut occupied: HashSet<Point> = self
            .hostiles
            .iter()
            .map(|hostile| hostile.position)
            .collect();
        for hostile in &mut self.hostiles {
            hostile.tick(&mut self.grid, &mut occupied, &mut self.rng);
        }
    }

    /// Adds this turn's distance penalty and bumps the turn counter.
    pub(crate) fn update_counters(&mut self) {
        let distance = self.agent.position.manhattan_to(self.quarry.position);
        self.score += distance.unsigned_abs() as u64;
        self.turn_counter += 1;
    }

    /// Ticks everything and scores the turn, unless the game already ended
    /// during the command phase.
    pub(crate) fn advance_turn(&mut self) {
        if !self.is_running() {
            return;
        }
        self.tick_all();
        self.update_counters();
        debug!(
            turn = self.turn_counter,
            score = self.score,
            agent = %self.agent.position,
            "round_completed"
        );
    }

    pub(crate) fn audio_state(&self) -> TransitionState {
        let distance = self.agent.position.chebyshev_to(self.quarry.position);
        if distance > self.rules.warning_radius {
            TransitionState::Far
        } else if self.agent.carrying {
            TransitionState::Carrying
        } else {
            TransitionState::Near
        }
    }

    pub(crate) fn trigger_win(&mut self) {
        self.phase = GamePhase::Won;
        info!(turn = self.turn_counter, score = self.score, "game_won");
    }

    pub(crate) fn trigger_game_over(&mut self) {
        self.phase = GamePhase::GameOver;
        info!(turn = self.turn_counter, score = self.score, "game_over");
    }

    pub(crate) fn queue_intent(&mut self, intent: Intent) {
        self.agent.intent = Some(intent);
    }

    pub(crate) fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub(crate) fn say(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    pub(crate) fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn hostile_at(&self, at: Point) -> bool {
        self.hostiles.iter().any(|hostile| hostile.position == at)
    }

    pub(crate) fn phase(&self) -> GamePhase {
        self.phase
    }

    pub(crate) fn is_running(&self) -> bool {
        self.phase == GamePhase::Running
    }

    pub(crate) fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub(crate) fn agent(&self) -> &Agent {
        &self.agent
    }

    pub(crate) fn quarry(&self) -> &Quarry {
        &self.quarry
    }

    pub(crate) fn hostiles(&self) -> &[Hostile] {
        &self.hostiles
    }

    pub(crate) fn score(&self) -> u64 {
        self.score
    }

    pub(crate) fn turn_counter(&self) -> u32 {
        self.turn_counter
    }

    pub(crate) fn player_name(&self) -> &str {
        &self.player_name
    }

    pub(crate) fn debug_access(&self) -> DebugAccess {
        self.debug
    }

    pub(crate) fn set_debug_access(&mut self, debug: DebugAccess) {
        self.debug = debug;
    }
}

#[cfg(test)]
impl GameState {
    pub(crate) fn place_agent(&mut self, position: Point, carrying: bool) {
        self.agent.position = position;
        self.agent.carrying = carrying;
        self.grid.mark_visited(position);
    }

    pub(crate) fn place_quarry(&mut self, position: Point, picked_up: bool) {
        self.quarry.position = position;
        self.quarry.picked_up = picked_up;
    }

    pub(crate) fn place_hostiles(&mut self, positions: &[Point]) {
        self.hostiles = positions.iter().copied().map(Hostile::at).collect();
    }
}
