use std::collections::HashSet;

use engine::{Direction, Grid, Point};
use rand::Rng;
use tracing::debug;

const QUARRY_MOVE_CHANCE: (u32, u32) = (1, 3);
const HOSTILE_MOVE_CHANCE: (u32, u32) = (2, 5);

pub(crate) const MSG_ALREADY_CARRYING: &str =
    "The robot did nothing because it already has Desmond.";
pub(crate) const MSG_PICKED_UP: &str = "The robot picked up Desmond.";
pub(crate) const MSG_NOTHING_TO_PICK_UP: &str =
    "The robot tried to pick up Desmond. There was no Desmond to pick up.";

/// What the agent will do on its next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    Move { direction: Direction, distance: u32 },
    Pickup,
}

/// How the agent's tick left the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AgentOutcome {
    Continue,
    Won,
    Caught,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Agent {
    pub(crate) position: Point,
    pub(crate) carrying: bool,
    pub(crate) intent: Option<Intent>,
}

impl Agent {
    pub(crate) fn at(position: Point) -> Self {
        Self {
            position,
            carrying: false,
            intent: None,
        }
    }

    /// Applies the pending intent, then checks the win and capture rules.
    /// Reaching home with the quarry wins even if a hostile stands there.
    pub(crate) fn tick(
        &mut self,
        grid: &mut Grid,
        quarry: &mut Quarry,
        hostiles: &[Hostile],
        output: &mut Vec<String>,
    ) -> AgentOutcome {
        match self.intent.take() {
            Some(Intent::Move {
                direction,
                distance,
            }) => {
                self.position = grid.try_move(self.position, direction, distance, true);
            }
            Some(Intent::Pickup) => self.pick_up(quarry, output),
            None => debug!("agent_tick_without_intent"),
        }

        if self.carrying && self.position == grid.home() {
            return AgentOutcome::Won;
        }
        if hostiles
            .iter()
            .any(|hostile| hostile.position == self.position)
        {
            return AgentOutcome::Caught;
        }
        AgentOutcome::Continue
    }

    fn pick_up(&mut self, quarry: &mut Quarry, output: &mut Vec<String>) {
        if self.carrying {
            output.push(MSG_ALREADY_CARRYING.to_string());
        } else if self.position == quarry.position {
            output.push(MSG_PICKED_UP.to_string());
            self.carrying = true;
            quarry.picked_up = true;
        } else {
            output.push(MSG_NOTHING_TO_PICK_UP.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Quarry {
    pub(crate) position: Point,
    pub(crate) picked_up: bool,
}

impl Quarry {
    pub(crate) fn at(position: Point) -> Self {
        Self {
            position,
            picked_up: false,
        }
    }

    /// Follows the agent once carried; otherwise wanders one tile now and then.
    pub(crate) fn tick<R: Rng + ?Sized>(
        &mut self,
        agent_position: Point,
        grid: &mut Grid,
        rng: &mut R,
    ) {
        if self.picked_up {
            self.position = agent_position;
            return;
        }
        let (numerator, denominator) = QUARRY_MOVE_CHANCE;
        if rng.gen_ratio(numerator, denominator) {
            let direction = random_direction(rng);
            self.position = grid.try_move(self.position, direction, 1, false);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hostile {
    pub(crate) position: Point,
}

impl Hostile {
    pub(crate) fn at(position: Point) -> Self {
        Self { position }
    }

    /// Wanders one tile now and then, never onto a tile in `occupied`.
    /// `occupied` is kept in sync with the move.
    pub(crate) fn tick<R: Rng + ?Sized>(
        &mut self,
        grid: &mut Grid,
        occupied: &mut HashSet<Point>,
        rng: &mut R,
    ) {
        let (numerator, denominator) = HOSTILE_MOVE_CHANCE;
        if !rng.gen_ratio(numerator, denominator) {
            return;
        }
        let direction = random_direction(rng);
        let next = grid.try_move(self.position, direction, 1, false);
        if next == self.position || occupied.contains(&next) {
            return;
        }
        occupied.remove(&self.position);
        occupied.insert(next);
        self.position = next;
    }
}

fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}
