use std::num::ParseIntError;

use engine::{CommandDispatcher, CommandHandlerError, Direction, RegistryError};
use thiserror::Error;
use tracing::info;

use super::entities::Intent;
use super::state::GameState;

pub(crate) type GameDispatcher = CommandDispatcher<GameState>;

const MIN_MOVE_DISTANCE: u32 = 1;

/// Status that ends the prompt for this round.
const STATUS_ACT: i32 = 0;
/// Status that asks for another command without spending a turn.
const STATUS_REPROMPT: i32 = 1;

#[derive(Debug, Error)]
pub(crate) enum ArgumentError {
    #[error("Command {command} only takes one argument ({command} <dist>)")]
    TooManyMoveArgs { command: String },
    #[error("The robot can only move {min}-{max} tiles. (got {got})")]
    DistanceOutOfRange { min: u32, max: u32, got: i64 },
    #[error("'{raw}' is not a whole number of tiles")]
    InvalidDistance {
        raw: String,
        #[source]
        source: ParseIntError,
    },
    #[error("Command {command} takes no arguments")]
    UnexpectedArgs { command: String },
    #[error("Debug mode is not enabled.")]
    DebugDisabled,
    #[error(
        "Command {command} only takes two arguments ({command} <option...>); \
         see 'help debug' for more info"
    )]
    DebugArity { command: String },
    #[error("Unknown debug option '{option}'; see 'help debug' for more info")]
    UnknownDebugOption { option: String },
}

pub(crate) fn build_dispatcher() -> Result<GameDispatcher, RegistryError> {
    let mut dispatcher = GameDispatcher::new();
    dispatcher.register("help", "Show help", "[legend|debug]", cmd_help)?;
    dispatcher.register("w", "Move north", "[dist:1-3]", cmd_move)?;
    dispatcher.register("a", "Move west", "[dist:1-3]", cmd_move)?;
    dispatcher.register("s", "Move south", "[dist:1-3]", cmd_move)?;
    dispatcher.register("d", "Move east", "[dist:1-3]", cmd_move)?;
    dispatcher.register("p", "Pick up Desmond", "", cmd_pickup)?;
    dispatcher.register(
        "debug",
        "Debugging commands",
        "<desmond|force-win|quit>",
        cmd_debug,
    )?;
    dispatcher.register("give-up", "Give up on this game", "", cmd_give_up)?;
    Ok(dispatcher)
}

fn cmd_help(state: &mut GameState, args: &[String]) -> Result<i32, CommandHandlerError> {
    let topic = if args.len() == 2 {
        args[1].as_str()
    } else {
        ""
    };
    match topic {
        "debug" if !state.debug_access().is_enabled() => {
            state.say("Debugging is NOT enabled.");
            state.say("Unlock it with 'Enable Debugging' in the main menu, or start the game");
            state.say("with RESCUE_DEBUG=1.");
        }
        "debug" => say_all(state, DEBUG_HELP),
        "legend" => say_all(state, LEGEND_HELP),
        _ => {
            let max = state.rules().max_move_distance;
            for line in COMMAND_HELP {
                let line = line.replace("{max}", &max.to_string());
                state.say(line);
            }
        }
    }
    Ok(STATUS_REPROMPT)
}

fn cmd_move(state: &mut GameState, args: &[String]) -> Result<i32, CommandHandlerError> {
    let command = args[0].as_str();
    if args.len() > 2 {
        return Err(ArgumentError::TooManyMoveArgs {
            command: command.to_string(),
        }
        .into());
    }

    let max = state.rules().max_move_distance;
    let distance = match args.get(1) {
        Some(raw) => {
            let got = raw
                .parse::<i64>()
                .map_err(|source| ArgumentError::InvalidDistance {
                    raw: raw.clone(),
                    source,
                })?;
            if got < i64::from(MIN_MOVE_DISTANCE) || got > i64::from(max) {
                return Err(ArgumentError::DistanceOutOfRange {
                    min: MIN_MOVE_DISTANCE,
                    max,
                    got,
                }
                .into());
            }
            got as u32
        }
        None => MIN_MOVE_DISTANCE,
    };

    let Some(direction) = Direction::from_key(command) else {
        return Err(format!("'{command}' is not a movement command").into());
    };
    state.queue_intent(Intent::Move {
        direction,
        distance,
    });
    Ok(STATUS_ACT)
}

fn cmd_pickup(state: &mut GameState, args: &[String]) -> Result<i32, CommandHandlerError> {
    if args.len() != 1 {
        return Err(ArgumentError::UnexpectedArgs {
            command: args[0].clone(),
        }
        .into());
    }
    state.queue_intent(Intent::Pickup);
    Ok(STATUS_ACT)
}

fn cmd_debug(state: &mut GameState, args: &[String]) -> Result<i32, CommandHandlerError> {
    if !state.debug_access().is_enabled() {
        return Err(ArgumentError::DebugDisabled.into());
    }
    if args.len() != 2 {
        return Err(ArgumentError::DebugArity {
            command: args[0].clone(),
        }
        .into());
    }

    match args[1].as_str() {
        "desmond" => {
            let position = state.quarry().position;
            state.say(format!("Desmond's position is {position}"));
            Ok(STATUS_REPROMPT)
        }
        "force-win" => {
            info!("debug_force_win");
            state.trigger_win();
            Ok(STATUS_ACT)
        }
        "quit" => {
            info!("debug_quit_requested");
            state.request_quit();
            Ok(STATUS_ACT)
        }
        other => Err(ArgumentError::UnknownDebugOption {
            option: other.to_string(),
        }
        .into()),
    }
}

fn cmd_give_up(state: &mut GameState, _args: &[String]) -> Result<i32, CommandHandlerError> {
    state.say("You just gave up on poor Desmond. How could you??");
    state.trigger_game_over();
    Ok(STATUS_ACT)
}

fn say_all(state: &mut GameState, lines: &[&str]) {
    for line in lines {
        state.say(*line);
    }
}

const COMMAND_HELP: &[&str] = &[
    "Here's a list of commands that you can issue to the robot:",
    "==========================================================",
    "w <dist>",
    "  Try to move north by <dist> metres.",
    "a <dist>",
    "  Try to move west by <dist> metres.",
    "s <dist>",
    "  Try to move south by <dist> metres.",
    "d <dist>",
    "  Try to move east by <dist> metres.",
    "NOTE 0: the robot can only move up to {max} metres at a time.",
    "NOTE 1: if no distance is specified, the default is 1.",
    "",
    "p",
    "  Pick up Desmond. This only works if the robot and Desmond ",
    "  are on the same tile (indicated using curly brackets {})",
    "",
    "give-up",
    "  Give up on this game. (then again, why would you??)",
    "",
    "help",
    "  Show the command list again, in case you forget.",
    "help legend",
    "  Show a legend of the map, in case you are confused.",
    "help debug",
    "  Show a list of debugging commands.",
    "  (e.g. forcing a win, showing Desmond's position, etc...)",
    "==========================================================",
];

const LEGEND_HELP: &[&str] = &[
    "Here's a legend:",
    "============================================================",
    "BRACKETS",
    "[ ] - unvisited",
    "( ) - visited",
    "{ } - interactable (i.e. robot can or has picked up Desmond)",
    "",
    "TILES",
    "? - unvisited and out of sight",
    "$ - visited, but out of sight",
    "",
    "R - robot",
    "x - wall",
    "! - front door",
    "D - Desmond",
    "E - enemy",
    "============================================================",
];

const DEBUG_HELP: &[&str] = &[
    "Here's a list of commands for debugging:",
    "========================================",
    "debug desmond",
    "  Prints Desmond's current grid coordinates.",
    "debug force-win",
    "  Magically causes you to win.",
    "debug quit",
    "  Immediately shuts down the program.",
    "========================================",
];
