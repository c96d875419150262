use std::io::{self, BufRead, Write};

use engine::{error_chain, LineConsole};
use tracing::debug;

use super::commands::GameDispatcher;
use super::render::render_view;
use super::state::GameState;

pub(crate) const COMMAND_PROMPT: &str = "Input command (\"help\" for help): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    /// The round ran to completion (the game may have ended in it).
    Completed,
    /// `debug quit` was issued.
    QuitRequested,
    /// Input reached end of file before a command was accepted.
    InputClosed,
}

/// Plays one round: prompt until a command acts, then tick and score.
///
/// The view is redrawn before every prompt. Parse and dispatch failures are
/// printed with their cause chain and do not consume the turn.
pub(crate) fn play_round<R: BufRead, W: Write>(
    state: &mut GameState,
    dispatcher: &GameDispatcher,
    console: &mut LineConsole<R, W>,
) -> io::Result<RoundOutcome> {
    loop {
        console.write_lines(render_view(state))?;
        let Some(line) = console.prompt(COMMAND_PROMPT)? else {
            debug!("command_input_closed");
            return Ok(RoundOutcome::InputClosed);
        };

        let result = dispatcher.execute(state, &line);
        console.write_lines(state.drain_output())?;
        match result {
            Ok(status) => {
                console.write_line("")?;
                if status == 0 || !state.is_running() {
                    break;
                }
            }
            Err(err) => {
                debug!(line = %line, error = %err, "command_rejected");
                console.write_lines(error_chain(&err).lines())?;
            }
        }
    }

    if state.quit_requested() {
        return Ok(RoundOutcome::QuitRequested);
    }

    if state.is_running() {
        state.advance_turn();
        let tick_output = state.drain_output();
        console.write_lines(tick_output)?;
        console.write_line("")?;
    }
    Ok(RoundOutcome::Completed)
}
