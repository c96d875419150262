use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use engine::{error_chain, AudioError, AudioScheduler, FadeHandle, LineConsole, Score};
use tracing::{error, info, warn};

use super::bootstrap::{AppError, AppWiring};
use super::gameplay::{play_round, GamePhase, RoundOutcome};
use super::screens::{
    leaderboard_lines, win_lines, GAME_OVER_ART, INTRO_PARAGRAPHS, TITLE_ART,
};

const MENU_TITLE: &str = "MAIN MENU";
const MENU_PROMPT: &str = "> ";
const NAME_PROMPT: &str = "What is your name? | ";
const INTRO_PROMPT: &str = "I should tell you what's happened. (type anything to skip) ";
const CONTINUE_PROMPT: &str = "(Press Enter to continue)";
const PASSWORD_PROMPT: &str = "Password (type nothing to exit): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Play,
    Leaderboard,
    EnableDebug,
    Exit,
}

impl MenuChoice {
    const ALL: [Self; 4] = [Self::Play, Self::Leaderboard, Self::EnableDebug, Self::Exit];

    fn label(self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Leaderboard => "Leaderboard",
            Self::EnableDebug => "Enable Debugging",
            Self::Exit => "Exit",
        }
    }
}

/// Whether the menu keeps going after a play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let stdin = io::stdin();
    let mut console = LineConsole::new(stdin.lock(), io::stdout());
    let result = run_menu(&mut app, &mut console);

    if let Some(audio) = app.audio.take() {
        audio.close();
    }

    match result {
        Ok(()) => {
            info!("shutdown");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %error_chain(&err), "session_failed");
            ExitCode::FAILURE
        }
    }
}

pub(crate) fn run_menu<R: BufRead, W: Write>(
    app: &mut AppWiring,
    console: &mut LineConsole<R, W>,
) -> Result<(), AppError> {
    console.write_lines(TITLE_ART)?;
    loop {
        let Some(choice) = prompt_menu(console)? else {
            info!("menu_input_closed");
            break;
        };
        let flow = match choice {
            MenuChoice::Play => play(app, console)?,
            MenuChoice::Leaderboard => {
                console.write_lines(leaderboard_lines(app.leaderboard.all_scores()))?;
                console.write_line("")?;
                Flow::Continue
            }
            MenuChoice::EnableDebug => enable_debug(app, console)?,
            MenuChoice::Exit => Flow::Exit,
        };
        if flow == Flow::Exit {
            break;
        }
    }
    Ok(())
}

fn prompt_menu<R: BufRead, W: Write>(
    console: &mut LineConsole<R, W>,
) -> io::Result<Option<MenuChoice>> {
    let count = MenuChoice::ALL.len();
    loop {
        console.write_line(MENU_TITLE)?;
        for (index, choice) in MenuChoice::ALL.iter().enumerate() {
            console.write_line(&format!("{:2}) {}", index + 1, choice.label()))?;
        }
        let Some(raw) = console.prompt(MENU_PROMPT)? else {
            return Ok(None);
        };
        match raw.trim().parse::<i64>() {
            Ok(value) if value >= 1 && value <= count as i64 => {
                return Ok(Some(MenuChoice::ALL[(value - 1) as usize]));
            }
            Ok(_) => console.write_line(&format!(
                "Value out of range. Valid options range from 1 to {count}"
            ))?,
            Err(err) => console.write_line(&format!("Error reading value. ({err})"))?,
        }
        console.write_line("")?;
    }
}

fn play<R: BufRead, W: Write>(
    app: &mut AppWiring,
    console: &mut LineConsole<R, W>,
) -> Result<Flow, AppError> {
    let Some(name) = console.prompt(NAME_PROMPT)? else {
        return Ok(Flow::Exit);
    };
    let name = name.trim().to_string();
    console.write_line(&format!("That's a nice name, {name}."))?;

    let Some(skip) = console.prompt(INTRO_PROMPT)? else {
        return Ok(Flow::Exit);
    };
    if skip.is_empty() && !show_intro(console)? {
        return Ok(Flow::Exit);
    }
    console.write_line("")?;

    app.state.set_debug_access(app.config.debug);
    app.state.init_game(&name)?;
    drive_audio(app.audio.as_ref(), "start", AudioScheduler::start);

    while app.state.is_running() {
        match play_round(&mut app.state, &app.dispatcher, console)? {
            RoundOutcome::Completed => {
                let next = app.state.audio_state();
                drive_audio(app.audio.as_ref(), "transition", |audio| {
                    audio.transition(next)
                });
            }
            RoundOutcome::QuitRequested | RoundOutcome::InputClosed => {
                drive_audio(app.audio.as_ref(), "stop", AudioScheduler::stop);
                info!(turn = app.state.turn_counter(), "play_abandoned");
                return Ok(Flow::Exit);
            }
        }
    }
    drive_audio(app.audio.as_ref(), "stop", AudioScheduler::stop);

    match app.state.phase() {
        GamePhase::Won => {
            let score = app.state.score();
            let player = app.state.player_name().to_string();
            console.write_lines(win_lines(&player, score))?;
            app.leaderboard.add_score(Score::new(player, score));
            if let Err(err) = app.leaderboard.save() {
                error!(error = %error_chain(&err), "leaderboard_save_failed");
            }
        }
        _ => console.write_lines(GAME_OVER_ART)?,
    }
    console.write_line("")?;
    Ok(Flow::Continue)
}

/// Returns `false` when input closed part way through.
fn show_intro<R: BufRead, W: Write>(console: &mut LineConsole<R, W>) -> io::Result<bool> {
    for paragraph in INTRO_PARAGRAPHS {
        console.write_line("")?;
        console.write_lines(paragraph.iter())?;
        if console.prompt(CONTINUE_PROMPT)?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

fn enable_debug<R: BufRead, W: Write>(
    app: &mut AppWiring,
    console: &mut LineConsole<R, W>,
) -> Result<Flow, AppError> {
    if app.config.debug.is_enabled() {
        console.write_line("Debugging is already enabled!")?;
        console.write_line("")?;
        return Ok(Flow::Continue);
    }

    loop {
        let Some(password) = console.prompt(PASSWORD_PROMPT)? else {
            return Ok(Flow::Exit);
        };
        if password.is_empty() {
            break;
        }
        if app.config.promote_debug(&password) {
            console.write_line("Debugging is enabled")?;
            break;
        }
        console.write_line("Incorrect password.")?;
    }
    console.write_line("")?;
    Ok(Flow::Continue)
}

/// Audio faults are logged and never end the game.
fn drive_audio<F>(audio: Option<&AudioScheduler>, action: &'static str, op: F)
where
    F: FnOnce(&AudioScheduler) -> Result<Option<FadeHandle>, AudioError>,
{
    let Some(audio) = audio else {
        return;
    };
    if let Err(err) = op(audio) {
        warn!(action, error = %error_chain(&err), "audio_command_failed");
    }
}
