use std::fs::File;
use std::io;
use std::path::PathBuf;

use engine::{
    AppPaths, AudioError, AudioScheduler, ChannelLayout, ChannelSink, GridError, Leaderboard,
    LeaderboardError, MidiSink, PathsError, RegistryError, TracingSink, DEFAULT_MIDI_DEVICES,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use super::config::{load_config, ConfigError, GameConfig};
use super::gameplay::{build_dispatcher, GameDispatcher, GameError, GameState};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("game files not found")]
    Paths(#[from] PathsError),
    #[error("configuration rejected")]
    Config(#[from] ConfigError),
    #[error("map layout rejected")]
    Grid(#[from] GridError),
    #[error("leaderboard unavailable")]
    Leaderboard(#[from] LeaderboardError),
    #[error("audio unavailable")]
    Audio(#[from] AudioError),
    #[error("game could not start")]
    Game(#[from] GameError),
    #[error("command registration failed")]
    Registry(#[from] RegistryError),
    #[error("console i/o failed")]
    Io(#[from] io::Error),
}

/// Collaborators for one process: config, persistence, audio, commands, game.
pub(crate) struct AppWiring {
    pub(crate) config: GameConfig,
    pub(crate) leaderboard: Leaderboard,
    pub(crate) audio: Option<AudioScheduler>,
    pub(crate) dispatcher: GameDispatcher,
    pub(crate) state: GameState,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Rescue Run Startup ===");

    let config = load_config()?;
    let paths = AppPaths::discover()?;
    info!(root = %paths.root.display(), "app_paths_resolved");

    let grid = config.build_grid()?;
    let leaderboard = Leaderboard::load(paths.leaderboard_path())?;
    info!(
        path = %leaderboard.path().display(),
        scores = leaderboard.all_scores().len(),
        "leaderboard_loaded"
    );

    let audio = if config.audio_enabled {
        let scheduler = AudioScheduler::open(
            &paths.theme_path(),
            ChannelLayout::default(),
            config.fade_timings(),
            channel_sink(&config),
        )?;
        Some(scheduler)
    } else {
        info!("audio_disabled");
        None
    };

    let dispatcher = build_dispatcher()?;
    let rng = match config.seed {
        Some(seed) => {
            info!(seed, "rng_seeded");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };
    let state = GameState::new(grid, config.rules(), rng, config.debug);

    Ok(AppWiring {
        config,
        leaderboard,
        audio,
        dispatcher,
        state,
    })
}

/// MIDI output when a device opens, otherwise the logging sink.
fn channel_sink(config: &GameConfig) -> Box<dyn ChannelSink> {
    let candidates = midi_candidates(config);
    match open_midi_output(&candidates) {
        Some(sink) => Box::new(sink),
        None => {
            warn!(
                tried = candidates.len(),
                "no MIDI output available; music cues are only logged"
            );
            Box::new(TracingSink)
        }
    }
}

fn midi_candidates(config: &GameConfig) -> Vec<PathBuf> {
    match &config.midi_device {
        Some(device) => vec![device.clone()],
        None => DEFAULT_MIDI_DEVICES.iter().map(PathBuf::from).collect(),
    }
}

fn open_midi_output(candidates: &[PathBuf]) -> Option<MidiSink<File>> {
    candidates
        .iter()
        .find_map(|device| match MidiSink::open_device(device) {
            Ok(sink) => Some(sink),
            Err(err) => {
                debug!(device = %device.display(), error = %err, "midi_device_unavailable");
                None
            }
        })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
