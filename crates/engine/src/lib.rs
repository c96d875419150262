pub mod audio;
pub mod console;
pub mod grid;
pub mod paths;
pub mod storage;

pub use audio::{
    AudioError, AudioScheduler, ChannelId, ChannelLayout, ChannelSink, FadeHandle, FadeTimings,
    MidiSink, OptionalLayer, RecordingSink, SinkEvent, ThemeAsset, ThemeAssetError, TracingSink,
    TransitionState, DEFAULT_MIDI_DEVICES,
};
pub use console::{
    error_chain, tokenize_line, CommandDispatcher, CommandError, CommandHandlerError,
    CommandSpec, LineConsole, ParseError, RegistryError, MAX_COMMAND_CHARS,
};
pub use grid::{Direction, Grid, GridError, Point, Tile};
pub use paths::{AppPaths, PathsError, ROOT_ENV_VAR};
pub use storage::{Leaderboard, LeaderboardError, Score};
