mod fader;
mod gate;
mod midi_out;
mod scheduler;
mod sink;
mod theme;
mod volumes;

use std::time::Duration;

pub use fader::FadeHandle;
pub use midi_out::{MidiSink, DEFAULT_MIDI_DEVICES};
pub use scheduler::{AudioError, AudioScheduler};
pub use sink::{ChannelSink, RecordingSink, SinkEvent, TracingSink};
pub use theme::{
    ThemeAsset, ThemeAssetError, ThemeEvent, ThemeEventKind, DEFAULT_TEMPO_MICROS,
    THEME_LOOP_START_TICK,
};

pub type ChannelId = u8;

pub const NOMINAL_VOLUME: u8 = 100;
pub const FADE_STEPS: u32 = 100;

/// Discrete layering level derived from how close the agent is to the quarry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum TransitionState {
    #[default]
    Far = 0,
    Near = 1,
    Carrying = 2,
}

impl TransitionState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Far),
            1 => Some(Self::Near),
            2 => Some(Self::Carrying),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalLayer {
    pub channel: ChannelId,
    pub enabled_from: TransitionState,
}

/// Which channels always play and which fade in with the transition state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    pub always_on: Vec<ChannelId>,
    pub optional: Vec<OptionalLayer>,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        // horn, trombone, tuba; glockenspiel joins when near, snare when carrying
        Self {
            always_on: vec![0, 1, 2],
            optional: vec![
                OptionalLayer {
                    channel: 3,
                    enabled_from: TransitionState::Near,
                },
                OptionalLayer {
                    channel: 9,
                    enabled_from: TransitionState::Carrying,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeTimings {
    pub fade_out: Duration,
    pub transition: Duration,
}

impl Default for FadeTimings {
    fn default() -> Self {
        Self {
            fade_out: Duration::from_millis(500),
            transition: Duration::from_millis(1000),
        }
    }
}
