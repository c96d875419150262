use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::{ChannelId, ThemeAsset};

/// Output side of the scheduler: whatever actually produces sound.
///
/// Calls arrive from the caller thread (`start`) and from the fader thread,
/// never concurrently.
pub trait ChannelSink: Send {
    fn start_playback(&mut self, theme: &ThemeAsset);
    fn stop_playback(&mut self);
    fn set_volume(&mut self, channel: ChannelId, volume: u8);
}

/// Sink that only reports through `tracing`. Used when no synthesizer is
/// attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ChannelSink for TracingSink {
    fn start_playback(&mut self, theme: &ThemeAsset) {
        info!(
            tracks = theme.track_count(),
            division = theme.division(),
            loop_start_tick = theme.loop_start_tick(),
            "theme_playback_started"
        );
    }

    fn stop_playback(&mut self) {
        info!("theme_playback_stopped");
    }

    fn set_volume(&mut self, channel: ChannelId, volume: u8) {
        // Every tenth step, which includes both ends of a ramp.
        if volume % 10 == 0 {
            debug!(channel, volume, "channel_volume");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Started { loop_start_tick: u32 },
    Stopped,
    Volume { channel: ChannelId, volume: u8 },
}

/// Sink that records every call; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Last volume written to `channel`, if any.
    pub fn last_volume(&self, channel: ChannelId) -> Option<u8> {
        self.events().iter().rev().find_map(|event| match event {
            SinkEvent::Volume {
                channel: seen,
                volume,
            } if *seen == channel => Some(*volume),
            _ => None,
        })
    }

    fn push(&self, event: SinkEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl ChannelSink for RecordingSink {
    fn start_playback(&mut self, theme: &ThemeAsset) {
        self.push(SinkEvent::Started {
            loop_start_tick: theme.loop_start_tick(),
        });
    }

    fn stop_playback(&mut self) {
        self.push(SinkEvent::Stopped);
    }

    fn set_volume(&mut self, channel: ChannelId, volume: u8) {
        self.push(SinkEvent::Volume { channel, volume });
    }
}
