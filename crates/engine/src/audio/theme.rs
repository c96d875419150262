use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;
use tracing::info;

/// Tick the theme loops back to once it reaches the end.
pub const THEME_LOOP_START_TICK: u32 = 4096;

/// Tempo assumed until the first tempo meta event (120 bpm).
pub const DEFAULT_TEMPO_MICROS: u32 = 500_000;

const CC_VOLUME: u8 = 7;

#[derive(Debug, Error)]
pub enum ThemeAssetError {
    #[error("failed to read theme {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("theme at {path} is not a valid MIDI file: {message}")]
    InvalidFormat { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeEventKind {
    /// Encoded channel message, status byte first.
    Channel(Vec<u8>),
    /// Microseconds per quarter note from this tick on.
    Tempo(u32),
}

/// One event of the theme with its absolute tick across all tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeEvent {
    pub tick: u64,
    pub kind: ThemeEventKind,
}

/// Parsed Standard MIDI File, flattened into one time-ordered event list.
///
/// Volume controller events from the file are dropped: channel volume
/// belongs to the scheduler.
#[derive(Debug, Clone)]
pub struct ThemeAsset {
    path: PathBuf,
    format: u16,
    track_count: u16,
    division: u16,
    loop_start_tick: u32,
    end_tick: u64,
    events: Arc<[ThemeEvent]>,
}

impl ThemeAsset {
    pub fn load(path: &Path) -> Result<Self, ThemeAssetError> {
        let bytes = fs::read(path).map_err(|source| ThemeAssetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let theme = Self::from_bytes(path, bytes)?;
        info!(
            path = %path.display(),
            format = theme.format,
            tracks = theme.track_count,
            events = theme.events.len(),
            end_tick = theme.end_tick,
            "theme_loaded"
        );
        Ok(theme)
    }

    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self, ThemeAssetError> {
        let smf = Smf::parse(&bytes).map_err(|err| invalid_format(path, &err.to_string()))?;

        let format = match smf.header.format {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        };
        let division = match smf.header.timing {
            Timing::Metrical(ticks) if ticks.as_int() > 0 => ticks.as_int(),
            Timing::Metrical(_) => return Err(invalid_format(path, "division is zero")),
            Timing::Timecode(..) => {
                return Err(invalid_format(path, "timecode division is not supported"))
            }
        };
        if smf.tracks.is_empty() {
            return Err(invalid_format(path, "file contains no tracks"));
        }
        if format == 0 && smf.tracks.len() != 1 {
            return Err(invalid_format(path, "format 0 requires exactly one track"));
        }
        let track_count = u16::try_from(smf.tracks.len())
            .map_err(|_| invalid_format(path, "too many tracks"))?;

        let (events, end_tick) = flatten_tracks(&smf, format == 2);

        Ok(Self {
            path: path.to_path_buf(),
            format,
            track_count,
            division,
            loop_start_tick: THEME_LOOP_START_TICK,
            end_tick,
            events: events.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> u16 {
        self.format
    }

    pub fn track_count(&self) -> u16 {
        self.track_count
    }

    /// Ticks per quarter note.
    pub fn division(&self) -> u16 {
        self.division
    }

    pub fn loop_start_tick(&self) -> u32 {
        self.loop_start_tick
    }

    /// Tick of the last end-of-track marker.
    pub fn end_tick(&self) -> u64 {
        self.end_tick
    }

    pub fn events(&self) -> &[ThemeEvent] {
        &self.events
    }

    /// Tempo in effect just before `tick`.
    pub fn tempo_before(&self, tick: u64) -> u32 {
        self.events
            .iter()
            .take_while(|event| event.tick < tick)
            .filter_map(|event| match event.kind {
                ThemeEventKind::Tempo(micros) => Some(micros),
                ThemeEventKind::Channel(_) => None,
            })
            .last()
            .unwrap_or(DEFAULT_TEMPO_MICROS)
    }
}

fn flatten_tracks(smf: &Smf<'_>, sequential: bool) -> (Vec<ThemeEvent>, u64) {
    let mut events = Vec::new();
    let mut end_tick = 0u64;
    let mut offset = 0u64;

    for track in &smf.tracks {
        let mut tick = offset;
        for event in track {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) => events.push(ThemeEvent {
                    tick,
                    kind: ThemeEventKind::Tempo(micros.as_int()),
                }),
                TrackEventKind::Midi { channel, message } => {
                    if let Some(bytes) = encode_channel_message(channel.as_int(), message) {
                        events.push(ThemeEvent {
                            tick,
                            kind: ThemeEventKind::Channel(bytes),
                        });
                    }
                }
                _ => {}
            }
        }
        end_tick = end_tick.max(tick);
        if sequential {
            offset = tick;
        }
    }

    // Stable: events on the same tick keep track order.
    events.sort_by_key(|event| event.tick);
    (events, end_tick)
}

fn encode_channel_message(channel: u8, message: MidiMessage) -> Option<Vec<u8>> {
    let channel = channel & 0x0F;
    let bytes = match message {
        MidiMessage::NoteOff { key, vel } => vec![0x80 | channel, key.as_int(), vel.as_int()],
        MidiMessage::NoteOn { key, vel } => vec![0x90 | channel, key.as_int(), vel.as_int()],
        MidiMessage::Aftertouch { key, vel } => vec![0xA0 | channel, key.as_int(), vel.as_int()],
        MidiMessage::Controller { controller, .. } if controller.as_int() == CC_VOLUME => {
            return None
        }
        MidiMessage::Controller { controller, value } => {
            vec![0xB0 | channel, controller.as_int(), value.as_int()]
        }
        MidiMessage::ProgramChange { program } => vec![0xC0 | channel, program.as_int()],
        MidiMessage::ChannelAftertouch { vel } => vec![0xD0 | channel, vel.as_int()],
        MidiMessage::PitchBend { bend } => {
            let raw = bend.0.as_int();
            vec![0xE0 | channel, (raw & 0x7F) as u8, (raw >> 7) as u8]
        }
    };
    Some(bytes)
}

fn invalid_format(path: &Path, message: &str) -> ThemeAssetError {
    ThemeAssetError::InvalidFormat {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tempfile::TempDir;

    use super::*;

    const END_OF_TRACK: [u8; 4] = [0x00, 0xFF, 0x2F, 0x00];

    pub(crate) fn smf(format: u16, division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&format.to_be_bytes());
        bytes.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&division.to_be_bytes());
        for events in tracks {
            bytes.extend_from_slice(b"MTrk");
            bytes.extend_from_slice(&(events.len() as u32).to_be_bytes());
            bytes.extend_from_slice(events);
        }
        bytes
    }

    /// Format 1, two empty tracks, 480 ticks per quarter note.
    pub(crate) fn sample_midi() -> Vec<u8> {
        smf(1, 480, &[END_OF_TRACK.to_vec(), END_OF_TRACK.to_vec()])
    }

    /// Tempo track at 10 ms per quarter note plus one note on channel 2.
    pub(crate) fn short_tune() -> Vec<u8> {
        let tempo = vec![0x00, 0xFF, 0x51, 0x03, 0x00, 0x27, 0x10, 0x00, 0xFF, 0x2F, 0x00];
        let notes = vec![
            0x00, 0xB2, 0x07, 0x40, // volume from the file, dropped
            0x00, 0x92, 0x3C, 0x64, // note on
            0x60, 0x82, 0x3C, 0x00, // note off after 96 ticks
            0x00, 0xFF, 0x2F, 0x00,
        ];
        smf(1, 96, &[tempo, notes])
    }

    fn parse(bytes: Vec<u8>) -> Result<ThemeAsset, ThemeAssetError> {
        ThemeAsset::from_bytes(Path::new("theme.mid"), bytes)
    }

    fn message_of(err: ThemeAssetError) -> String {
        match err {
            ThemeAssetError::InvalidFormat { message, .. } => message,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_file_exposes_header_fields() {
        let theme = parse(sample_midi()).expect("theme");
        assert_eq!(theme.format(), 1);
        assert_eq!(theme.track_count(), 2);
        assert_eq!(theme.division(), 480);
        assert_eq!(theme.loop_start_tick(), THEME_LOOP_START_TICK);
        assert!(theme.events().is_empty());
        assert_eq!(theme.end_tick(), 0);
    }

    #[test]
    fn tracks_are_merged_in_tick_order_without_volume_events() {
        let theme = parse(short_tune()).expect("theme");
        assert_eq!(
            theme.events(),
            &[
                ThemeEvent {
                    tick: 0,
                    kind: ThemeEventKind::Tempo(10_000),
                },
                ThemeEvent {
                    tick: 0,
                    kind: ThemeEventKind::Channel(vec![0x92, 0x3C, 0x64]),
                },
                ThemeEvent {
                    tick: 96,
                    kind: ThemeEventKind::Channel(vec![0x82, 0x3C, 0x00]),
                },
            ]
        );
        assert_eq!(theme.end_tick(), 96);
        assert_eq!(theme.tempo_before(50), 10_000);
        assert_eq!(theme.tempo_before(0), DEFAULT_TEMPO_MICROS);
    }

    #[test]
    fn sequential_tracks_play_one_after_another() {
        let note = vec![0x00, 0x90, 0x40, 0x50, 0x30, 0x80, 0x40, 0x00, 0x00, 0xFF, 0x2F, 0x00];
        let theme = parse(smf(2, 96, &[note.clone(), note])).expect("theme");
        let ticks: Vec<u64> = theme.events().iter().map(|event| event.tick).collect();
        assert_eq!(ticks, vec![0, 48, 48, 96]);
        assert_eq!(theme.end_tick(), 96);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample_midi();
        bytes[0] = b'X';
        assert!(matches!(
            parse(bytes).unwrap_err(),
            ThemeAssetError::InvalidFormat { .. }
        ));
        assert!(matches!(
            parse(Vec::new()).unwrap_err(),
            ThemeAssetError::InvalidFormat { .. }
        ));
    }

    #[test]
    fn rejects_zero_division_and_multi_track_format_zero() {
        let zero_division = parse(smf(1, 0, &[END_OF_TRACK.to_vec()])).unwrap_err();
        assert!(matches!(zero_division, ThemeAssetError::InvalidFormat { .. }));

        let two_tracks = smf(0, 96, &[END_OF_TRACK.to_vec(), END_OF_TRACK.to_vec()]);
        assert!(matches!(
            parse(two_tracks).unwrap_err(),
            ThemeAssetError::InvalidFormat { .. }
        ));
    }

    #[test]
    fn rejects_timecode_division() {
        // -25 fps, 40 subframes
        let bytes = smf(1, 0xE728, &[END_OF_TRACK.to_vec()]);
        assert_eq!(
            message_of(parse(bytes).unwrap_err()),
            "timecode division is not supported"
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let temp = TempDir::new().expect("temp");
        let err = ThemeAsset::load(&temp.path().join("absent.mid")).unwrap_err();
        assert!(matches!(err, ThemeAssetError::Read { .. }));
    }
}
