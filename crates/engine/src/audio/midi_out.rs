use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::sink::ChannelSink;
use super::theme::{ThemeAsset, ThemeEventKind};
use super::ChannelId;

pub(crate) const SEQUENCER_THREAD_NAME: &str = "audio-sequencer";

/// Raw MIDI device nodes tried when none is configured.
pub const DEFAULT_MIDI_DEVICES: &[&str] = &["/dev/snd/midiC0D0", "/dev/midi"];

const CC_VOLUME: u8 = 7;
const CC_ALL_NOTES_OFF: u8 = 123;
const MIDI_CHANNELS: u8 = 16;
const IDLE_WAIT: Duration = Duration::from_secs(3600);

struct Port<W> {
    writer: Mutex<W>,
    write_failed: AtomicBool,
}

impl<W: Write> Port<W> {
    fn send(&self, message: &[u8]) {
        let result = {
            let mut writer = lock_recovering(&self.writer);
            writer.write_all(message).and_then(|()| writer.flush())
        };
        if let Err(err) = result {
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                warn!(error = %err, "midi_write_failed");
            }
        }
    }

    fn all_notes_off(&self) {
        for channel in 0..MIDI_CHANNELS {
            self.send(&[0xB0 | channel, CC_ALL_NOTES_OFF, 0]);
        }
    }
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    stopped_cv: Condvar,
}

impl StopSignal {
    fn raise(&self) {
        *lock_recovering(&self.stopped) = true;
        self.stopped_cv.notify_all();
    }

    /// Sleeps for `duration` or until raised. Returns `true` once raised.
    fn sleep(&self, duration: Duration) -> bool {
        let stopped = lock_recovering(&self.stopped);
        match self
            .stopped_cv
            .wait_timeout_while(stopped, duration, |stopped| !*stopped)
        {
            Ok((guard, _)) => *guard,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }
}

struct Player {
    stop: Arc<StopSignal>,
    thread: JoinHandle<()>,
}

/// Plays the theme on a MIDI output and turns channel volume into CC 7.
///
/// Playback runs on its own `audio-sequencer` thread and loops from the
/// theme's loop start tick. Volume writes go straight to the port, so they
/// interleave with note data at message boundaries.
pub struct MidiSink<W: Write + Send + 'static> {
    port: Arc<Port<W>>,
    player: Option<Player>,
}

impl<W: Write + Send + 'static> MidiSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            port: Arc::new(Port {
                writer: Mutex::new(writer),
                write_failed: AtomicBool::new(false),
            }),
            player: None,
        }
    }

    fn halt_player(&mut self) {
        let Some(player) = self.player.take() else {
            return;
        };
        player.stop.raise();
        if player.thread.join().is_err() {
            warn!("midi_sequencer_panicked");
        }
    }
}

impl MidiSink<File> {
    /// Opens a raw MIDI device node (for example `/dev/snd/midiC1D0`) for
    /// writing.
    pub fn open_device(path: &Path) -> io::Result<Self> {
        let device = OpenOptions::new().write(true).open(path)?;
        info!(device = %path.display(), "midi_device_opened");
        Ok(Self::new(device))
    }
}

impl<W: Write + Send + 'static> ChannelSink for MidiSink<W> {
    fn start_playback(&mut self, theme: &ThemeAsset) {
        self.halt_player();

        let stop = Arc::new(StopSignal::default());
        let port = Arc::clone(&self.port);
        let thread_stop = Arc::clone(&stop);
        let theme = theme.clone();
        let spawned = thread::Builder::new()
            .name(SEQUENCER_THREAD_NAME.to_string())
            .spawn(move || play_looped(&theme, &port, &thread_stop));
        match spawned {
            Ok(thread) => {
                debug!("midi_sequencer_started");
                self.player = Some(Player { stop, thread });
            }
            Err(err) => warn!(error = %err, "midi_sequencer_spawn_failed"),
        }
    }

    fn stop_playback(&mut self) {
        self.halt_player();
        self.port.all_notes_off();
    }

    fn set_volume(&mut self, channel: ChannelId, volume: u8) {
        self.port
            .send(&[0xB0 | (channel & 0x0F), CC_VOLUME, volume.min(127)]);
    }
}

impl<W: Write + Send + 'static> Drop for MidiSink<W> {
    fn drop(&mut self) {
        if self.player.is_some() {
            self.stop_playback();
        }
    }
}

fn play_looped<W: Write>(theme: &ThemeAsset, port: &Port<W>, stop: &StopSignal) {
    let events = theme.events();
    let division = u64::from(theme.division());
    let end_tick = theme.end_tick();
    if end_tick == 0 {
        // Nothing to play; hold until stopped.
        while !stop.sleep(IDLE_WAIT) {}
        return;
    }

    let requested_loop = u64::from(theme.loop_start_tick());
    let loop_start = if requested_loop < end_tick {
        requested_loop
    } else {
        0
    };
    let loop_index = events.partition_point(|event| event.tick < loop_start);
    let loop_tempo = theme.tempo_before(loop_start);

    let mut tempo = theme.tempo_before(0);
    let mut position = 0u64;
    let mut index = 0usize;
    loop {
        for event in &events[index..] {
            let wait = ticks_to_duration(event.tick - position, tempo, division);
            if stop.sleep(wait) {
                return;
            }
            position = event.tick;
            match &event.kind {
                ThemeEventKind::Channel(message) => port.send(message),
                ThemeEventKind::Tempo(micros) => tempo = *micros,
            }
        }
        if stop.sleep(ticks_to_duration(end_tick - position, tempo, division)) {
            return;
        }
        position = loop_start;
        tempo = loop_tempo;
        index = loop_index;
    }
}

fn ticks_to_duration(ticks: u64, micros_per_quarter: u32, division: u64) -> Duration {
    Duration::from_micros(ticks.saturating_mul(u64::from(micros_per_quarter)) / division)
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
