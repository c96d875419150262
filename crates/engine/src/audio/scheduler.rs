use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::fader::{spawn_fader, FadeHandle, FadePlan};
use super::gate::{GatePermit, TransitionGate};
use super::volumes::ChannelVolumes;
use super::{
    ChannelId, ChannelLayout, ChannelSink, FadeTimings, ThemeAsset, ThemeAssetError,
    TransitionState, NOMINAL_VOLUME,
};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to load theme asset")]
    Theme(#[from] ThemeAssetError),
    #[error("failed to spawn fader thread: {0}")]
    SpawnFader(#[source] std::io::Error),
}

type SharedSink = Arc<Mutex<Option<Box<dyn ChannelSink>>>>;

/// Cross-fades instrument channels in the background.
///
/// At most one fade runs at a time: `stop` and `transition` block while a
/// previous fade is still in flight, then hand the gate to a new fader
/// thread. The game loop never waits for a fade to finish.
pub struct AudioScheduler {
    theme: ThemeAsset,
    layout: ChannelLayout,
    timings: FadeTimings,
    sink: SharedSink,
    volumes: ChannelVolumes,
    gate: TransitionGate,
    state: AtomicU8,
    playing: Arc<AtomicBool>,
    closed: AtomicBool,
    in_flight: Mutex<Option<FadeHandle>>,
}

impl AudioScheduler {
    pub fn new(
        theme: ThemeAsset,
        layout: ChannelLayout,
        timings: FadeTimings,
        sink: Box<dyn ChannelSink>,
    ) -> Self {
        Self {
            theme,
            layout,
            timings,
            sink: Arc::new(Mutex::new(Some(sink))),
            volumes: ChannelVolumes::default(),
            gate: TransitionGate::default(),
            state: AtomicU8::new(TransitionState::Far.as_u8()),
            playing: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            in_flight: Mutex::new(None),
        }
    }

    /// Loads and validates the theme at `path` before building the scheduler.
    pub fn open(
        path: &Path,
        layout: ChannelLayout,
        timings: FadeTimings,
        sink: Box<dyn ChannelSink>,
    ) -> Result<Self, AudioError> {
        let theme = ThemeAsset::load(path)?;
        Ok(Self::new(theme, layout, timings, sink))
    }

    pub fn state(&self) -> TransitionState {
        TransitionState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_transition_in_flight(&self) -> bool {
        self.gate.is_held()
    }

    pub fn volume(&self, channel: ChannelId) -> u8 {
        self.volumes.get(channel)
    }

    pub fn volumes(&self) -> BTreeMap<ChannelId, u8> {
        self.volumes.snapshot()
    }

    /// Starts playback with only the always-on channels audible.
    pub fn start(&self) -> Result<Option<FadeHandle>, AudioError> {
        if self.is_closed() {
            return Ok(None);
        }
        let _permit = self.gate.acquire();
        if self.is_closed() {
            return Ok(None);
        }

        {
            let mut sink = lock_sink(&self.sink);
            if let Some(sink) = sink.as_mut() {
                sink.start_playback(&self.theme);
            }
        }
        self.playing.store(true, Ordering::Release);
        for layer in &self.layout.optional {
            set_level(&self.sink, &self.volumes, layer.channel, 0);
        }
        for &channel in &self.layout.always_on {
            set_level(&self.sink, &self.volumes, channel, NOMINAL_VOLUME);
        }
        self.state
            .store(TransitionState::Far.as_u8(), Ordering::Release);
        info!("audio_started");
        Ok(None)
    }

    /// Fades every audible channel out, then halts playback.
    pub fn stop(&self) -> Result<Option<FadeHandle>, AudioError> {
        if !self.is_playing() || self.is_closed() {
            return Ok(None);
        }
        let permit = self.gate.acquire();
        if !self.is_playing() || self.is_closed() {
            return Ok(None);
        }

        let mut fade_outs = self.layout.always_on.clone();
        fade_outs.extend(
            self.layout
                .optional
                .iter()
                .map(|layer| layer.channel)
                .filter(|channel| self.volumes.get(*channel) > 0),
        );
        let plan = FadePlan {
            fade_ins: Vec::new(),
            fade_outs,
        };

        let sink = Arc::clone(&self.sink);
        let playing = Arc::clone(&self.playing);
        let cleanup: Box<dyn FnOnce() + Send> = Box::new(move || {
            playing.store(false, Ordering::Release);
            if let Some(sink) = lock_sink(&sink).as_mut() {
                sink.stop_playback();
            }
            info!("audio_stopped");
        });

        let handle = self.spawn(plan, self.timings.fade_out, permit, Some(cleanup))?;
        Ok(Some(handle))
    }

    /// Moves the optional layers to match `next`. Returns `None` when there
    /// is nothing to fade.
    pub fn transition(&self, next: TransitionState) -> Result<Option<FadeHandle>, AudioError> {
        if self.is_closed() || next == self.state() {
            return Ok(None);
        }
        let permit = self.gate.acquire();
        if self.is_closed() {
            return Ok(None);
        }

        let previous = self.state();
        self.state.store(next.as_u8(), Ordering::Release);

        let mut plan = FadePlan::default();
        for layer in &self.layout.optional {
            let target = if next >= layer.enabled_from {
                NOMINAL_VOLUME
            } else {
                0
            };
            if self.volumes.get(layer.channel) == target {
                continue;
            }
            if target == NOMINAL_VOLUME {
                plan.fade_ins.push(layer.channel);
            } else {
                plan.fade_outs.push(layer.channel);
            }
        }

        debug!(
            from = previous.as_u8(),
            to = next.as_u8(),
            fade_ins = plan.fade_ins.len(),
            fade_outs = plan.fade_outs.len(),
            "audio_transition"
        );
        if plan.is_empty() {
            return Ok(None);
        }

        let handle = self.spawn(plan, self.timings.transition, permit, None)?;
        Ok(Some(handle))
    }

    /// Cancels any running fade and releases the sink. Later calls to
    /// `start`, `stop` and `transition` do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let in_flight = lock_recovering(&self.in_flight).take();
        if let Some(handle) = in_flight {
            handle.cancel();
            handle.wait();
        }

        let _permit = self.gate.acquire();
        if let Some(mut sink) = lock_sink(&self.sink).take() {
            if self.playing.swap(false, Ordering::AcqRel) {
                sink.stop_playback();
            }
        }
        info!("audio_closed");
    }

    fn spawn(
        &self,
        plan: FadePlan,
        duration: std::time::Duration,
        permit: GatePermit,
        cleanup: Option<Box<dyn FnOnce() + Send + 'static>>,
    ) -> Result<FadeHandle, AudioError> {
        let sink = Arc::clone(&self.sink);
        let volumes = self.volumes.clone();
        let apply = move |channel, level| set_level(&sink, &volumes, channel, level);

        let handle =
            spawn_fader(plan, duration, permit, apply, cleanup).map_err(AudioError::SpawnFader)?;
        *lock_recovering(&self.in_flight) = Some(handle.clone());
        Ok(handle)
    }
}

impl Drop for AudioScheduler {
    fn drop(&mut self) {
        self.close();
    }
}

fn set_level(sink: &SharedSink, volumes: &ChannelVolumes, channel: ChannelId, level: u8) {
    volumes.set(channel, level);
    if let Some(sink) = lock_sink(sink).as_mut() {
        sink.set_volume(channel, level);
    }
}

fn lock_sink(sink: &SharedSink) -> MutexGuard<'_, Option<Box<dyn ChannelSink>>> {
    match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("audio sink lock poisoned; recovered inner value");
            poisoned.into_inner()
        }
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::super::sink::{RecordingSink, SinkEvent};
    use super::super::theme::tests::sample_midi;
    use super::*;

    fn fast_timings() -> FadeTimings {
        FadeTimings {
            fade_out: Duration::from_millis(10),
            transition: Duration::from_millis(20),
        }
    }

    fn scheduler_with(timings: FadeTimings) -> (AudioScheduler, RecordingSink) {
        let theme = ThemeAsset::from_bytes(Path::new("theme.mid"), sample_midi()).expect("theme");
        let sink = RecordingSink::default();
        let scheduler = AudioScheduler::new(
            theme,
            ChannelLayout::default(),
            timings,
            Box::new(sink.clone()),
        );
        (scheduler, sink)
    }

    #[test]
    fn start_sets_always_on_nominal_and_optional_silent() {
        let (scheduler, sink) = scheduler_with(fast_timings());
        assert!(scheduler.start().expect("start").is_none());

        assert!(scheduler.is_playing());
        assert_eq!(scheduler.state(), TransitionState::Far);
        for channel in [0, 1, 2] {
            assert_eq!(scheduler.volume(channel), 100);
        }
        assert_eq!(scheduler.volume(3), 0);
        assert_eq!(scheduler.volume(9), 0);
        assert_eq!(
            sink.events()[0],
            SinkEvent::Started {
                loop_start_tick: 4096
            }
        );
    }

    #[test]
    fn transition_fades_layers_in_and_out() {
        let (scheduler, _sink) = scheduler_with(fast_timings());
        scheduler.start().expect("start");

        let handle = scheduler
            .transition(TransitionState::Carrying)
            .expect("transition")
            .expect("fade spawned");
        handle.wait();
        assert_eq!(scheduler.volume(3), 100);
        assert_eq!(scheduler.volume(9), 100);

        let handle = scheduler
            .transition(TransitionState::Near)
            .expect("transition")
            .expect("fade spawned");
        handle.wait();
        assert_eq!(scheduler.volume(3), 100);
        assert_eq!(scheduler.volume(9), 0);
        assert_eq!(scheduler.state(), TransitionState::Near);
    }

    #[test]
    fn transition_to_current_state_is_a_no_op() {
        let (scheduler, sink) = scheduler_with(fast_timings());
        scheduler.start().expect("start");
        let before = sink.events().len();

        assert!(scheduler
            .transition(TransitionState::Far)
            .expect("transition")
            .is_none());
        assert_eq!(sink.events().len(), before);
        assert!(!scheduler.is_transition_in_flight());
    }

    #[test]
    fn transition_with_layers_already_at_target_releases_synchronously() {
        let (scheduler, _sink) = scheduler_with(fast_timings());
        scheduler.start().expect("start");
        scheduler
            .transition(TransitionState::Near)
            .expect("transition")
            .expect("fade spawned")
            .wait();

        // Layer 3 is already up and layer 9 already silent.
        scheduler.state.store(TransitionState::Far.as_u8(), Ordering::Release);
        assert!(scheduler
            .transition(TransitionState::Near)
            .expect("transition")
            .is_none());
        assert!(!scheduler.is_transition_in_flight());
    }

    #[test]
    fn stop_fades_everything_to_zero_and_halts_playback() {
        let (scheduler, sink) = scheduler_with(fast_timings());
        scheduler.start().expect("start");
        scheduler
            .transition(TransitionState::Near)
            .expect("transition")
            .expect("fade spawned")
            .wait();

        let handle = scheduler.stop().expect("stop").expect("fade spawned");
        handle.wait();

        assert!(!scheduler.is_playing());
        for channel in [0, 1, 2, 3, 9] {
            assert_eq!(scheduler.volume(channel), 0, "channel {channel}");
        }
        assert_eq!(sink.events().last(), Some(&SinkEvent::Stopped));
        assert_eq!(sink.last_volume(3), Some(0));
        assert_eq!(sink.last_volume(9), Some(0));
    }

    #[test]
    fn stop_when_not_playing_does_nothing() {
        let (scheduler, sink) = scheduler_with(fast_timings());
        assert!(scheduler.stop().expect("stop").is_none());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn second_transition_waits_for_first() {
        let (scheduler, _sink) = scheduler_with(fast_timings());
        scheduler.start().expect("start");

        let first = scheduler
            .transition(TransitionState::Near)
            .expect("transition")
            .expect("fade spawned");
        let second = scheduler
            .transition(TransitionState::Carrying)
            .expect("transition")
            .expect("fade spawned");

        assert!(first.wait_timeout(Duration::from_secs(1)));
        second.wait();
        assert_eq!(scheduler.volume(3), 100);
        assert_eq!(scheduler.volume(9), 100);
    }

    #[test]
    fn close_cancels_fade_and_disables_further_calls() {
        let (scheduler, sink) = scheduler_with(FadeTimings {
            fade_out: Duration::from_secs(60),
            transition: Duration::from_secs(60),
        });
        scheduler.start().expect("start");
        let handle = scheduler
            .transition(TransitionState::Near)
            .expect("transition")
            .expect("fade spawned");

        scheduler.close();
        assert!(handle.is_finished());
        assert!(!scheduler.is_playing());
        assert_eq!(sink.events().last(), Some(&SinkEvent::Stopped));

        let events = sink.events().len();
        assert!(scheduler.start().expect("start").is_none());
        assert!(scheduler
            .transition(TransitionState::Carrying)
            .expect("transition")
            .is_none());
        assert!(scheduler.stop().expect("stop").is_none());
        assert_eq!(sink.events().len(), events);
        assert!(!scheduler.is_playing());
    }
}
