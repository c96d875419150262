use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::gate::GatePermit;
use super::{ChannelId, FADE_STEPS, NOMINAL_VOLUME};

pub(crate) const FADER_THREAD_NAME: &str = "audio-fader";

/// Channels ramping up to nominal and down to silence in one fade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FadePlan {
    pub(crate) fade_ins: Vec<ChannelId>,
    pub(crate) fade_outs: Vec<ChannelId>,
}

impl FadePlan {
    pub(crate) fn is_empty(&self) -> bool {
        self.fade_ins.is_empty() && self.fade_outs.is_empty()
    }
}

#[derive(Debug, Default)]
struct FadeSignals {
    cancelled: Mutex<bool>,
    cancel_cv: Condvar,
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

/// Completion signal for a background fade.
///
/// Once `wait` returns, cleanup has run and the transition gate is open
/// again.
#[derive(Debug, Clone)]
pub struct FadeHandle {
    signals: Arc<FadeSignals>,
}

impl FadeHandle {
    fn new() -> Self {
        Self {
            signals: Arc::new(FadeSignals::default()),
        }
    }

    pub fn wait(&self) {
        let mut finished = lock_recovering(&self.signals.finished);
        while !*finished {
            finished = match self.signals.finished_cv.wait(finished) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Returns `true` if the fade finished within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let finished = lock_recovering(&self.signals.finished);
        let result = self
            .signals
            .finished_cv
            .wait_timeout_while(finished, timeout, |finished| !*finished);
        match result {
            Ok((guard, _)) => *guard,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }

    /// Asks the fader to skip its remaining steps. Cleanup still runs.
    pub fn cancel(&self) {
        *lock_recovering(&self.signals.cancelled) = true;
        self.signals.cancel_cv.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        *lock_recovering(&self.signals.finished)
    }

    /// Sleeps for `step`, waking early on cancellation. Returns `true` when
    /// cancelled.
    fn sleep_or_cancelled(&self, step: Duration) -> bool {
        let cancelled = lock_recovering(&self.signals.cancelled);
        let result = self
            .signals
            .cancel_cv
            .wait_timeout_while(cancelled, step, |cancelled| !*cancelled);
        match result {
            Ok((guard, _)) => *guard,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }

    fn mark_finished(&self) {
        *lock_recovering(&self.signals.finished) = true;
        self.signals.finished_cv.notify_all();
    }
}

type Cleanup = Box<dyn FnOnce() + Send + 'static>;

/// Runs cleanup, opens the gate, then signals completion, in that order,
/// however the fader thread exits.
struct CompletionGuard {
    handle: FadeHandle,
    cleanup: Option<Cleanup>,
    permit: Option<GatePermit>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
        drop(self.permit.take());
        self.handle.mark_finished();
    }
}

/// Spawns the fader thread. `apply` writes one volume level; `cleanup` runs
/// once after the last step (or after cancellation).
pub(crate) fn spawn_fader<A>(
    plan: FadePlan,
    duration: Duration,
    permit: GatePermit,
    apply: A,
    cleanup: Option<Cleanup>,
) -> io::Result<FadeHandle>
where
    A: Fn(ChannelId, u8) + Send + 'static,
{
    let handle = FadeHandle::new();
    let thread_handle = handle.clone();
    let step = duration / FADE_STEPS;

    thread::Builder::new()
        .name(FADER_THREAD_NAME.to_string())
        .spawn(move || {
            let _guard = CompletionGuard {
                handle: thread_handle.clone(),
                cleanup,
                permit: Some(permit),
            };
            debug!(
                fade_ins = ?plan.fade_ins,
                fade_outs = ?plan.fade_outs,
                duration_ms = duration.as_millis() as u64,
                "fade_started"
            );

            for level in 1..=FADE_STEPS {
                if thread_handle.sleep_or_cancelled(step) {
                    debug!(step = level, "fade_cancelled");
                    return;
                }
                let level = level as u8;
                for &channel in &plan.fade_ins {
                    apply(channel, level);
                }
                for &channel in &plan.fade_outs {
                    apply(channel, NOMINAL_VOLUME - level);
                }
            }
            debug!("fade_finished");
        })?;

    Ok(handle)
}

fn lock_recovering(mutex: &Mutex<bool>) -> MutexGuard<'_, bool> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
