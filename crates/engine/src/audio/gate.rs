use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Binary gate allowing a single audio transition at a time.
///
/// The permit is an owned value so it can be handed to the fader thread;
/// the gate opens again whenever the permit is dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransitionGate {
    inner: Arc<GateInner>,
}

#[derive(Debug, Default)]
struct GateInner {
    held: Mutex<bool>,
    released: Condvar,
}

impl TransitionGate {
    /// Blocks until no other permit is outstanding.
    pub(crate) fn acquire(&self) -> GatePermit {
        let mut held = lock_recovering(&self.inner.held);
        while *held {
            held = match self.inner.released.wait(held) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *held = true;
        GatePermit {
            inner: Arc::clone(&self.inner),
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        *lock_recovering(&self.inner.held)
    }
}

#[derive(Debug)]
pub(crate) struct GatePermit {
    inner: Arc<GateInner>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let mut held = lock_recovering(&self.inner.held);
        *held = false;
        drop(held);
        self.inner.released.notify_one();
    }
}

fn lock_recovering(mutex: &Mutex<bool>) -> MutexGuard<'_, bool> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn dropping_permit_reopens_gate() {
        let gate = TransitionGate::default();
        let permit = gate.acquire();
        assert!(gate.is_held());

        drop(permit);
        assert!(!gate.is_held());
        let _again = gate.acquire();
        assert!(gate.is_held());
    }

    #[test]
    fn permit_can_be_released_from_another_thread() {
        let gate = TransitionGate::default();
        let permit = gate.acquire();
        let released = Arc::new(AtomicBool::new(false));

        let released_flag = Arc::clone(&released);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            released_flag.store(true, Ordering::SeqCst);
            drop(permit);
        });

        let _second = gate.acquire();
        assert!(released.load(Ordering::SeqCst));
        worker.join().expect("worker");
    }

    #[test]
    fn permit_released_when_holder_panics() {
        let gate = TransitionGate::default();
        let permit = gate.acquire();
        let result = thread::spawn(move || {
            let _permit = permit;
            panic!("fader blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!gate.is_held());
    }
}
