use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

use super::ChannelId;

static VOLUME_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_volume_lock_poison_once(operation: &'static str) {
    if VOLUME_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "volume lock poisoned; recovered inner value");
    }
}

/// Shared per-channel volume table. Unknown channels read as 0.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChannelVolumes {
    levels: Arc<RwLock<BTreeMap<ChannelId, u8>>>,
}

impl ChannelVolumes {
    pub(crate) fn get(&self, channel: ChannelId) -> u8 {
        match self.levels.read() {
            Ok(guard) => guard.get(&channel).copied().unwrap_or(0),
            Err(poisoned) => {
                warn_volume_lock_poison_once("read");
                poisoned.into_inner().get(&channel).copied().unwrap_or(0)
            }
        }
    }

    pub(crate) fn set(&self, channel: ChannelId, volume: u8) {
        let volume = volume.min(super::NOMINAL_VOLUME);
        match self.levels.write() {
            Ok(mut guard) => {
                guard.insert(channel, volume);
            }
            Err(poisoned) => {
                warn_volume_lock_poison_once("write");
                poisoned.into_inner().insert(channel, volume);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<ChannelId, u8> {
        match self.levels.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_volume_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }
}
