//! Latest delta of one virtual sensor.
//!
//! Reads never block and never touch the network: the host pulls whatever
//! the sampler stored last. When a pusher is installed, changed values are
//! also forwarded to the host as they happen.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

/// Callback that forwards a changed delta to the host.
pub type ValuePusher = Arc<dyn Fn(i32) + Send + Sync>;

pub struct DeltaValue {
    /// Delta in hundredths of a degree Celsius
    value: AtomicI32,
    /// Incremented each time the value changes
    version: AtomicU32,
    /// Whether a sample has been taken since this process started
    sampled: AtomicBool,
    updated_at: RwLock<Option<DateTime<Utc>>>,
    pusher: RwLock<Option<ValuePusher>>,
}

impl DeltaValue {
    /// A value that has never been sampled.
    pub fn new() -> Self {
        Self::restored(0, None)
    }

    /// A value carried over from a previous run.
    pub fn restored(delta: i32, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: AtomicI32::new(delta),
            version: AtomicU32::new(0),
            sampled: AtomicBool::new(false),
            updated_at: RwLock::new(updated_at),
            pusher: RwLock::new(None),
        }
    }

    /// Current delta in hundredths of a degree Celsius.
    pub fn read(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Current delta in degrees Celsius.
    pub fn celsius(&self) -> f32 {
        self.read() as f32 / 100.0
    }

    pub fn has_sample(&self) -> bool {
        self.sampled.load(Ordering::SeqCst)
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        *self.updated_at.read()
    }

    pub fn set_pusher(&self, pusher: ValuePusher) {
        *self.pusher.write() = Some(pusher);
    }

    /// Store a freshly computed delta. Returns whether the value changed.
    ///
    /// Only the device's sampler calls this.
    pub(crate) fn store(&self, delta: i32) -> bool {
        let old = self.value.swap(delta, Ordering::SeqCst);
        self.sampled.store(true, Ordering::SeqCst);
        *self.updated_at.write() = Some(Utc::now());

        if old == delta {
            return false;
        }
        self.version.fetch_add(1, Ordering::SeqCst);
        if let Some(pusher) = self.pusher.read().as_ref() {
            pusher(delta);
        }
        true
    }
}

impl Default for DeltaValue {
    fn default() -> Self {
        Self::new()
    }
}
