//! Time source abstraction for real and simulated clocks.
//!
//! The lockfile protocol reads wall-clock time in two places: when encoding
//! a `free_after` expiry into a lock record, and when deciding whether a held
//! lock has expired. Both tolerate coarse clocks, so the source exposes plain
//! epoch seconds. A simulated source lets tests advance time past an expiry
//! without sleeping through it.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global time source instance, defaults to [`RealTimeSource`].
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Trait for abstracting clock reads and waits.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time in seconds since the Unix epoch.
    fn now_secs(&self) -> f64;

    /// Block for the given duration (or simulate doing so).
    fn sleep(&self, duration: Duration);
}

/// Real-time implementation backed by the system clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated time source for tests.
///
/// Reads the real clock plus an adjustable offset, and turns sleeps into
/// offset advances so expiry-driven paths run instantly.
pub struct SimulatedTimeSource {
    offset: Mutex<Duration>,
}

impl SimulatedTimeSource {
    pub fn new() -> Self {
        Self {
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Jump the simulated clock forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Default for SimulatedTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now_secs(&self) -> f64 {
        RealTimeSource.now_secs() + self.offset.lock().unwrap().as_secs_f64()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Install the global time source (call once, before any scope is opened).
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

/// Current wall-clock time in epoch seconds from the global time source.
pub fn now_secs() -> f64 {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .now_secs()
}

/// Sleep through the global time source.
pub fn sleep(duration: Duration) {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .sleep(duration)
}
