//! Abstract time source for freshness arithmetic.
//!
//! The engine never reads process time directly; every freshness
//! computation flows through a [`Clock`] so tests can inject arbitrary
//! instants instead of racing the wall clock.

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::SystemTime,
};

/// A source of the current wall-clock time.
///
/// The default production implementation is [`SystemClock`], which
/// delegates to [`SystemTime::now`]. Tests should use [`FixedClock`] or
/// [`ManualClock`] instead of sleeping.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// The real wall clock, backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that always returns the same instant.
///
/// Useful for deterministic tests of a single point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub SystemTime);

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

/// A clock whose instant can be advanced from test code while shared
/// with the engine under test via `Arc<dyn Clock>`.
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch: SystemTime,
    offset_secs: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a manual clock starting at `epoch`.
    #[must_use]
    pub fn new(epoch: SystemTime) -> Self {
        Self { epoch, offset_secs: Arc::new(AtomicU64::new(0)) }
    }

    /// Advances the clock by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        self.offset_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.epoch
            + std::time::Duration::from_secs(
                self.offset_secs.load(Ordering::SeqCst),
            )
    }
}
