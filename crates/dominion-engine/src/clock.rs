//! The injected time source.
//!
//! Every expiry in the engine (combat tags, spawn protection, teleport
//! warmup and cooldown) is an absolute [`Timestamp`] read from a [`Clock`]
//! trait object. Production wires [`SystemClock`]; tests wire
//! [`ManualClock`] and advance it explicitly, which makes every
//! time-dependent state machine deterministic.

use std::sync::atomic::{AtomicU64, Ordering};

use dominion_types::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time via `chrono`, in milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = chrono::Utc::now().timestamp_millis();
        Timestamp::from_millis(u64::try_from(millis).unwrap_or(0))
    }
}

/// A hand-driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at the given instant.
    pub const fn starting_at(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now.as_millis()),
        }
    }

    /// Advance the clock by `millis`.
    pub fn advance(&self, millis: u64) {
        // fetch_update never fails with an always-Some closure.
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(millis))
            });
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now.load(Ordering::SeqCst))
    }
}
