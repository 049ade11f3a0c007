//! Time source abstraction.
//!
//! Every guard that talks about "today" reads the injected [`Clock`], so the
//! lifecycle can be driven deterministically in tests with [`ManualClock`].

use std::sync::RwLock;

use chrono::{DateTime, Days, NaiveDate, Utc};

/// Source of the current instant.
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current calendar date (UTC).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Creates a clock at `hour:00` UTC on the given date.
    #[must_use]
    pub fn at(date: NaiveDate, hour: u32) -> Self {
        let time = date.and_hms_opt(hour, 0, 0).unwrap_or_default();
        Self::new(time.and_utc())
    }

    /// Moves the clock to an arbitrary instant.
    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        let next = self.now() + duration;
        self.set(next);
    }

    /// Advances the clock by whole days, keeping the time of day.
    pub fn advance_days(&self, days: u64) {
        let next = self
            .now()
            .checked_add_days(Days::new(days))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
