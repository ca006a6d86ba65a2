//! Time sources for timers and `DateNow`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;

    /// Current wall time as milliseconds since the Unix epoch.
    fn system_time_millis(&self) -> i64;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to. Shared between a test and a runtime via `Arc`.
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed_micros: AtomicU64,
    system_time_millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock whose wall time starts at the given epoch milliseconds.
    pub fn at(system_time_millis: u64) -> Self {
        Self {
            elapsed_micros: AtomicU64::new(0),
            system_time_millis: AtomicU64::new(system_time_millis),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        self.elapsed_micros.fetch_add(micros, Ordering::SeqCst);
        self.system_time_millis
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros.load(Ordering::SeqCst))
    }

    fn system_time_millis(&self) -> i64 {
        self.system_time_millis.load(Ordering::SeqCst) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::at(1_000);
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(250));
        assert_eq!(clock.system_time_millis(), 1_250);
    }
}
