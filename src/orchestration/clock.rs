use crate::domain::TimeMs;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time for every entry point.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimeMs;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeMs {
        TimeMs::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start: TimeMs) -> Self {
        Self {
            now_ms: AtomicI64::new(start.as_ms()),
        }
    }

    pub fn set(&self, now: TimeMs) {
        self.now_ms.store(now.as_ms(), Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) -> TimeMs {
        TimeMs(self.now_ms.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimeMs {
        TimeMs(self.now_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(TimeMs(100));
        assert_eq!(clock.now(), TimeMs(100));
        assert_eq!(clock.advance(50), TimeMs(150));
        clock.set(TimeMs(10));
        assert_eq!(clock.now(), TimeMs(10));
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > TimeMs(1_577_836_800_000));
    }
}
