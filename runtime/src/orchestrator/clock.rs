//! Time sources for the reference moment.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::sync::Mutex;

/// Supplies "now" in the civil zone charts are reckoned in.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock viewed through a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Clock at `offset_minutes` east of UTC; out-of-range offsets fall back to UTC.
    pub fn new(offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| {
            tracing::warn!(offset_minutes, "invalid clock offset, using UTC");
            Utc.fix()
        });
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// A settable clock, for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_offset() {
        let now = SystemClock::new(480).now();
        assert_eq!(now.offset().local_minus_utc(), 8 * 3600);
        let now = SystemClock::new(100_000).now();
        assert_eq!(now.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_fixed_clock_set() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let a = DateTime::parse_from_rfc3339("2025-01-01T23:59:00+08:00").unwrap();
        let clock = FixedClock::new(a);
        assert_eq!(clock.now(), a);
        let b = a + chrono::Duration::minutes(2);
        clock.set(b);
        assert_eq!(clock.now().with_timezone(&tz).format("%Y-%m-%d").to_string(), "2025-01-02");
    }
}
