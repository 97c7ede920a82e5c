//! Wall-clock abstraction so moderation rules can be tested against fixed times.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn unix_now(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Whole seconds until the next UTC midnight. Never zero, since a zero TTL
/// would delete the key it is applied to.
pub fn seconds_to_midnight(now: DateTime<Utc>) -> u64 {
    let Some(midnight) = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return 86_400;
    };
    (midnight.and_utc() - now).num_seconds().max(1) as u64
}

/// Whole seconds of `d` as a unix-time offset, saturating instead of wrapping.
pub fn secs_i64(d: std::time::Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn secs_i64_saturates() {
        assert_eq!(secs_i64(std::time::Duration::from_secs(90)), 90);
        assert_eq!(secs_i64(std::time::Duration::from_secs(u64::MAX)), i64::MAX);
    }

    #[test]
    fn seconds_to_midnight_counts_down_to_next_day() {
        let noon = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(seconds_to_midnight(noon), 12 * 3600);

        let start = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(seconds_to_midnight(start), 86_400);
    }

    #[test]
    fn seconds_to_midnight_is_never_zero() {
        let late = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap()
            + Duration::milliseconds(900);
        assert_eq!(seconds_to_midnight(late), 1);
    }

    #[test]
    fn manual_clock_advances() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        clock.advance(Duration::hours(13));
        assert_eq!(clock.unix_now(), t0.timestamp() + 13 * 3600);
        clock.set(t0);
        assert_eq!(clock.now(), t0);
    }
}
