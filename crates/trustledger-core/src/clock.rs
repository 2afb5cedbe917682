// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::{TrustLedgerError, TrustLedgerResult};

/// Source of "now" for every time-dependent computation in the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used for replay and tests.
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

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }

    pub fn advance_hours(&self, hours: i64) {
        self.advance(Duration::hours(hours));
    }

    /// Moves forward by `hours`, rejecting negative or unrepresentable steps
    /// and leaving the clock unchanged.
    pub fn try_advance_hours(&self, hours: i64) -> TrustLedgerResult<DateTime<Utc>> {
        if hours < 0 {
            return Err(TrustLedgerError::InvalidArgument(
                "clock only moves forward".to_string(),
            ));
        }
        let by = Duration::try_hours(hours).ok_or_else(|| {
            TrustLedgerError::InvalidArgument(format!("{hours} hours is out of range"))
        })?;
        let mut guard = self.now.lock();
        let next = guard.checked_add_signed(by).ok_or_else(|| {
            TrustLedgerError::InvalidArgument(format!("advancing {hours} hours overflows"))
        })?;
        *guard = next;
        Ok(next)
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Elapsed whole-and-fractional hours from `from` to `to`, clamped at zero.
pub fn elapsed_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let secs = (to - from).num_seconds();
    if secs <= 0 {
        0.0
    } else {
        secs as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances_only_on_request() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance_hours(240);
        assert_eq!(clock.now(), start + Duration::hours(240));
    }

    #[test]
    fn try_advance_rejects_unrepresentable_steps() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        for hours in [-1, 9_000_000_000_000_000, i64::MAX] {
            assert!(matches!(
                clock.try_advance_hours(hours),
                Err(TrustLedgerError::InvalidArgument(_))
            ));
            assert_eq!(clock.now(), start);
        }
        // Representable as a duration, but past the last DateTime.
        assert!(clock.try_advance_hours(3_000_000_000).is_err());
        assert_eq!(clock.now(), start);
        assert_eq!(clock.try_advance_hours(24).unwrap(), start + Duration::days(1));
    }

    #[test]
    fn elapsed_hours_never_negative() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(90);
        assert_eq!(elapsed_hours(t0, t1), 1.5);
        assert_eq!(elapsed_hours(t1, t0), 0.0);
    }
}
