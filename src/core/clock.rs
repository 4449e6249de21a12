//! Time source for refresh and trigger evaluation.

use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Supplies wall-clock time to the refresh policy and trigger evaluator.
pub trait Clock: Send + Sync {
    /// Current time in seconds since the Unix epoch.
    fn now_secs(&self) -> i64;

    /// Today's calendar day as a `YYYYMMDD` integer.
    ///
    /// The encoding is ordered, so a later day always compares greater.
    fn today(&self) -> i64 {
        let now = Utc
            .timestamp_opt(self.now_secs(), 0)
            .single()
            .unwrap_or_default();
        day_number(&now)
    }
}

fn day_number<Tz: TimeZone>(time: &DateTime<Tz>) -> i64 {
    i64::from(time.year()) * 10_000 + i64::from(time.month()) * 100 + i64::from(time.day())
}

/// Clock backed by the system time. Days follow the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn today(&self) -> i64 {
        day_number(&Local::now())
    }
}

/// Manually driven clock, in UTC.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(now_secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(now_secs),
        }
    }

    pub fn set(&self, now_secs: i64) {
        self.secs.store(now_secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}
